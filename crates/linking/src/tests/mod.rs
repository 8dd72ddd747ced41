// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use assert_matches::assert_matches;
use async_trait::async_trait;
use idlink_data_model::{AuditAction, Metadata, MockClock, User, VerifiedIdToken};
use idlink_oidc::{
    IdTokenError, JwkSet, KeySource, TokenVerifier, VerifierConfig, VerifyOptions,
    profile_metadata,
};
use idlink_storage::{
    BoxRepository, RepositoryAccess, RepositoryError, RepositoryFactory, RepositoryTransaction,
};
use idlink_storage_memory::{FailPoint, MemoryRepositoryFactory, MemoryStore};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use serde_json::json;

use crate::{
    ConfiguredProviderResolver, IdentityConflict, IdentityLinker, LinkError, LinkErrorKind,
    LinkRequest, ProviderSettings,
};


const ISSUER: &str = "https://accounts.example.com";
const PROVIDER: &str = "example";
const SUBJECT: &str = "248289761001";

/// Returns a fixed token, or fails if there is none
struct StaticVerifier {
    token: Option<VerifiedIdToken>,
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(
        &self,
        config: &VerifierConfig,
        _id_token: &str,
        _options: VerifyOptions<'_>,
    ) -> Result<VerifiedIdToken, IdTokenError> {
        assert_eq!(config.issuer, ISSUER);
        self.token.clone().ok_or(IdTokenError::NoKeys)
    }
}

fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap()
}

fn token(audience: &[&str], nonce: Option<&str>) -> VerifiedIdToken {
    let claims = metadata(json!({
        "name": "Alice Liddell",
        "email": "alice@example.com",
        "email_verified": true,
    }));

    VerifiedIdToken {
        issuer: ISSUER.to_owned(),
        subject: SUBJECT.to_owned(),
        audience: audience.iter().map(|&aud| aud.to_owned()).collect(),
        nonce: nonce.map(str::to_owned),
        metadata: profile_metadata(ISSUER, SUBJECT, &claims),
    }
}

fn linker(token: Option<VerifiedIdToken>, skip_nonce_check: bool) -> IdentityLinker {
    let resolver = ConfiguredProviderResolver::new(vec![ProviderSettings {
        name: PROVIDER.to_owned(),
        issuer: ISSUER.to_owned(),
        client_ids: vec!["client-a".to_owned()],
        skip_nonce_check,
        keys: KeySource::Inline(JwkSet { keys: Vec::new() }),
    }]);

    IdentityLinker::new(Arc::new(resolver), Arc::new(StaticVerifier { token }))
}

fn request() -> LinkRequest {
    LinkRequest {
        id_token: "header.payload.signature".to_owned(),
        provider: Some(PROVIDER.to_owned()),
        nonce: Some("abc".to_owned()),
        ..LinkRequest::default()
    }
}

async fn create_user(store: &MemoryStore, rng: &mut ChaChaRng, clock: &MockClock) -> User {
    let mut repo = store.repository().boxed();
    let user = repo
        .user()
        .add(rng, clock, metadata(json!({ "name": "A.", "locale": "fr" })))
        .await
        .unwrap();
    repo.save().await.unwrap();
    user
}

/// Asserts that nothing was written besides the users
fn assert_untouched(store: &MemoryStore, users: &[&User]) {
    assert!(store.identities().is_empty());
    assert!(store.audit_log().is_empty());
    for user in users {
        assert!(store.users().contains(user));
    }
}

#[tokio::test]
async fn test_link_identity() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let linker = linker(Some(token(&["client-a"], Some("abc"))), false);
    let linked = linker
        .link(&factory, &mut rng, &clock, user.clone(), &request())
        .await
        .unwrap();

    assert_eq!(linked.identity.user_id, user.id);
    assert_eq!(linked.identity.provider, PROVIDER);
    assert_eq!(linked.identity.subject, SUBJECT);
    assert_eq!(linked.identity.metadata["email"], "alice@example.com");
    assert_eq!(linked.identities, vec![linked.identity.clone()]);

    // Claims overwrite existing keys, other keys are kept
    assert_eq!(linked.user.providers, vec![PROVIDER]);
    assert_eq!(linked.user.metadata["name"], "Alice Liddell");
    assert_eq!(linked.user.metadata["locale"], "fr");
    assert_eq!(linked.user.metadata["email"], "alice@example.com");
    assert_eq!(linked.user.metadata["provider_id"], SUBJECT);

    assert_eq!(store.users(), vec![linked.user.clone()]);
    assert_eq!(store.identities(), vec![linked.identity.clone()]);

    let audit_log = store.audit_log();
    assert_eq!(audit_log.len(), 1);
    assert_eq!(audit_log[0].action, AuditAction::IdentityLinked);
    assert_eq!(audit_log[0].actor_id, user.id);
    assert_eq!(audit_log[0].target_id, linked.identity.id);
    assert_eq!(audit_log[0].provider, PROVIDER);
}

#[tokio::test]
async fn test_link_by_issuer_and_client_id() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let request = LinkRequest {
        provider: None,
        client_id: Some("client-a".to_owned()),
        issuer: Some(ISSUER.to_owned()),
        ..request()
    };

    let linked = linker(Some(token(&["client-a"], Some("abc"))), false)
        .link(&factory, &mut rng, &clock, user, &request)
        .await
        .unwrap();
    assert_eq!(linked.identity.provider, PROVIDER);
}

#[tokio::test]
async fn test_relink_by_same_user() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let linker = linker(Some(token(&["client-a"], Some("abc"))), false);
    let linked = linker
        .link(&factory, &mut rng, &clock, user.clone(), &request())
        .await
        .unwrap();

    let err = linker
        .link(&factory, &mut rng, &clock, linked.user.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LinkError::IdentityAlreadyExists(IdentityConflict::LinkedToThisUser)
    );
    assert_eq!(err.to_string(), "Identity is already linked to this user");

    assert_eq!(store.users(), vec![linked.user]);
    assert_eq!(store.identities(), vec![linked.identity]);
    assert_eq!(store.audit_log().len(), 1);
}

#[tokio::test]
async fn test_link_identity_of_another_user() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let alice = create_user(&store, &mut rng, &clock).await;
    let bob = create_user(&store, &mut rng, &clock).await;

    let linker = linker(Some(token(&["client-a"], Some("abc"))), false);
    let linked = linker
        .link(&factory, &mut rng, &clock, alice, &request())
        .await
        .unwrap();

    let err = linker
        .link(&factory, &mut rng, &clock, bob.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LinkError::IdentityAlreadyExists(IdentityConflict::LinkedToAnotherUser)
    );
    assert_eq!(err.kind(), LinkErrorKind::LinkedToAnotherUser);

    // Neither account changed
    let users = store.users();
    assert!(users.contains(&linked.user));
    assert!(users.contains(&bob));
    assert_eq!(store.identities(), vec![linked.identity]);
    assert_eq!(store.audit_log().len(), 1);
}

#[tokio::test]
async fn test_unacceptable_audience() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let err = linker(Some(token(&["client-b"], Some("abc"))), false)
        .link(&factory, &mut rng, &clock, user.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(err, LinkError::UnacceptableAudience);

    assert_untouched(&store, &[&user]);
}

#[tokio::test]
async fn test_nonce_mismatch() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let err = linker(Some(token(&["client-a"], Some("xyz"))), false)
        .link(&factory, &mut rng, &clock, user.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(err, LinkError::InvalidNonce);

    assert_untouched(&store, &[&user]);
}

#[tokio::test]
async fn test_nonce_check_skipped_by_provider() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    linker(Some(token(&["client-a"], None)), true)
        .link(&factory, &mut rng, &clock, user, &request())
        .await
        .unwrap();

    assert_eq!(store.identities().len(), 1);
}

#[tokio::test]
async fn test_request_errors() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;
    let linker = linker(Some(token(&["client-a"], Some("abc"))), false);

    let req = LinkRequest {
        id_token: String::new(),
        ..request()
    };
    let err = linker
        .link(&factory, &mut rng, &clock, user.clone(), &req)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), LinkErrorKind::ValidationFailed);

    let req = LinkRequest {
        provider: Some("github".to_owned()),
        ..request()
    };
    let err = linker
        .link(&factory, &mut rng, &clock, user.clone(), &req)
        .await
        .unwrap_err();
    assert_matches!(err, LinkError::ProviderResolution(_));

    assert_untouched(&store, &[&user]);
}

#[tokio::test]
async fn test_invalid_token() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let user = create_user(&store, &mut rng, &clock).await;

    let err = linker(None, false)
        .link(&factory, &mut rng, &clock, user.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(err, LinkError::InvalidToken(IdTokenError::NoKeys));
    assert_eq!(err.to_string(), "Bad ID token");

    assert_untouched(&store, &[&user]);
}

#[tokio::test]
async fn test_failures_roll_everything_back() {
    for point in [
        FailPoint::IdentityAdd,
        FailPoint::UserMergeMetadata,
        FailPoint::UserAddProvider,
        FailPoint::AuditLogAdd,
        FailPoint::Commit,
    ] {
        let store = MemoryStore::new();
        let factory = MemoryRepositoryFactory::new(store.clone());
        let mut rng = ChaChaRng::seed_from_u64(42);
        let clock = MockClock::default();
        let user = create_user(&store, &mut rng, &clock).await;
        let linker = linker(Some(token(&["client-a"], Some("abc"))), false);

        store.fail_at(point);
        let err = linker
            .link(&factory, &mut rng, &clock, user.clone(), &request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LinkErrorKind::Internal, "at {point:?}");
        assert_untouched(&store, &[&user]);

        // Nothing was left behind which would block a retry
        store.clear_fail_points();
        linker
            .link(&factory, &mut rng, &clock, user, &request())
            .await
            .unwrap();
        assert_eq!(store.identities().len(), 1);
        assert_eq!(store.audit_log().len(), 1);
    }
}

/// Commits an identity for `competitor` right after handing out the unit of
/// work which writes the link
struct RacingFactory {
    store: MemoryStore,
    competitor: User,
    creates: AtomicUsize,
}

#[async_trait]
impl RepositoryFactory for RacingFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        let repo = self.store.repository().boxed();

        // The first repository is the read-only conflict check
        if self.creates.fetch_add(1, Ordering::SeqCst) == 1 {
            let mut other = self.store.repository().boxed();
            other
                .identity()
                .add(
                    &mut ChaChaRng::seed_from_u64(7),
                    &MockClock::default(),
                    &self.competitor,
                    PROVIDER.to_owned(),
                    SUBJECT.to_owned(),
                    Metadata::new(),
                )
                .await?;
            other.save().await?;
        }

        Ok(repo)
    }
}

#[tokio::test]
async fn test_concurrent_link_by_another_user() {
    let store = MemoryStore::new();
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let alice = create_user(&store, &mut rng, &clock).await;
    let bob = create_user(&store, &mut rng, &clock).await;

    let factory = RacingFactory {
        store: store.clone(),
        competitor: bob.clone(),
        creates: AtomicUsize::new(0),
    };

    let err = linker(Some(token(&["client-a"], Some("abc"))), false)
        .link(&factory, &mut rng, &clock, alice.clone(), &request())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LinkError::IdentityAlreadyExists(IdentityConflict::LinkedToAnotherUser)
    );

    // Only the identity of the winner exists, and alice is untouched
    let identities = store.identities();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].user_id, bob.id);
    assert!(store.users().contains(&alice));
    assert!(store.audit_log().is_empty());
}

#[tokio::test]
async fn test_concurrent_link_by_same_user() {
    let store = MemoryStore::new();
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let alice = create_user(&store, &mut rng, &clock).await;

    let factory = RacingFactory {
        store: store.clone(),
        competitor: alice.clone(),
        creates: AtomicUsize::new(0),
    };

    let err = linker(Some(token(&["client-a"], Some("abc"))), false)
        .link(&factory, &mut rng, &clock, alice, &request())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LinkError::IdentityAlreadyExists(IdentityConflict::LinkedToThisUser)
    );
    assert_eq!(store.identities().len(), 1);
    assert!(store.audit_log().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_requests_link_once() {
    let store = MemoryStore::new();
    let factory = MemoryRepositoryFactory::new(store.clone());
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = Arc::new(MockClock::default());

    let mut users = Vec::new();
    for _ in 0..4 {
        users.push(create_user(&store, &mut rng, &clock).await);
    }

    let linker = linker(Some(token(&["client-a"], Some("abc"))), false);
    let mut tasks = tokio::task::JoinSet::new();
    for (seed, user) in (0..).zip(users.iter().chain(users.iter()).cloned()) {
        let linker = linker.clone();
        let factory = factory.clone();
        let clock = Arc::clone(&clock);
        tasks.spawn(async move {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            linker
                .link(&factory, &mut rng, &clock, user, &request())
                .await
        });
    }

    let mut successes = 0;
    while let Some(res) = tasks.join_next().await {
        match res.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_matches!(e, LinkError::IdentityAlreadyExists(_)),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.identities().len(), 1);
    assert_eq!(store.audit_log().len(), 1);
}
