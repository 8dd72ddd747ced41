// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
};

use axum::extract::{FromRef, FromRequestParts};
use http::{Request, Response, StatusCode, header::CONTENT_TYPE};
use idlink_data_model::{BoxClock, BoxRng, MockClock, User};
use idlink_linking::{ConfiguredProviderResolver, IdentityLinker, ProviderSettings};
use idlink_oidc::{JwkSet, JwksVerifier, KeySource};
use idlink_storage::{
    BoxRepositoryFactory, RepositoryAccess, RepositoryFactory, RepositoryTransaction,
};
use idlink_storage_memory::{MemoryRepositoryFactory, MemoryStore};
use jsonwebtoken::{Algorithm, EncodingKey, Header, get_current_timestamp};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tower::ServiceExt;
use ulid::Ulid;

use crate::{SharedSessionResolver, TrustedHeaderSessionResolver};

pub(crate) const ISSUER: &str = "https://accounts.example.com";
pub(crate) const PROVIDER: &str = "example";
pub(crate) const CLIENT_ID: &str = "client-a";
pub(crate) const SUBJECT: &str = "248289761001";

const SIGNING_SECRET: &[u8] = b"idlink-test-signing-secret-000001";
const SIGNING_KEY_ID: &str = "test";

/// Setup tracing for tests.
#[allow(unused_must_use)]
pub(crate) fn setup() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn signing_keys() -> JwkSet {
    serde_json::from_value(json!({
        "keys": [{
            "kty": "oct",
            "kid": SIGNING_KEY_ID,
            "alg": "HS256",
            "k": "aWRsaW5rLXRlc3Qtc2lnbmluZy1zZWNyZXQtMDAwMDAx",
        }],
    }))
    .unwrap()
}

#[derive(Clone)]
pub(crate) struct TestState {
    pub repository_factory: MemoryRepositoryFactory,
    pub linker: IdentityLinker,
    pub session_resolver: SharedSessionResolver,
    pub clock: Arc<MockClock>,
    pub rng: Arc<Mutex<ChaChaRng>>,
}

impl TestState {
    /// Create a new test state, with a single provider signing its tokens
    /// with an inline HS256 key
    pub fn new() -> Self {
        let provider = ProviderSettings {
            name: PROVIDER.to_owned(),
            issuer: ISSUER.to_owned(),
            client_ids: vec![CLIENT_ID.to_owned()],
            skip_nonce_check: false,
            keys: KeySource::Inline(signing_keys()),
        };

        let resolver = ConfiguredProviderResolver::new(vec![provider]);
        let verifier = JwksVerifier::new(reqwest::Client::new());
        let linker = IdentityLinker::new(Arc::new(resolver), Arc::new(verifier));

        Self {
            repository_factory: MemoryRepositoryFactory::new(MemoryStore::new()),
            linker,
            session_resolver: TrustedHeaderSessionResolver::default().shared(),
            clock: Arc::new(MockClock::default()),
            rng: Arc::new(Mutex::new(ChaChaRng::seed_from_u64(42))),
        }
    }

    pub async fn request(&self, request: Request<String>) -> Response<String> {
        let app = crate::router(self.clone());
        let Ok(response) = app.oneshot(request).await;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("Failed to read response body");
        let body = std::str::from_utf8(&body)
            .expect("Response body is not valid UTF-8")
            .to_owned();

        Response::from_parts(parts, body)
    }

    /// The store behind the repositories
    pub fn store(&self) -> &MemoryStore {
        self.repository_factory.store()
    }

    /// Returns a new random number generator.
    ///
    /// # Panics
    ///
    /// Panics if the RNG is already locked.
    pub fn rng(&self) -> ChaChaRng {
        let mut parent_rng = self.rng.try_lock().expect("Failed to lock RNG");
        ChaChaRng::from_rng(&mut *parent_rng).unwrap()
    }

    /// Create a user with the given metadata
    pub async fn create_user(&self, metadata: Value) -> User {
        let metadata = metadata.as_object().cloned().expect("metadata is an object");
        let mut rng = self.rng();

        let mut repo = self.repository_factory.create().await.unwrap();
        let user = repo
            .user()
            .add(&mut rng, &self.clock, metadata)
            .await
            .unwrap();
        repo.save().await.unwrap();

        user
    }

    /// Sign an ID token from the test provider, with the given claims
    /// overriding the default ones
    pub fn id_token(&self, overrides: Value) -> String {
        let now = get_current_timestamp();
        let mut claims = json!({
            "iss": ISSUER,
            "sub": SUBJECT,
            "aud": CLIENT_ID,
            "iat": now,
            "exp": now + 300,
            "name": "Alice Liddell",
            "email": "alice@example.com",
            "email_verified": true,
        });

        if let (Some(claims), Value::Object(overrides)) = (claims.as_object_mut(), overrides) {
            claims.extend(overrides);
        }

        let header = Header {
            kid: Some(SIGNING_KEY_ID.to_owned()),
            ..Header::new(Algorithm::HS256)
        };
        jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(SIGNING_SECRET))
            .unwrap()
    }

    /// Check that nothing was written for the given user
    #[track_caller]
    pub fn assert_untouched(&self, user: &User) {
        let store = self.store();

        let current = store
            .users()
            .into_iter()
            .find(|u| u.id == user.id)
            .expect("user to exist");
        assert_eq!(&current, user);

        assert!(!store.identities().iter().any(|i| i.user_id == user.id));
        assert!(!store.audit_log().iter().any(|e| e.actor_id == user.id));
    }
}

impl FromRef<TestState> for BoxRepositoryFactory {
    fn from_ref(input: &TestState) -> Self {
        input.repository_factory.clone().boxed()
    }
}

impl FromRef<TestState> for IdentityLinker {
    fn from_ref(input: &TestState) -> Self {
        input.linker.clone()
    }
}

impl FromRef<TestState> for SharedSessionResolver {
    fn from_ref(input: &TestState) -> Self {
        Arc::clone(&input.session_resolver)
    }
}

impl FromRequestParts<TestState> for BoxClock {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut axum::http::request::Parts,
        state: &TestState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Box::new(state.clock.clone()))
    }
}

impl FromRequestParts<TestState> for BoxRng {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut axum::http::request::Parts,
        state: &TestState,
    ) -> Result<Self, Self::Rejection> {
        let mut parent_rng = state.rng.lock().expect("Failed to lock RNG");
        let rng = ChaChaRng::from_rng(&mut *parent_rng).expect("Failed to seed RNG");
        Ok(Box::new(rng))
    }
}

pub(crate) trait RequestBuilderExt {
    /// Builds the request with the given JSON value as body.
    fn json<T: Serialize>(self, body: T) -> Request<String>;

    /// Sets the header telling which user is authenticated.
    fn authenticated(self, user_id: Ulid) -> Self;

    /// Builds the request with an empty body.
    fn empty(self) -> Request<String>;
}

impl RequestBuilderExt for http::request::Builder {
    fn json<T: Serialize>(self, body: T) -> Request<String> {
        self.header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(&body).unwrap())
            .unwrap()
    }

    fn authenticated(self, user_id: Ulid) -> Self {
        self.header("x-authenticated-user", user_id.to_string())
    }

    fn empty(self) -> Request<String> {
        self.body(String::new()).unwrap()
    }
}

pub(crate) trait ResponseExt {
    /// Asserts that the response has the given status code.
    ///
    /// # Panics
    ///
    /// Panics if the response has a different status code.
    fn assert_status(&self, status: StatusCode);

    /// Get the response body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the response is missing the `Content-Type: application/json`,
    /// or if the body is not valid JSON.
    fn json<T: DeserializeOwned>(&self) -> T;
}

impl ResponseExt for Response<String> {
    #[track_caller]
    fn assert_status(&self, status: StatusCode) {
        assert_eq!(
            self.status(),
            status,
            "HTTP status code mismatch: got {}, expected {}. Body: {}",
            self.status(),
            status,
            self.body()
        );
    }

    #[track_caller]
    fn json<T: DeserializeOwned>(&self) -> T {
        assert_eq!(
            self.headers().get(CONTENT_TYPE).map(http::HeaderValue::as_bytes),
            Some(&b"application/json"[..]),
        );
        serde_json::from_str(self.body()).expect("JSON deserialization failed")
    }
}
