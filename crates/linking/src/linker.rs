// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use idlink_data_model::{Clock, Identity, Ulid, User, VerifiedIdToken};
use idlink_oidc::{TokenVerifier, VerifyOptions};
use idlink_storage::{
    BoxRepository, RepositoryAccess, RepositoryError, RepositoryFactory, RepositoryTransaction,
};
use opentelemetry::KeyValue;
use rand_core::RngCore;
use tracing::Instrument;

use crate::{
    IdentityConflict, LinkError, LinkRequest, ProviderResolver, ResolvedProvider,
    audit::record_identity_link,
    checks::{match_audience, validate_nonce},
    conflict::resolve_conflict,
    telemetry::LINK_COUNTER,
};

/// The outcome of a successful link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedUser {
    /// The user, with its metadata and provider list updated
    pub user: User,

    /// All the identities of the user, including the new one
    pub identities: Vec<Identity>,

    /// The newly linked identity
    pub identity: Identity,
}

/// Links identities from ID tokens to user accounts
#[derive(Clone)]
pub struct IdentityLinker {
    resolver: Arc<dyn ProviderResolver>,
    verifier: Arc<dyn TokenVerifier>,
}

impl std::fmt::Debug for IdentityLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityLinker").finish_non_exhaustive()
    }
}

impl IdentityLinker {
    /// Create a new linker
    #[must_use]
    pub fn new(resolver: Arc<dyn ProviderResolver>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { resolver, verifier }
    }

    /// Link the identity from the ID token in `request` to `user`
    ///
    /// All the checks on the request and the token run before anything is
    /// written. The identity, the user updates and the audit log entry are
    /// then written in a single unit of work, which is rolled back if any of
    /// them fails.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if any check fails, if the identity is already
    /// linked, or if the storage backend fails
    #[tracing::instrument(
        name = "linking.link",
        skip_all,
        fields(user.id = %user.id, identity.provider, identity.subject),
        err,
    )]
    pub async fn link(
        &self,
        repositories: &(dyn RepositoryFactory + Send + Sync),
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: User,
        request: &LinkRequest,
    ) -> Result<LinkedUser, LinkError> {
        let (provider, token) = match self.verify_request(request).await {
            Ok(verified) => verified,
            Err(e) => {
                record_outcome(None, Err(&e));
                return Err(e);
            }
        };

        let span = tracing::Span::current();
        span.record("identity.provider", provider.provider_type.as_str());
        span.record("identity.subject", token.subject.as_str());

        let res = store_link(repositories, rng, clock, user, &provider.provider_type, token).await;
        record_outcome(Some(&provider.provider_type), res.as_ref().map(|_| ()));

        if let Ok(linked) = &res {
            tracing::info!(identity.id = %linked.identity.id, "Linked identity");
        }

        res
    }

    /// Run the checks which do not need the storage
    async fn verify_request(
        &self,
        request: &LinkRequest,
    ) -> Result<(ResolvedProvider, VerifiedIdToken), LinkError> {
        let selector = request.validate()?;

        let provider = self.resolver.resolve(&selector).await?;

        let options = VerifyOptions {
            access_token: request.access_token(),
        };
        let token = self
            .verifier
            .verify(&provider.verifier, &request.id_token, options)
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = &e as &dyn std::error::Error,
                    provider = %provider.provider_type,
                    "Rejected ID token"
                );
                LinkError::InvalidToken(e)
            })?;

        match_audience(&token.audience, &provider.acceptable_client_ids)?;

        validate_nonce(
            provider.skip_nonce_check,
            request.nonce(),
            token.nonce.as_deref(),
        )?;

        Ok((provider, token))
    }
}

fn record_outcome(provider: Option<&str>, res: Result<(), &LinkError>) {
    let result = match res {
        Ok(()) => "success",
        Err(e) => e.kind().as_str(),
    };

    let mut attributes = vec![KeyValue::new("result", result)];
    if let Some(provider) = provider {
        attributes.push(KeyValue::new("provider", provider.to_owned()));
    }

    LINK_COUNTER.add(1, &attributes);
}

/// Run the conflict check in a throwaway unit of work, then write the link
async fn store_link(
    repositories: &(dyn RepositoryFactory + Send + Sync),
    rng: &mut (dyn RngCore + Send),
    clock: &dyn Clock,
    user: User,
    provider_type: &str,
    token: VerifiedIdToken,
) -> Result<LinkedUser, LinkError> {
    let mut repo = repositories
        .create()
        .await
        .map_err(LinkError::storage("Error starting transaction"))?;
    let res = resolve_conflict(&mut repo, &user, provider_type, &token.subject).await;
    repo.cancel()
        .await
        .map_err(LinkError::storage("Error closing transaction"))?;
    res?;

    let repo = repositories
        .create()
        .await
        .map_err(LinkError::storage("Error starting transaction"))?;

    let user_id = user.id;
    let subject = token.subject.clone();
    match commit_link(repo, rng, clock, user, provider_type, token).await {
        Err(e) if e.is_unique_violation() => {
            tracing::info!("Identity was linked concurrently");
            Err(classify_concurrent_link(repositories, user_id, provider_type, &subject).await)
        }
        res => res,
    }
}

/// Find out who won a concurrent link of the same identity
async fn classify_concurrent_link(
    repositories: &(dyn RepositoryFactory + Send + Sync),
    user_id: Ulid,
    provider_type: &str,
    subject: &str,
) -> LinkError {
    let lookup = async {
        let mut repo = repositories.create().await?;
        let identity = repo
            .identity()
            .find_by_subject(provider_type, subject)
            .await?;
        repo.cancel().await?;
        Ok::<_, RepositoryError>(identity)
    };

    let conflict = match lookup.await {
        Ok(Some(identity)) if identity.is_owned_by(user_id) => IdentityConflict::LinkedToThisUser,
        Ok(_) => IdentityConflict::LinkedToAnotherUser,
        Err(e) => {
            tracing::warn!(
                error = &e as &dyn std::error::Error,
                "Could not look up the concurrently linked identity"
            );
            IdentityConflict::LinkedToAnotherUser
        }
    };

    LinkError::IdentityAlreadyExists(conflict)
}

/// Write the link in `repo` and commit it, or roll everything back
async fn commit_link(
    mut repo: BoxRepository,
    rng: &mut (dyn RngCore + Send),
    clock: &dyn Clock,
    user: User,
    provider_type: &str,
    token: VerifiedIdToken,
) -> Result<LinkedUser, LinkError> {
    let span = tracing::info_span!("linking.unit_of_work");
    let res = apply_link(&mut repo, rng, clock, user, provider_type, token)
        .instrument(span)
        .await;

    match res {
        Ok(linked) => {
            repo.save()
                .await
                .map_err(LinkError::storage("Error committing identity link"))?;
            Ok(linked)
        }

        Err(e) => {
            if let Err(cancel_error) = repo.cancel().await {
                tracing::error!(
                    error = &cancel_error as &dyn std::error::Error,
                    "Failed to roll back identity link"
                );
            }
            Err(e)
        }
    }
}

async fn apply_link(
    repo: &mut BoxRepository,
    rng: &mut (dyn RngCore + Send),
    clock: &dyn Clock,
    user: User,
    provider_type: &str,
    token: VerifiedIdToken,
) -> Result<LinkedUser, LinkError> {
    // The identity may have been linked since the first check
    resolve_conflict(repo, &user, provider_type, &token.subject).await?;

    let identity = repo
        .identity()
        .add(
            rng,
            clock,
            &user,
            provider_type.to_owned(),
            token.subject,
            token.metadata,
        )
        .await
        .map_err(LinkError::storage("Error creating identity"))?;

    let user = repo
        .user()
        .merge_metadata(user, &identity.metadata)
        .await
        .map_err(LinkError::storage("Error updating user metadata"))?;

    let user = repo
        .user()
        .add_provider(user, provider_type)
        .await
        .map_err(LinkError::storage("Error updating user providers"))?;

    record_identity_link(repo, rng, clock, &user, &identity).await?;

    let identities = repo
        .identity()
        .list_for_user(&user)
        .await
        .map_err(LinkError::storage("Error listing identities"))?;

    Ok(LinkedUser {
        user,
        identities,
        identity,
    })
}
