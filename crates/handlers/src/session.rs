// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Authentication of the caller
//!
//! Sessions are established by a component in front of this service, which
//! tells who the caller is. The [`SessionResolver`] trait abstracts how that
//! information is obtained.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    response::{IntoResponse, Response},
};
use http::{HeaderName, StatusCode, request::Parts};
use idlink_data_model::User;
use idlink_storage::{
    BoxRepositoryFactory, RepositoryAccess, RepositoryError, RepositoryTransaction,
};
use thiserror::Error;
use ulid::Ulid;

use crate::ErrorResponse;

/// The default name of the header carrying the authenticated user ID
pub const DEFAULT_AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// The caller could not be authenticated
#[derive(Debug, Error)]
pub enum SessionError {
    /// No authenticated user in the request
    #[error("Missing authenticated user")]
    Missing,

    /// The authenticated user could not be parsed
    #[error("Invalid authenticated user")]
    Malformed,
}

/// Finds the ID of the user making a request
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Get the ID of the authenticated user from the request
    ///
    /// # Errors
    ///
    /// Returns an error if the request is not authenticated
    async fn user_id(&self, parts: &Parts) -> Result<Ulid, SessionError>;
}

/// A [`SessionResolver`] shared between requests
pub type SharedSessionResolver = Arc<dyn SessionResolver>;

/// Trusts a header set by an upstream component, containing the user ULID
#[derive(Debug, Clone)]
pub struct TrustedHeaderSessionResolver {
    header: HeaderName,
}

impl TrustedHeaderSessionResolver {
    /// Trust the given header
    #[must_use]
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// Box the resolver
    #[must_use]
    pub fn shared(self) -> SharedSessionResolver {
        Arc::new(self)
    }
}

impl Default for TrustedHeaderSessionResolver {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_AUTHENTICATED_USER_HEADER))
    }
}

#[async_trait]
impl SessionResolver for TrustedHeaderSessionResolver {
    async fn user_id(&self, parts: &Parts) -> Result<Ulid, SessionError> {
        let value = parts
            .headers
            .get(&self.header)
            .ok_or(SessionError::Missing)?;

        let value = value.to_str().map_err(|_| SessionError::Malformed)?;
        value.trim().parse().map_err(|_| SessionError::Malformed)
    }
}

/// Why the [`AuthenticatedUser`] extractor rejected a request
#[derive(Debug, Error)]
pub enum SessionRejection {
    /// The request is not authenticated
    #[error(transparent)]
    Unauthenticated(#[from] SessionError),

    /// The authenticated user does not exist
    #[error("User {0} not found")]
    UserNotFound(Ulid),

    /// The user could not be loaded
    #[error("Failed to load the authenticated user")]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated(_) => ErrorResponse::new("unauthorized", self.to_string())
                .into_response_with(StatusCode::UNAUTHORIZED),

            Self::UserNotFound(_) => ErrorResponse::new("user_not_found", self.to_string())
                .into_response_with(StatusCode::UNPROCESSABLE_ENTITY),

            Self::Repository(_) => {
                tracing::error!(
                    error = &self as &dyn std::error::Error,
                    "Failed to load the authenticated user"
                );
                ErrorResponse::internal(&self)
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// An extractor loading the user making the request
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    BoxRepositoryFactory: FromRef<S>,
    SharedSessionResolver: FromRef<S>,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = SharedSessionResolver::from_ref(state);
        let user_id = resolver.user_id(parts).await?;

        let repositories = BoxRepositoryFactory::from_ref(state);
        let mut repo = repositories.create().await?;
        let user = repo.user().lookup(user_id).await?;
        repo.cancel().await?;

        let user = user.ok_or(SessionRejection::UserNotFound(user_id))?;
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use http::Request;

    use super::*;

    async fn resolve(
        resolver: &TrustedHeaderSessionResolver,
        value: Option<&str>,
    ) -> Result<Ulid, SessionError> {
        let mut request = Request::get("/");
        if let Some(value) = value {
            request = request.header("x-authenticated-user", value);
        }
        let (parts, ()) = request.body(()).unwrap().into_parts();
        resolver.user_id(&parts).await
    }

    #[tokio::test]
    async fn test_trusted_header() {
        let resolver = TrustedHeaderSessionResolver::default();
        let id = Ulid::from_parts(1_642_344_000_000, 42);

        let resolved = resolve(&resolver, Some(&id.to_string())).await.unwrap();
        assert_eq!(resolved, id);

        assert_matches!(resolve(&resolver, None).await, Err(SessionError::Missing));
        assert_matches!(
            resolve(&resolver, Some("not-a-ulid")).await,
            Err(SessionError::Malformed)
        );

        // Another header is not looked at
        let resolver = TrustedHeaderSessionResolver::new(HeaderName::from_static("x-remote-user"));
        assert_matches!(
            resolve(&resolver, Some(&id.to_string())).await,
            Err(SessionError::Missing)
        );
    }
}
