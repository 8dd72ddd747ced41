// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idlink_oidc::IdTokenError;
use idlink_storage::RepositoryError;
use thiserror::Error;

use crate::provider::ProviderResolutionError;

/// Who an already-linked identity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityConflict {
    /// The identity is already linked to the requesting user
    LinkedToThisUser,

    /// The identity is linked to a different user
    LinkedToAnotherUser,
}

impl std::fmt::Display for IdentityConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkedToThisUser => f.write_str("Identity is already linked to this user"),
            Self::LinkedToAnotherUser => f.write_str("Identity is already linked to another user"),
        }
    }
}

/// Errors which can occur when linking an identity
#[derive(Debug, Error)]
pub enum LinkError {
    /// The request is missing required parameters
    #[error("{0}")]
    ValidationFailed(&'static str),

    /// No provider matches the request
    #[error(transparent)]
    ProviderResolution(#[from] ProviderResolutionError),

    /// The ID token failed verification
    #[error("Bad ID token")]
    InvalidToken(#[source] IdTokenError),

    /// None of the token audiences is an accepted client ID
    #[error("Unacceptable audience in id_token")]
    UnacceptableAudience,

    /// The token nonce does not match the request nonce
    #[error("Invalid nonce")]
    InvalidNonce,

    /// The identity is already linked to a user
    #[error("{0}")]
    IdentityAlreadyExists(IdentityConflict),

    /// The storage backend failed
    #[error("{message}")]
    Internal {
        /// What was being done when the backend failed
        message: &'static str,

        /// The backend error
        #[source]
        source: RepositoryError,
    },
}

impl LinkError {
    /// Wrap a storage error, describing what was being done
    pub(crate) fn storage(message: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |source| Self::Internal { message, source }
    }

    /// The stable kind of this error
    #[must_use]
    pub fn kind(&self) -> LinkErrorKind {
        match self {
            Self::ValidationFailed(_) => LinkErrorKind::ValidationFailed,
            Self::ProviderResolution(_) => LinkErrorKind::ProviderNotFound,
            Self::InvalidToken(_) => LinkErrorKind::BadIdToken,
            Self::UnacceptableAudience => LinkErrorKind::UnacceptableAudience,
            Self::InvalidNonce => LinkErrorKind::InvalidNonce,
            Self::IdentityAlreadyExists(IdentityConflict::LinkedToThisUser) => {
                LinkErrorKind::LinkedToThisUser
            }
            Self::IdentityAlreadyExists(IdentityConflict::LinkedToAnotherUser) => {
                LinkErrorKind::LinkedToAnotherUser
            }
            Self::Internal { .. } => LinkErrorKind::Internal,
        }
    }

    /// Whether this error comes from a uniqueness constraint of the backend
    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Internal { source, .. } if source.is_unique_violation())
    }
}

/// The kind of a [`LinkError`], with a stable machine-readable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkErrorKind {
    /// See [`LinkError::ValidationFailed`]
    ValidationFailed,

    /// See [`LinkError::ProviderResolution`]
    ProviderNotFound,

    /// See [`LinkError::InvalidToken`]
    BadIdToken,

    /// See [`LinkError::UnacceptableAudience`]
    UnacceptableAudience,

    /// See [`IdentityConflict::LinkedToThisUser`]
    LinkedToThisUser,

    /// See [`IdentityConflict::LinkedToAnotherUser`]
    LinkedToAnotherUser,

    /// See [`LinkError::InvalidNonce`]
    InvalidNonce,

    /// See [`LinkError::Internal`]
    Internal,
}

impl LinkErrorKind {
    /// The code of this kind, as used in API responses and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::ProviderNotFound => "provider_not_found",
            Self::BadIdToken => "bad_id_token",
            Self::UnacceptableAudience => "unacceptable_audience",
            Self::InvalidNonce => "invalid_nonce",
            Self::LinkedToThisUser => "linked_to_this_user",
            Self::LinkedToAnotherUser => "linked_to_another_user",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for LinkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
