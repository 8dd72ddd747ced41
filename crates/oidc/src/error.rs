// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use jsonwebtoken::Algorithm;
use thiserror::Error;
use url::Url;

/// Errors which can occur when fetching a JSON Web Key Set
#[derive(Debug, Error)]
pub enum JwksError {
    /// The request to the `jwks_uri` failed
    #[error("Failed to fetch the JWKS from {uri}")]
    Http {
        /// The `jwks_uri`
        uri: Url,

        /// The underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The `jwks_uri` replied with a non-success status
    #[error("The JWKS endpoint {uri} replied with status {status}")]
    Status {
        /// The `jwks_uri`
        uri: Url,

        /// The HTTP status returned
        status: reqwest::StatusCode,
    },

    /// The response was bigger than what we accept
    #[error("The JWKS from {uri} is too large ({size} bytes)")]
    TooLarge {
        /// The `jwks_uri`
        uri: Url,

        /// The size of the response body
        size: usize,
    },

    /// The response could not be parsed as a JWKS
    #[error("The JWKS from {uri} is invalid")]
    Parse {
        /// The `jwks_uri`
        uri: Url,

        /// The JSON parsing error
        #[source]
        source: serde_json::Error,
    },
}

/// Errors which can occur when verifying an ID token
#[derive(Debug, Error)]
pub enum IdTokenError {
    /// The JOSE header of the token could not be decoded
    #[error("Invalid ID token header")]
    InvalidHeader(#[source] jsonwebtoken::errors::Error),

    /// The token has no `kid` and the key set has more than one key
    #[error("ID token has no key ID and the provider has several keys")]
    MissingKeyId,

    /// No key matches the `kid` of the token, even after refreshing the key set
    #[error("No key with ID {kid:?} in the provider key set")]
    UnknownKey {
        /// The `kid` from the token header
        kid: String,
    },

    /// The key set is empty
    #[error("The provider key set is empty")]
    NoKeys,

    /// The key advertises an algorithm which cannot sign tokens
    #[error("Unsupported signing algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// The algorithm in the token header does not match the one of the key
    #[error("ID token is signed with {token:?} but the key expects {key:?}")]
    AlgorithmMismatch {
        /// The algorithm expected by the key
        key: Algorithm,

        /// The algorithm from the token header
        token: Algorithm,
    },

    /// The key cannot be used with the token algorithm
    #[error("Key type cannot be used with {0:?}")]
    IncompatibleKey(Algorithm),

    /// The key could not be loaded
    #[error("Invalid key in the provider key set")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    /// The signature or one of the claims is invalid
    #[error("ID token signature or claims are invalid")]
    Claims(#[source] jsonwebtoken::errors::Error),

    /// The `at_hash` claim does not match the access token
    #[error("The at_hash claim does not match the access token")]
    AccessTokenHashMismatch,

    /// The key set could not be fetched
    #[error(transparent)]
    Jwks(#[from] JwksError),
}
