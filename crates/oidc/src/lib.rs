// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Verification of OpenID Connect ID tokens
//!
//! The [`TokenVerifier`] trait is the contract the linking flow relies on: it
//! takes a compact-serialized ID token and the configuration of the provider
//! which issued it, and returns the verified claims as a [`VerifiedIdToken`].
//!
//! [`JwksVerifier`] implements it with keys from a JSON Web Key Set, either
//! given inline or fetched (and cached) from a `jwks_uri`.
//!
//! The audience of the token is deliberately *not* checked here: the caller
//! matches it against the set of client IDs it accepts.
//!
//! [`VerifiedIdToken`]: idlink_data_model::VerifiedIdToken

#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod claims;
mod error;
mod jwks;
mod verifier;

pub use jsonwebtoken::jwk::JwkSet;

pub use self::{
    claims::{Audience, profile_metadata},
    error::{IdTokenError, JwksError},
    jwks::JwksCache,
    verifier::{JwksVerifier, KeySource, TokenVerifier, VerifierConfig, VerifyOptions},
};
