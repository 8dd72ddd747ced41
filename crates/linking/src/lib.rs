// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Linking of third-party identities to user accounts
//!
//! An authenticated user presents an ID token from an OpenID Connect provider.
//! The [`IdentityLinker`] validates the request, finds the provider with a
//! [`ProviderResolver`], verifies the token with a
//! [`TokenVerifier`](idlink_oidc::TokenVerifier) and checks its audience and
//! nonce. Only then does it touch the storage: it checks that the
//! `(provider, subject)` pair is not linked yet, and writes the new identity,
//! the user updates and an audit log entry in a single unit of work.

#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod audit;
mod checks;
mod conflict;
mod error;
mod linker;
mod provider;
mod request;
mod telemetry;

#[cfg(test)]
mod tests;

pub use self::{
    audit::record_identity_link,
    checks::{match_audience, validate_nonce},
    conflict::resolve_conflict,
    error::{IdentityConflict, LinkError, LinkErrorKind},
    linker::{IdentityLinker, LinkedUser},
    provider::{
        ConfiguredProviderResolver, ProviderResolutionError, ProviderResolver, ProviderSettings,
        ResolvedProvider,
    },
    request::{LinkRequest, ProviderSelector},
};
