// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idlink_oidc::{KeySource, VerifierConfig};
use thiserror::Error;

use crate::ProviderSelector;

/// No provider matches a [`ProviderSelector`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderResolutionError {
    /// No provider has this name
    #[error("Provider {name:?} is not configured")]
    UnknownProvider {
        /// The requested provider name
        name: String,
    },

    /// No provider has this issuer and client ID
    #[error("No provider configured for issuer {issuer:?} and client_id {client_id:?}")]
    UnknownIssuer {
        /// The requested client ID
        client_id: String,

        /// The requested issuer
        issuer: String,
    },
}

/// Everything needed to verify and link a token from a provider
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    /// The label identities and user provider lists are recorded with
    pub provider_type: String,

    /// How ID tokens from this provider are verified
    pub verifier: VerifierConfig,

    /// Whether the nonce check is skipped for this provider
    pub skip_nonce_check: bool,

    /// The client IDs accepted in the token audience, in order
    pub acceptable_client_ids: Vec<String>,
}

/// Finds the provider a link request is for
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// Resolve a [`ProviderSelector`]
    ///
    /// # Errors
    ///
    /// Returns an error if no provider matches
    async fn resolve(
        &self,
        selector: &ProviderSelector,
    ) -> Result<ResolvedProvider, ProviderResolutionError>;
}

/// The settings of a configured provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// The provider name, also used as its provider type
    pub name: String,

    /// The expected issuer
    pub issuer: String,

    /// The client IDs tokens may be issued to
    pub client_ids: Vec<String>,

    /// Skip the nonce check for this provider
    pub skip_nonce_check: bool,

    /// Where the signing keys come from
    pub keys: KeySource,
}

impl ProviderSettings {
    fn resolved(&self) -> ResolvedProvider {
        ResolvedProvider {
            provider_type: self.name.clone(),
            verifier: VerifierConfig {
                issuer: self.issuer.clone(),
                keys: self.keys.clone(),
            },
            skip_nonce_check: self.skip_nonce_check,
            acceptable_client_ids: self.client_ids.clone(),
        }
    }
}

/// A [`ProviderResolver`] over a fixed list of providers
#[derive(Debug, Clone, Default)]
pub struct ConfiguredProviderResolver {
    providers: Vec<ProviderSettings>,
}

impl ConfiguredProviderResolver {
    /// Create a resolver over the given providers
    #[must_use]
    pub fn new(providers: Vec<ProviderSettings>) -> Self {
        Self { providers }
    }

    /// Resolve a selector without going through the async trait
    ///
    /// # Errors
    ///
    /// Returns an error if no provider matches
    pub fn find(
        &self,
        selector: &ProviderSelector,
    ) -> Result<ResolvedProvider, ProviderResolutionError> {
        let provider = match selector {
            ProviderSelector::Named(name) => self
                .providers
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ProviderResolutionError::UnknownProvider { name: name.clone() })?,

            ProviderSelector::Issuer { client_id, issuer } => self
                .providers
                .iter()
                .find(|p| p.issuer == *issuer && p.client_ids.iter().any(|c| c == client_id))
                .ok_or_else(|| ProviderResolutionError::UnknownIssuer {
                    client_id: client_id.clone(),
                    issuer: issuer.clone(),
                })?,
        };

        Ok(provider.resolved())
    }
}

#[async_trait]
impl ProviderResolver for ConfiguredProviderResolver {
    async fn resolve(
        &self,
        selector: &ProviderSelector,
    ) -> Result<ResolvedProvider, ProviderResolutionError> {
        self.find(selector)
    }
}
