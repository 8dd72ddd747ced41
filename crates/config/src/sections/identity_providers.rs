// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{collections::HashSet, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::Error as _};
use serde_with::{serde_as, skip_serializing_none};
use url::Url;

use crate::{ConfigError, ConfigurationSection, schema::JsonWebKeySet, util::annotate};

fn default_jwks_cache_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_jwks_min_refresh_interval() -> Duration {
    Duration::from_secs(60)
}

/// Identity providers whose ID tokens can be linked to accounts
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdentityProvidersConfig {
    /// List of identity providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// How long a key set fetched from a `jwks_uri` is reused, in seconds
    #[schemars(with = "u64")]
    #[serde(default = "default_jwks_cache_ttl")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub jwks_cache_ttl: Duration,

    /// Minimum time between two fetches of the same key set, in seconds
    ///
    /// Tokens signed with an unknown key ID make the key set be fetched
    /// again, at most this often.
    #[schemars(with = "u64")]
    #[serde(default = "default_jwks_min_refresh_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub jwks_min_refresh_interval: Duration,
}

impl Default for IdentityProvidersConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            jwks_cache_ttl: default_jwks_cache_ttl(),
            jwks_min_refresh_interval: default_jwks_min_refresh_interval(),
        }
    }
}

impl IdentityProvidersConfig {
    /// Returns true if the configuration is the default one
    pub(crate) fn is_default(&self) -> bool {
        self.providers.is_empty()
            && self.jwks_cache_ttl == default_jwks_cache_ttl()
            && self.jwks_min_refresh_interval == default_jwks_min_refresh_interval()
    }
}

/// Where the signing keys of a provider come from
#[derive(Debug, Clone, Copy)]
pub enum ProviderKeys<'a> {
    /// A key set given inline
    Inline(&'a serde_json::Value),

    /// A key set fetched from a URL
    Remote(&'a Url),
}

fn issuer_example() -> &'static str {
    "https://accounts.google.com"
}

/// Configuration of one identity provider
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfig {
    /// Unique name of the provider
    ///
    /// Requests designate the provider with this name, compared
    /// case-insensitively, and it is recorded on the linked identities and in
    /// the provider list of the users.
    pub name: String,

    /// The expected `iss` claim of the ID tokens
    #[schemars(example = "issuer_example")]
    pub issuer: String,

    /// The client IDs accepted in the `aud` claim of the ID tokens
    pub client_ids: Vec<String>,

    /// Do not check the nonce of the ID tokens, even if the request has one
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_nonce_check: bool,

    /// Inline JSON Web Key Set used to verify the ID tokens
    ///
    /// Exactly one of `jwks` and `jwks_uri` must be set.
    #[schemars(with = "Option<JsonWebKeySet>")]
    pub jwks: Option<serde_json::Value>,

    /// URL of the JSON Web Key Set used to verify the ID tokens
    ///
    /// Exactly one of `jwks` and `jwks_uri` must be set.
    pub jwks_uri: Option<Url>,
}

impl ProviderConfig {
    /// Where the signing keys of this provider come from
    ///
    /// Returns `None` if neither or both of `jwks` and `jwks_uri` are set,
    /// which validation rejects.
    #[must_use]
    pub fn keys(&self) -> Option<ProviderKeys<'_>> {
        match (&self.jwks, &self.jwks_uri) {
            (Some(jwks), None) => Some(ProviderKeys::Inline(jwks)),
            (None, Some(uri)) => Some(ProviderKeys::Remote(uri)),
            _ => None,
        }
    }
}

impl ConfigurationSection for IdentityProvidersConfig {
    const PATH: Option<&'static str> = Some("identity_providers");

    fn validate(&self, figment: &figment::Figment) -> Result<(), ConfigError> {
        let mut names = HashSet::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let index = index.to_string();
            let path = ["identity_providers", "providers", index.as_str()];
            let fail = |message: String| annotate(figment, &path, figment::Error::custom(message));

            if provider.name.trim().is_empty() {
                return fail("The provider `name` must not be empty".to_owned());
            }

            if !names.insert(provider.name.to_ascii_lowercase()) {
                return fail(format!(
                    "Duplicate provider name {:?}, names must be unique",
                    provider.name
                ));
            }

            if provider.issuer.trim().is_empty() {
                return fail("The provider `issuer` must not be empty".to_owned());
            }

            if provider.client_ids.iter().all(|c| c.trim().is_empty()) {
                return fail("At least one non-blank client ID is required".to_owned());
            }

            match provider.keys() {
                Some(ProviderKeys::Inline(jwks)) => {
                    if !jwks.get("keys").is_some_and(serde_json::Value::is_array) {
                        return fail("`jwks` must be an object with a `keys` array".to_owned());
                    }
                }
                Some(ProviderKeys::Remote(_)) => {}
                None => {
                    return fail("Exactly one of `jwks` and `jwks_uri` must be set".to_owned());
                }
            }
        }

        Ok(())
    }
}
