// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::Deserialize;

use crate::LinkError;

/// Parameters of a request to link an identity from an ID token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkRequest {
    /// The compact-serialized ID token
    #[serde(default)]
    pub id_token: String,

    /// The access token issued alongside the ID token
    #[serde(default)]
    pub access_token: Option<String>,

    /// The nonce sent in the authorization request
    #[serde(default)]
    pub nonce: Option<String>,

    /// The name of a configured provider
    #[serde(default)]
    pub provider: Option<String>,

    /// The client ID the token was issued to, used with `issuer`
    #[serde(default)]
    pub client_id: Option<String>,

    /// The issuer of the token, used with `client_id`
    #[serde(default)]
    pub issuer: Option<String>,
}

/// How the provider of a [`LinkRequest`] is designated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelector {
    /// By the name of a configured provider
    Named(String),

    /// By the issuer of the token and the client it was issued to
    Issuer {
        /// The client ID
        client_id: String,

        /// The issuer URL
        issuer: String,
    },
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl LinkRequest {
    /// The access token, if one was given
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_ref())
    }

    /// The nonce, if one was given
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        non_empty(self.nonce.as_ref())
    }

    /// Check the request has the parameters needed to find its provider
    ///
    /// A provider name takes precedence over the `client_id` and `issuer`
    /// pair.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ValidationFailed`] if the ID token is missing, or
    /// if neither a provider name nor both `client_id` and `issuer` are set
    pub fn validate(&self) -> Result<ProviderSelector, LinkError> {
        if self.id_token.is_empty() {
            return Err(LinkError::ValidationFailed("id_token is required"));
        }

        if let Some(name) = non_empty(self.provider.as_ref()) {
            return Ok(ProviderSelector::Named(name.to_owned()));
        }

        match (
            non_empty(self.client_id.as_ref()),
            non_empty(self.issuer.as_ref()),
        ) {
            (Some(client_id), Some(issuer)) => Ok(ProviderSelector::Issuer {
                client_id: client_id.to_owned(),
                issuer: issuer.to_owned(),
            }),
            _ => Err(LinkError::ValidationFailed(
                "provider or client_id and issuer are required",
            )),
        }
    }
}
