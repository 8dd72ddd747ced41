// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idlink_data_model::{Metadata, VerifiedIdToken};
use serde::Deserialize;
use serde_json::Value;

/// The `aud` claim, which can be a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience
    Single(String),

    /// A list of audiences
    Multiple(Vec<String>),
}

impl Default for Audience {
    fn default() -> Self {
        Self::Multiple(Vec::new())
    }
}

impl Audience {
    /// The audience as a list, in the order of the claim
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(aud) => vec![aud],
            Self::Multiple(aud) => aud,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdTokenClaims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    #[serde(default)]
    pub(crate) aud: Audience,
    #[serde(default)]
    pub(crate) nonce: Option<String>,
    #[serde(default)]
    pub(crate) at_hash: Option<String>,
    #[serde(flatten)]
    pub(crate) other: Metadata,
}

impl IdTokenClaims {
    pub(crate) fn into_verified(self) -> VerifiedIdToken {
        let metadata = profile_metadata(&self.iss, &self.sub, &self.other);
        VerifiedIdToken {
            issuer: self.iss,
            subject: self.sub,
            audience: self.aud.into_vec(),
            nonce: self.nonce,
            metadata,
        }
    }
}

/// Standard OIDC profile claims copied as-is
const PROFILE_CLAIMS: &[&str] = &[
    "name",
    "given_name",
    "family_name",
    "middle_name",
    "nickname",
    "preferred_username",
    "profile",
    "picture",
    "website",
    "gender",
    "birthdate",
    "zoneinfo",
    "locale",
    "email",
];

/// Some providers send booleans as strings
fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Build the identity metadata out of the claims of a verified ID token.
///
/// Only well-known profile claims are kept. `phone_number` and
/// `phone_number_verified` are renamed to `phone` and `phone_verified`, and
/// `provider_id`, `full_name` and `avatar_url` are added as aliases of `sub`,
/// `name` and `picture`. Null claims are skipped.
#[must_use]
pub fn profile_metadata(issuer: &str, subject: &str, claims: &Metadata) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("iss".to_owned(), issuer.into());
    metadata.insert("sub".to_owned(), subject.into());

    let present = |claim: &str| claims.get(claim).filter(|value| !value.is_null());

    for claim in PROFILE_CLAIMS {
        if let Some(value) = present(claim) {
            metadata.insert((*claim).to_owned(), value.clone());
        }
    }

    if let Some(verified) = present("email_verified").and_then(as_bool) {
        metadata.insert("email_verified".to_owned(), verified.into());
    }

    if let Some(phone) = present("phone_number") {
        metadata.insert("phone".to_owned(), phone.clone());
    }

    if let Some(verified) = present("phone_number_verified").and_then(as_bool) {
        metadata.insert("phone_verified".to_owned(), verified.into());
    }

    metadata.insert("provider_id".to_owned(), subject.into());

    if let Some(name) = present("name") {
        metadata.insert("full_name".to_owned(), name.clone());
    }

    if let Some(picture) = present("picture") {
        metadata.insert("avatar_url".to_owned(), picture.clone());
    }

    metadata
}
