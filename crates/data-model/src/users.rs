// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::Metadata;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Ulid,
    pub metadata: Metadata,
    /// Names of the providers linked to this user, in the order they were
    /// first linked
    pub providers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns `true` if the given provider is already in the provider list
    #[must_use]
    pub fn has_provider(&self, provider: &str) -> bool {
        self.providers.iter().any(|p| p == provider)
    }

    /// Shallow merge of `incoming` into the user metadata.
    ///
    /// New keys are inserted, existing keys are overwritten, keys absent from
    /// `incoming` are kept.
    pub fn merge_metadata(&mut self, incoming: &Metadata) {
        for (key, value) in incoming {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Append the provider to the provider list, unless already present.
    ///
    /// Returns `true` if the list changed.
    pub fn add_provider(&mut self, provider: &str) -> bool {
        if self.has_provider(provider) {
            return false;
        }

        self.providers.push(provider.to_owned());
        true
    }
}
