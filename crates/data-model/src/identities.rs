// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::Metadata;

/// An external identity, i.e. a `(provider, subject)` pair attached to a user.
///
/// The `(provider, subject)` pair is unique across all users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: Ulid,
    pub user_id: Ulid,
    pub provider: String,
    pub subject: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Returns `true` if this identity is owned by the given user
    #[must_use]
    pub fn is_owned_by(&self, user_id: Ulid) -> bool {
        self.user_id == user_id
    }
}
