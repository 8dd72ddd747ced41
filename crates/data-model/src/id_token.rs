// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::Serialize;

use crate::Metadata;

/// The claims of an ID token which passed signature and claims verification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedIdToken {
    pub issuer: String,
    pub subject: String,
    /// The `aud` claim, normalized to a list. Order is kept and duplicates are
    /// allowed.
    pub audience: Vec<String>,
    pub nonce: Option<String>,
    /// Profile claims, copied onto the identity and merged into the user
    pub metadata: Metadata,
}
