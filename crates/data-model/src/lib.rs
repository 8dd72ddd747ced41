// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

pub(crate) mod audit;
pub mod clock;
pub(crate) mod id_token;
pub(crate) mod identities;
pub(crate) mod users;
mod utils;

pub use ulid::Ulid;

pub use self::{
    audit::{AuditAction, AuditLogEntry, UnknownAuditAction},
    clock::{Clock, MockClock, SystemClock},
    id_token::VerifiedIdToken,
    identities::Identity,
    users::User,
    utils::{BoxClock, BoxRng},
};

/// Free-form JSON metadata attached to users and identities
pub type Metadata = serde_json::Map<String, serde_json::Value>;
