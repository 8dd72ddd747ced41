// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An implementation of the storage repositories for a PostgreSQL database
//!
//! Each [`PgRepository`] wraps a database transaction: it is committed by
//! [`RepositoryTransaction::save`], and rolled back by
//! [`RepositoryTransaction::cancel`] or when the repository is dropped.
//!
//! The schema is managed by the migrations embedded in [`MIGRATOR`]. The
//! `(provider, subject)` pair of identities is protected by the
//! [`IDENTITY_PROVIDER_SUBJECT_CONSTRAINT`] unique constraint; violating it
//! surfaces as [`DatabaseError::UniqueViolation`], which
//! [`RepositoryError::is_unique_violation`] recognizes.
//!
//! Queries are written as plain SQL with runtime-checked bindings, and each
//! repository method records its statement as `db.query.text` in its span.
//!
//! [`RepositoryTransaction::save`]: idlink_storage::RepositoryTransaction::save
//! [`RepositoryTransaction::cancel`]: idlink_storage::RepositoryTransaction::cancel
//! [`RepositoryError::is_unique_violation`]: idlink_storage::RepositoryError::is_unique_violation

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use sqlx::migrate::Migrator;

mod audit_log;
mod errors;
mod identity;
pub(crate) mod repository;
pub(crate) mod telemetry;
mod user;


pub use self::{
    audit_log::PgAuditLogRepository,
    errors::{DatabaseError, DatabaseInconsistencyError},
    identity::PgIdentityRepository,
    repository::{PgRepository, PgRepositoryFactory},
    telemetry::ExecuteExt,
    user::PgUserRepository,
};

/// The name of the unique constraint on the `(provider, subject)` pair of
/// `user_identities`
pub const IDENTITY_PROVIDER_SUBJECT_CONSTRAINT: &str = "user_identities_provider_subject_key";

/// Embedded migrations, allowing them to run on startup
pub static MIGRATOR: Migrator = sqlx::migrate!();
