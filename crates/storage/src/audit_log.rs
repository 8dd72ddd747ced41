// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to record audit log entries

use async_trait::async_trait;
use idlink_data_model::{AuditAction, AuditLogEntry, Clock, User};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// An [`AuditLogRepository`] helps recording [`AuditLogEntry`] in the storage
/// backend
///
/// Entries are append-only: there is no way to update or remove one.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Append a new [`AuditLogEntry`]
    ///
    /// Returns the newly created [`AuditLogEntry`]
    ///
    /// # Parameters
    ///
    /// * `rng`: A random number generator to generate the entry ID
    /// * `clock`: The clock used to generate timestamps
    /// * `actor`: The [`User`] who performed the action
    /// * `action`: The action performed
    /// * `target_id`: The ID of the entity affected by the action
    /// * `provider`: The provider involved in the action
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        actor: &User,
        action: AuditAction,
        target_id: Ulid,
        provider: String,
    ) -> Result<AuditLogEntry, Self::Error>;

    /// List the [`AuditLogEntry`] recorded for an actor, oldest first
    ///
    /// # Parameters
    ///
    /// * `actor`: The [`User`] for which to list entries
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_actor(&mut self, actor: &User) -> Result<Vec<AuditLogEntry>, Self::Error>;
}

repository_impl!(AuditLogRepository:
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        actor: &User,
        action: AuditAction,
        target_id: Ulid,
        provider: String,
    ) -> Result<AuditLogEntry, Self::Error>;
    async fn list_for_actor(&mut self, actor: &User) -> Result<Vec<AuditLogEntry>, Self::Error>;
);
