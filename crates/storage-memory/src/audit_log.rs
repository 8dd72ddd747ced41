// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idlink_data_model::{AuditAction, AuditLogEntry, Clock, User};
use idlink_storage::audit_log::AuditLogRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{FailPoint, MemoryError, repository::UnitOfWork, state::Write};

/// An implementation of [`AuditLogRepository`] for the in-memory backend
pub struct MemoryAuditLogRepository<'c> {
    unit: &'c mut UnitOfWork,
}

impl<'c> MemoryAuditLogRepository<'c> {
    pub(crate) fn new(unit: &'c mut UnitOfWork) -> Self {
        Self { unit }
    }
}

#[async_trait]
impl AuditLogRepository for MemoryAuditLogRepository<'_> {
    type Error = MemoryError;

    #[tracing::instrument(
        name = "memory.audit_log.add",
        skip_all,
        fields(
            audit_log_entry.id,
            audit_log_entry.action = %action,
            user.id = %actor.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        actor: &User,
        action: AuditAction,
        target_id: Ulid,
        provider: String,
    ) -> Result<AuditLogEntry, Self::Error> {
        self.unit.check(FailPoint::AuditLogAdd)?;

        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("audit_log_entry.id", tracing::field::display(id));

        let entry = AuditLogEntry {
            id,
            actor_id: actor.id,
            action,
            target_id,
            provider,
            created_at,
        };
        self.unit.record(Write::AddAuditLogEntry(entry.clone()))?;

        Ok(entry)
    }

    async fn list_for_actor(&mut self, actor: &User) -> Result<Vec<AuditLogEntry>, Self::Error> {
        Ok(self
            .unit
            .working
            .audit_log
            .iter()
            .filter(|entry| entry.actor_id == actor.id)
            .cloned()
            .collect())
    }
}
