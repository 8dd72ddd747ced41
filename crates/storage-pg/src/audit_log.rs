// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use idlink_data_model::{AuditAction, AuditLogEntry, Clock, User};
use idlink_storage::audit_log::AuditLogRepository;
use rand::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{DatabaseError, DatabaseInconsistencyError, telemetry::ExecuteExt};

/// An implementation of [`AuditLogRepository`] for a PostgreSQL connection
pub struct PgAuditLogRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgAuditLogRepository<'c> {
    /// Create a new [`PgAuditLogRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct AuditLogEntryLookup {
    audit_log_entry_id: Uuid,
    actor_id: Uuid,
    action: String,
    target_id: Uuid,
    provider: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogEntryLookup> for AuditLogEntry {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: AuditLogEntryLookup) -> Result<Self, Self::Error> {
        let id = value.audit_log_entry_id.into();
        let action = value.action.parse().map_err(|e| {
            DatabaseInconsistencyError::on("audit_log_entries")
                .column("action")
                .row(id)
                .source(e)
        })?;

        Ok(AuditLogEntry {
            id,
            actor_id: value.actor_id.into(),
            action,
            target_id: value.target_id.into(),
            provider: value.provider,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.audit_log.add",
        skip_all,
        fields(
            db.query.text,
            audit_log_entry.id,
            audit_log_entry.action = %action,
            audit_log_entry.target_id = %target_id,
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
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("audit_log_entry.id", tracing::field::display(id));

        let res = sqlx::query(
            r"
                INSERT INTO audit_log_entries
                    ( audit_log_entry_id
                    , actor_id
                    , action
                    , target_id
                    , provider
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(actor.id))
        .bind(action.as_str())
        .bind(Uuid::from(target_id))
        .bind(&provider)
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        DatabaseError::ensure_affected_rows(&res, 1)?;

        Ok(AuditLogEntry {
            id,
            actor_id: actor.id,
            action,
            target_id,
            provider,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.audit_log.list_for_actor",
        skip_all,
        fields(
            db.query.text,
            user.id = %actor.id,
        ),
        err,
    )]
    async fn list_for_actor(&mut self, actor: &User) -> Result<Vec<AuditLogEntry>, Self::Error> {
        let res = sqlx::query_as::<_, AuditLogEntryLookup>(
            r"
                SELECT audit_log_entry_id
                     , actor_id
                     , action
                     , target_id
                     , provider
                     , created_at
                FROM audit_log_entries
                WHERE actor_id = $1
                ORDER BY audit_log_entry_seq ASC
            ",
        )
        .bind(Uuid::from(actor.id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        let entries = res
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect::<Result<_, _>>()?;

        Ok(entries)
    }
}
