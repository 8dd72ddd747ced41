// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use idlink_data_model::{Clock, Identity, Metadata, User};
use idlink_storage::identity::IdentityRepository;
use rand::RngCore;
use sqlx::{PgConnection, types::Json};
use ulid::Ulid;
use uuid::Uuid;

use crate::{DatabaseError, telemetry::ExecuteExt};

/// An implementation of [`IdentityRepository`] for a PostgreSQL connection
pub struct PgIdentityRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgIdentityRepository<'c> {
    /// Create a new [`PgIdentityRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct IdentityLookup {
    user_identity_id: Uuid,
    user_id: Uuid,
    provider: String,
    subject: String,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
}

impl From<IdentityLookup> for Identity {
    fn from(value: IdentityLookup) -> Self {
        Identity {
            id: value.user_identity_id.into(),
            user_id: value.user_id.into(),
            provider: value.provider,
            subject: value.subject,
            metadata: value.metadata.0,
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.identity.lookup",
        skip_all,
        fields(
            db.query.text,
            identity.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Identity>, Self::Error> {
        let res = sqlx::query_as::<_, IdentityLookup>(
            r"
                SELECT user_identity_id
                     , user_id
                     , provider
                     , subject
                     , metadata
                     , created_at
                FROM user_identities
                WHERE user_identity_id = $1
            ",
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.identity.find_by_subject",
        skip_all,
        fields(
            db.query.text,
            identity.provider = provider,
            identity.subject = subject,
        ),
        err,
    )]
    async fn find_by_subject(
        &mut self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Identity>, Self::Error> {
        let res = sqlx::query_as::<_, IdentityLookup>(
            r"
                SELECT user_identity_id
                     , user_id
                     , provider
                     , subject
                     , metadata
                     , created_at
                FROM user_identities
                WHERE provider = $1
                  AND subject = $2
            ",
        )
        .bind(provider)
        .bind(subject)
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.identity.add",
        skip_all,
        fields(
            db.query.text,
            identity.id,
            identity.provider = %provider,
            identity.subject = %subject,
            %user.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        provider: String,
        subject: String,
        metadata: Metadata,
    ) -> Result<Identity, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("identity.id", tracing::field::display(id));

        let res = sqlx::query(
            r"
                INSERT INTO user_identities
                    ( user_identity_id
                    , user_id
                    , provider
                    , subject
                    , metadata
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(user.id))
        .bind(&provider)
        .bind(&subject)
        .bind(Json(&metadata))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        DatabaseError::ensure_affected_rows(&res, 1)?;

        Ok(Identity {
            id,
            user_id: user.id,
            provider,
            subject,
            metadata,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.identity.list_for_user",
        skip_all,
        fields(
            db.query.text,
            %user.id,
        ),
        err,
    )]
    async fn list_for_user(&mut self, user: &User) -> Result<Vec<Identity>, Self::Error> {
        let res = sqlx::query_as::<_, IdentityLookup>(
            r"
                SELECT user_identity_id
                     , user_id
                     , provider
                     , subject
                     , metadata
                     , created_at
                FROM user_identities
                WHERE user_id = $1
                ORDER BY created_at ASC, user_identity_id ASC
            ",
        )
        .bind(Uuid::from(user.id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(res.into_iter().map(Into::into).collect())
    }
}
