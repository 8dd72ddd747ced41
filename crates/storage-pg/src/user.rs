// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use idlink_data_model::{Clock, Metadata, User};
use idlink_storage::user::UserRepository;
use rand::RngCore;
use sqlx::{PgConnection, types::Json};
use ulid::Ulid;
use uuid::Uuid;

use crate::{DatabaseError, telemetry::ExecuteExt};

/// An implementation of [`UserRepository`] for a PostgreSQL connection
pub struct PgUserRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgUserRepository<'c> {
    /// Create a new [`PgUserRepository`] from an active PostgreSQL connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct UserLookup {
    user_id: Uuid,
    metadata: Json<Metadata>,
    providers: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserLookup> for User {
    fn from(value: UserLookup) -> Self {
        User {
            id: value.user_id.into(),
            metadata: value.metadata.0,
            providers: value.providers,
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.user.lookup",
        skip_all,
        fields(
            db.query.text,
            user.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<User>, Self::Error> {
        let res = sqlx::query_as::<_, UserLookup>(
            r"
                SELECT user_id
                     , metadata
                     , providers
                     , created_at
                FROM users
                WHERE user_id = $1
            ",
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.user.add",
        skip_all,
        fields(
            db.query.text,
            user.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        metadata: Metadata,
    ) -> Result<User, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user.id", tracing::field::display(id));

        let res = sqlx::query(
            r"
                INSERT INTO users (user_id, metadata, providers, created_at)
                VALUES ($1, $2, '{}', $3)
            ",
        )
        .bind(Uuid::from(id))
        .bind(Json(&metadata))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        DatabaseError::ensure_affected_rows(&res, 1)?;

        Ok(User {
            id,
            metadata,
            providers: Vec::new(),
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.user.merge_metadata",
        skip_all,
        fields(
            db.query.text,
            %user.id,
        ),
        err,
    )]
    async fn merge_metadata(
        &mut self,
        user: User,
        metadata: &Metadata,
    ) -> Result<User, Self::Error> {
        // `||` on two JSONB objects is a shallow merge, keys on the right win
        let res = sqlx::query_as::<_, UserLookup>(
            r"
                UPDATE users
                SET metadata = metadata || $2
                WHERE user_id = $1
                RETURNING user_id
                        , metadata
                        , providers
                        , created_at
            ",
        )
        .bind(Uuid::from(user.id))
        .bind(Json(metadata))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(DatabaseError::RowsAffected {
            expected: 1,
            actual: 0,
        })?;

        Ok(res.into())
    }

    #[tracing::instrument(
        name = "db.user.add_provider",
        skip_all,
        fields(
            db.query.text,
            %user.id,
            user.provider = provider,
        ),
        err,
    )]
    async fn add_provider(&mut self, user: User, provider: &str) -> Result<User, Self::Error> {
        let res = sqlx::query_as::<_, UserLookup>(
            r"
                UPDATE users
                SET providers = CASE
                    WHEN $2 = ANY(providers) THEN providers
                    ELSE array_append(providers, $2)
                END
                WHERE user_id = $1
                RETURNING user_id
                        , metadata
                        , providers
                        , created_at
            ",
        )
        .bind(Uuid::from(user.id))
        .bind(provider)
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(DatabaseError::RowsAffected {
            expected: 1,
            actual: 0,
        })?;

        Ok(res.into())
    }
}
