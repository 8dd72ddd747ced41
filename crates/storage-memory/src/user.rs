// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idlink_data_model::{Clock, Metadata, User};
use idlink_storage::user::UserRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    FailPoint, MemoryError,
    repository::UnitOfWork,
    state::Write,
};

/// An implementation of [`UserRepository`] for the in-memory backend
pub struct MemoryUserRepository<'c> {
    unit: &'c mut UnitOfWork,
}

impl<'c> MemoryUserRepository<'c> {
    pub(crate) fn new(unit: &'c mut UnitOfWork) -> Self {
        Self { unit }
    }

    fn current(&self, id: Ulid) -> Result<User, MemoryError> {
        self.unit
            .working
            .users
            .get(&id)
            .cloned()
            .ok_or(MemoryError::NotFound { entity: "user", id })
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<User>, Self::Error> {
        Ok(self.unit.working.users.get(&id).cloned())
    }

    #[tracing::instrument(name = "memory.user.add", skip_all, fields(user.id), err)]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        metadata: Metadata,
    ) -> Result<User, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user.id", tracing::field::display(id));

        let user = User {
            id,
            metadata,
            providers: Vec::new(),
            created_at,
        };
        self.unit.record(Write::AddUser(user.clone()))?;

        Ok(user)
    }

    #[tracing::instrument(
        name = "memory.user.merge_metadata",
        skip_all,
        fields(user.id = %user.id),
        err,
    )]
    async fn merge_metadata(
        &mut self,
        user: User,
        metadata: &Metadata,
    ) -> Result<User, Self::Error> {
        self.unit.check(FailPoint::UserMergeMetadata)?;

        self.unit.record(Write::MergeMetadata {
            user_id: user.id,
            metadata: metadata.clone(),
        })?;

        self.current(user.id)
    }

    #[tracing::instrument(
        name = "memory.user.add_provider",
        skip_all,
        fields(user.id = %user.id, user.provider = provider),
        err,
    )]
    async fn add_provider(&mut self, user: User, provider: &str) -> Result<User, Self::Error> {
        self.unit.check(FailPoint::UserAddProvider)?;

        self.unit.record(Write::AddProvider {
            user_id: user.id,
            provider: provider.to_owned(),
        })?;

        self.current(user.id)
    }
}
