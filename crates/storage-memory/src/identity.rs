// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idlink_data_model::{Clock, Identity, Metadata, User};
use idlink_storage::identity::IdentityRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{FailPoint, MemoryError, repository::UnitOfWork, state::Write};

/// An implementation of [`IdentityRepository`] for the in-memory backend
pub struct MemoryIdentityRepository<'c> {
    unit: &'c mut UnitOfWork,
}

impl<'c> MemoryIdentityRepository<'c> {
    pub(crate) fn new(unit: &'c mut UnitOfWork) -> Self {
        Self { unit }
    }
}

#[async_trait]
impl IdentityRepository for MemoryIdentityRepository<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Identity>, Self::Error> {
        Ok(self.unit.working.identities.get(&id).cloned())
    }

    async fn find_by_subject(
        &mut self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Identity>, Self::Error> {
        Ok(self.unit.working.find_identity(provider, subject).cloned())
    }

    #[tracing::instrument(
        name = "memory.identity.add",
        skip_all,
        fields(
            user.id = %user.id,
            identity.id,
            identity.provider = %provider,
            identity.subject = %subject,
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
        self.unit.check(FailPoint::IdentityAdd)?;

        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("identity.id", tracing::field::display(id));

        let identity = Identity {
            id,
            user_id: user.id,
            provider,
            subject,
            metadata,
            created_at,
        };
        self.unit.record(Write::AddIdentity(identity.clone()))?;

        Ok(identity)
    }

    async fn list_for_user(&mut self, user: &User) -> Result<Vec<Identity>, Self::Error> {
        let mut identities: Vec<Identity> = self
            .unit
            .working
            .identities
            .values()
            .filter(|identity| identity.user_id == user.id)
            .cloned()
            .collect();
        identities.sort_by_key(|identity| (identity.created_at, identity.id));

        Ok(identities)
    }
}
