// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use futures_util::{FutureExt, future::BoxFuture};
use idlink_storage::{
    BoxRepository, ErasedRepository, Repository, RepositoryAccess, RepositoryTransaction,
    audit_log::AuditLogRepository, identity::IdentityRepository, user::UserRepository,
};

use crate::{
    FailPoint, MemoryError, Shared,
    audit_log::MemoryAuditLogRepository,
    identity::MemoryIdentityRepository,
    state::{State, Write},
    user::MemoryUserRepository,
};

/// The writes done so far by a [`MemoryRepository`], along with a working copy
/// of the state they apply to
pub(crate) struct UnitOfWork {
    shared: Arc<Shared>,
    pub(crate) working: State,
    journal: Vec<Write>,
}

impl UnitOfWork {
    pub(crate) fn check(&self, point: FailPoint) -> Result<(), MemoryError> {
        self.shared.check(point)
    }

    /// Apply a write to the working copy and record it for the commit
    pub(crate) fn record(&mut self, write: Write) -> Result<(), MemoryError> {
        self.working.apply(write.clone())?;
        self.journal.push(write);
        Ok(())
    }

    fn commit(self) -> Result<(), MemoryError> {
        self.shared.check(FailPoint::Commit)?;

        if self.journal.is_empty() {
            return Ok(());
        }

        let mut state = self.shared.state();
        let mut next = state.clone();
        for write in self.journal {
            next.apply(write)?;
        }
        *state = next;

        Ok(())
    }
}

/// An implementation of the [`Repository`] trait backed by a [`MemoryStore`]
///
/// [`MemoryStore`]: crate::MemoryStore
pub struct MemoryRepository {
    unit: UnitOfWork,
}

impl MemoryRepository {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let working = shared.state().clone();
        Self {
            unit: UnitOfWork {
                shared,
                working,
                journal: Vec::new(),
            },
        }
    }

    /// Transform the repository into a type-erased [`BoxRepository`]
    #[must_use]
    pub fn boxed(self) -> BoxRepository {
        Box::new(ErasedRepository::new(self))
    }
}

impl RepositoryTransaction for MemoryRepository {
    type Error = MemoryError;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let span = tracing::info_span!("db.save");
        let unit = self.unit;
        let writes = unit.journal.len();
        let result = span.in_scope(|| {
            let result = unit.commit();
            if let Err(e) = &result {
                tracing::debug!(error = e as &dyn std::error::Error, writes, "Commit failed");
            }
            result
        });
        futures_util::future::ready(result).boxed()
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let _span = tracing::info_span!("db.cancel").entered();
        tracing::debug!(writes = self.unit.journal.len(), "Discarding writes");
        drop(self);
        futures_util::future::ready(Ok(())).boxed()
    }
}

impl RepositoryAccess for MemoryRepository {
    type Error = MemoryError;

    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryUserRepository::new(&mut self.unit))
    }

    fn identity<'c>(&'c mut self) -> Box<dyn IdentityRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryIdentityRepository::new(&mut self.unit))
    }

    fn audit_log<'c>(&'c mut self) -> Box<dyn AuditLogRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryAuditLogRepository::new(&mut self.unit))
    }
}

impl Repository<MemoryError> for MemoryRepository {}
