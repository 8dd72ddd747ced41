// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An in-process implementation of the storage repositories.
//!
//! Each [`MemoryRepository`] works on a snapshot of the store taken when it is
//! created, and records its writes in a journal. Saving the repository replays
//! the journal on top of the latest committed state, re-checking the
//! `(provider, subject)` uniqueness of identities, and atomically swaps the
//! result in. Cancelling or dropping the repository discards the journal.
//!
//! The store can also be told to fail at a given [`FailPoint`], which is used
//! to exercise the rollback paths of callers.

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use idlink_data_model::{AuditLogEntry, Identity, User};
use idlink_storage::{
    BoxRepository, BoxRepositoryFactory, RepositoryError, RepositoryFactory, UniqueViolation,
};
use thiserror::Error;
use ulid::Ulid;

mod audit_log;
mod identity;
mod repository;
mod state;
mod user;


pub use self::repository::MemoryRepository;
use self::state::State;

/// The name of the uniqueness constraint on `(provider, subject)`
pub const IDENTITY_PROVIDER_SUBJECT_CONSTRAINT: &str = "user_identities_provider_subject_key";

/// An operation of the in-memory backend which can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// [`IdentityRepository::add`](idlink_storage::identity::IdentityRepository::add)
    IdentityAdd,
    /// [`UserRepository::merge_metadata`](idlink_storage::user::UserRepository::merge_metadata)
    UserMergeMetadata,
    /// [`UserRepository::add_provider`](idlink_storage::user::UserRepository::add_provider)
    UserAddProvider,
    /// [`AuditLogRepository::add`](idlink_storage::audit_log::AuditLogRepository::add)
    AuditLogAdd,
    /// Committing a repository with
    /// [`RepositoryTransaction::save`](idlink_storage::RepositoryTransaction::save)
    Commit,
}

/// Errors returned by the in-memory backend
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A uniqueness constraint was violated
    #[error("uniqueness constraint violated")]
    UniqueViolation(#[source] UniqueViolation),

    /// A row referenced by a write does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// The kind of entity which was not found
        entity: &'static str,
        /// The ID of the entity
        id: Ulid,
    },

    /// A failure injected with [`MemoryStore::fail_at`]
    #[error("injected failure at {0:?}")]
    Injected(FailPoint),
}

impl MemoryError {
    fn identity_conflict() -> Self {
        Self::UniqueViolation(UniqueViolation::new(IDENTITY_PROVIDER_SUBJECT_CONSTRAINT))
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    fail_points: Mutex<HashSet<FailPoint>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, point: FailPoint) -> Result<(), MemoryError> {
        let fail_points = self
            .fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if fail_points.contains(&point) {
            tracing::debug!(?point, "Injecting storage failure");
            return Err(MemoryError::Injected(point));
        }

        Ok(())
    }
}

/// A shared in-memory store. Cloning it gives another handle to the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a new, empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new unit of work on this store
    #[must_use]
    pub fn repository(&self) -> MemoryRepository {
        MemoryRepository::new(Arc::clone(&self.shared))
    }

    /// Make the given operation fail until [`Self::clear_fail_points`] is
    /// called
    pub fn fail_at(&self, point: FailPoint) {
        self.shared
            .fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Remove all the injected failures
    pub fn clear_fail_points(&self) {
        self.shared
            .fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All the committed users, in ID order
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.shared.state().users.values().cloned().collect()
    }

    /// All the committed identities, in ID order
    #[must_use]
    pub fn identities(&self) -> Vec<Identity> {
        self.shared.state().identities.values().cloned().collect()
    }

    /// All the committed audit log entries, in insertion order
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.shared.state().audit_log.clone()
    }
}

/// A [`RepositoryFactory`] handing out [`MemoryRepository`] on a shared
/// [`MemoryStore`]
#[derive(Clone, Default)]
pub struct MemoryRepositoryFactory {
    store: MemoryStore,
}

impl MemoryRepositoryFactory {
    /// Create a new factory on top of the given store
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Box the factory
    #[must_use]
    pub fn boxed(self) -> BoxRepositoryFactory {
        Box::new(self)
    }

    /// The store this factory creates repositories for
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl RepositoryFactory for MemoryRepositoryFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        Ok(self.store.repository().boxed())
    }
}
