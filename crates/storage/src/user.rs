// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with user accounts

use async_trait::async_trait;
use idlink_data_model::{Clock, Metadata, User};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`UserRepository`] helps interacting with [`User`] saved in the storage
/// backend
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`User`] by its ID
    ///
    /// Returns `None` if no [`User`] was found
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the [`User`] to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<User>, Self::Error>;

    /// Create a new [`User`]
    ///
    /// Returns the newly created [`User`], with an empty provider list
    ///
    /// # Parameters
    ///
    /// * `rng`: A random number generator to generate the [`User`] ID
    /// * `clock`: The clock used to generate timestamps
    /// * `metadata`: The initial metadata of the [`User`]
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        metadata: Metadata,
    ) -> Result<User, Self::Error>;

    /// Shallow-merge some metadata into the [`User`] metadata
    ///
    /// Keys present in `metadata` overwrite the existing ones, other keys are
    /// kept. Returns the updated [`User`]
    ///
    /// # Parameters
    ///
    /// * `user`: The [`User`] to update
    /// * `metadata`: The metadata to merge
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn merge_metadata(
        &mut self,
        user: User,
        metadata: &Metadata,
    ) -> Result<User, Self::Error>;

    /// Append a provider to the [`User`] provider list, if it is not already
    /// in it
    ///
    /// Returns the updated [`User`]
    ///
    /// # Parameters
    ///
    /// * `user`: The [`User`] to update
    /// * `provider`: The name of the provider to add
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_provider(&mut self, user: User, provider: &str) -> Result<User, Self::Error>;
}

repository_impl!(UserRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<User>, Self::Error>;
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        metadata: Metadata,
    ) -> Result<User, Self::Error>;
    async fn merge_metadata(
        &mut self,
        user: User,
        metadata: &Metadata,
    ) -> Result<User, Self::Error>;
    async fn add_provider(&mut self, user: User, provider: &str) -> Result<User, Self::Error>;
);
