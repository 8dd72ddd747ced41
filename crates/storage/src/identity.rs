// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with external identities

use async_trait::async_trait;
use idlink_data_model::{Clock, Identity, Metadata, User};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// An [`IdentityRepository`] helps interacting with [`Identity`] saved in the
/// storage backend
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`Identity`] by its ID
    ///
    /// Returns `None` if no [`Identity`] was found
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the [`Identity`] to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Identity>, Self::Error>;

    /// Find an [`Identity`] by its provider and subject
    ///
    /// Returns `None` if no matching [`Identity`] was found
    ///
    /// # Parameters
    ///
    /// * `provider`: The provider type of the [`Identity`]
    /// * `subject`: The subject of the [`Identity`] at that provider
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_subject(
        &mut self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Identity>, Self::Error>;

    /// Create a new [`Identity`] owned by a [`User`]
    ///
    /// Returns the newly created [`Identity`]
    ///
    /// # Parameters
    ///
    /// * `rng`: A random number generator to generate the [`Identity`] ID
    /// * `clock`: The clock used to generate timestamps
    /// * `user`: The [`User`] owning the [`Identity`]
    /// * `provider`: The provider type of the [`Identity`]
    /// * `subject`: The subject of the [`Identity`] at that provider
    /// * `metadata`: Profile data extracted from the verified ID token
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails, including
    /// when the `(provider, subject)` pair already exists. In that case the
    /// error is a unique violation, as reported by
    /// [`RepositoryError::is_unique_violation`].
    ///
    /// [`RepositoryError::is_unique_violation`]: crate::RepositoryError::is_unique_violation
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        provider: String,
        subject: String,
        metadata: Metadata,
    ) -> Result<Identity, Self::Error>;

    /// List all the [`Identity`] owned by a [`User`], oldest first
    ///
    /// # Parameters
    ///
    /// * `user`: The [`User`] for which to list identities
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_user(&mut self, user: &User) -> Result<Vec<Identity>, Self::Error>;
}

repository_impl!(IdentityRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Identity>, Self::Error>;
    async fn find_by_subject(
        &mut self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Identity>, Self::Error>;
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        provider: String,
        subject: String,
        metadata: Metadata,
    ) -> Result<Identity, Self::Error>;
    async fn list_for_user(&mut self, user: &User) -> Result<Vec<Identity>, Self::Error>;
);
