// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Interactions with the storage backend
//!
//! This crate provides a set of traits that can be implemented to interact with
//! the storage backend. Those traits are called repositories and are grouped by
//! the type of data they manage.
//!
//! Each of those repositories can be accessed via the [`RepositoryAccess`]
//! trait. This trait can be wrapped in a [`BoxRepository`] to allow using it
//! without caring about the underlying storage backend, and without carrying
//! around the generic type parameter.
//!
//! A repository is also a unit of work: every write done through it becomes
//! visible to others only once [`RepositoryTransaction::save`] is called, and
//! is discarded by [`RepositoryTransaction::cancel`] or when the repository is
//! dropped.
//!
//! # Defining a new repository
//!
//! To define a new repository, you have to:
//!   1. Define a new (async) repository trait, with the methods you need
//!   2. Write an implementation of this trait for each storage backend
//!      (`idlink-storage-pg` and `idlink-storage-memory`)
//!   3. Make it accessible via the [`RepositoryAccess`] trait
//!
//! All methods take `&mut self`, lookups return `Result<Option<T>, Self::Error>`
//! and operations creating new entities take a random number generator and a
//! [`Clock`].

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod audit_log;
pub mod identity;
pub(crate) mod repository;
pub mod user;
mod utils;

pub use idlink_data_model::{BoxClock, BoxRng, Clock, MockClock, SystemClock};

pub use self::{
    repository::{
        BoxRepository, BoxRepositoryFactory, Repository, RepositoryAccess, RepositoryError,
        RepositoryFactory, RepositoryTransaction, UniqueViolation,
    },
    utils::ErasedRepository,
};
