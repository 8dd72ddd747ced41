// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::{
    audit_log::AuditLogRepository, identity::IdentityRepository, user::UserRepository,
};

/// A [`RepositoryFactory`] is a factory that can create a [`BoxRepository`]
#[async_trait]
pub trait RepositoryFactory {
    /// Create a new [`BoxRepository`], which starts a new unit of work
    ///
    /// # Errors
    ///
    /// Returns a [`RepositoryError`] if the backend could not start one
    async fn create(&self) -> Result<BoxRepository, RepositoryError>;
}

/// A type-erased [`RepositoryFactory`]
pub type BoxRepositoryFactory = Box<dyn RepositoryFactory + Send + Sync + 'static>;

/// A [`Repository`] helps interacting with the underlying storage backend.
pub trait Repository<E>:
    RepositoryAccess<Error = E> + RepositoryTransaction<Error = E> + Send
where
    E: std::error::Error + Send + Sync + 'static,
{
}

/// An opaque, type-erased error
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RepositoryError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RepositoryError {
    /// Construct a [`RepositoryError`] from any error kind
    pub fn from_error<E>(value: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(value),
        }
    }

    /// Returns `true` if this error was caused by a uniqueness constraint
    /// violation somewhere in its source chain
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.unique_violation().is_some()
    }

    /// Find the [`UniqueViolation`] which caused this error, if any
    #[must_use]
    pub fn unique_violation(&self) -> Option<&UniqueViolation> {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&*self.source);
        while let Some(error) = current {
            if let Some(violation) = error.downcast_ref::<UniqueViolation>() {
                return Some(violation);
            }
            current = error.source();
        }

        None
    }
}

/// A uniqueness constraint was violated by a write.
///
/// Backends put this error in the source chain of their own error type so
/// that callers can detect concurrent writes of the same unique key through
/// [`RepositoryError::is_unique_violation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unique constraint {constraint:?} violated")]
pub struct UniqueViolation {
    /// The name of the violated constraint
    pub constraint: String,
}

impl UniqueViolation {
    /// Create a new [`UniqueViolation`] for the given constraint
    #[must_use]
    pub fn new(constraint: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
        }
    }
}

/// A type-erased [`Repository`]
pub type BoxRepository = Box<dyn Repository<RepositoryError> + Send + Sync + 'static>;

/// A [`RepositoryTransaction`] can be saved or cancelled, after a series
/// of operations.
pub trait RepositoryTransaction {
    /// The error type used by the [`Self::save`] and [`Self::cancel`] functions
    type Error;

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to commit the
    /// transaction.
    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;

    /// Rollback the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to rollback
    /// the transaction.
    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;
}

/// Access the various repositories the backend implements.
///
/// All the methods return a boxed trait object, which can be used to access a
/// particular repository. The lifetime of the returned object is bound to the
/// lifetime of the whole repository, so that only one mutable reference to the
/// repository is used at a time.
pub trait RepositoryAccess: Send {
    /// The backend-specific error type used by each repository.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get an [`UserRepository`]
    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c>;

    /// Get an [`IdentityRepository`]
    fn identity<'c>(&'c mut self) -> Box<dyn IdentityRepository<Error = Self::Error> + 'c>;

    /// Get an [`AuditLogRepository`]
    fn audit_log<'c>(&'c mut self) -> Box<dyn AuditLogRepository<Error = Self::Error> + 'c>;
}

/// Implementations of the [`RepositoryAccess`], [`RepositoryTransaction`] and
/// [`Repository`] for the [`ErasedRepository`] wrapper and [`Box<R>`]
mod impls {
    use futures_util::{FutureExt, TryFutureExt, future::BoxFuture};

    use super::RepositoryAccess;
    use crate::{
        ErasedRepository, Repository, RepositoryError, RepositoryTransaction,
        audit_log::AuditLogRepository, identity::IdentityRepository, user::UserRepository,
    };

    // --- Repository ---
    impl<R, E> Repository<RepositoryError> for ErasedRepository<R>
    where
        R: Repository<E> + RepositoryAccess<Error = E> + RepositoryTransaction<Error = E>,
        E: std::error::Error + Send + Sync + 'static,
    {
    }

    // --- RepositoryTransaction --
    impl<R> RepositoryTransaction for ErasedRepository<R>
    where
        R: RepositoryTransaction,
        R::Error: std::error::Error + Send + Sync + 'static,
    {
        type Error = RepositoryError;

        fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            Box::new(self.inner)
                .save()
                .map_err(RepositoryError::from_error)
                .boxed()
        }

        fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            Box::new(self.inner)
                .cancel()
                .map_err(RepositoryError::from_error)
                .boxed()
        }
    }

    // --- RepositoryAccess --
    impl<R> RepositoryAccess for ErasedRepository<R>
    where
        R: RepositoryAccess,
    {
        type Error = RepositoryError;

        fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
            Box::new(ErasedRepository::new(self.inner.user()))
        }

        fn identity<'c>(&'c mut self) -> Box<dyn IdentityRepository<Error = Self::Error> + 'c> {
            Box::new(ErasedRepository::new(self.inner.identity()))
        }

        fn audit_log<'c>(&'c mut self) -> Box<dyn AuditLogRepository<Error = Self::Error> + 'c> {
            Box::new(ErasedRepository::new(self.inner.audit_log()))
        }
    }

    impl<R: RepositoryAccess + ?Sized> RepositoryAccess for Box<R> {
        type Error = R::Error;

        fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
            (**self).user()
        }

        fn identity<'c>(&'c mut self) -> Box<dyn IdentityRepository<Error = Self::Error> + 'c> {
            (**self).identity()
        }

        fn audit_log<'c>(&'c mut self) -> Box<dyn AuditLogRepository<Error = Self::Error> + 'c> {
            (**self).audit_log()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("backend failure")]
    struct BackendError(#[source] UniqueViolation);

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct OtherError;

    #[test]
    fn unique_violation_is_found_in_the_source_chain() {
        let error = RepositoryError::from_error(BackendError(UniqueViolation::new("some_key")));
        assert!(error.is_unique_violation());
        assert_eq!(
            error.unique_violation().map(|v| v.constraint.as_str()),
            Some("some_key")
        );

        let error = RepositoryError::from_error(UniqueViolation::new("some_key"));
        assert!(error.is_unique_violation());

        let error = RepositoryError::from_error(OtherError);
        assert!(!error.is_unique_violation());
    }
}
