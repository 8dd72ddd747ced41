// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Type erasure of backend errors

/// Wraps a repository, turning its backend-specific errors into a
/// [`RepositoryError`](crate::RepositoryError)
///
/// Backends use it to build a [`BoxRepository`](crate::BoxRepository) out of
/// their own repository type.
pub struct ErasedRepository<R> {
    pub(crate) inner: R,
}

impl<R> ErasedRepository<R> {
    /// Wrap the given repository
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

/// Implements a repository trait for [`ErasedRepository`] and for
/// [`Box<R>`], given the list of its methods
#[macro_export]
macro_rules! repository_impl {
    ($repo_trait:ident:
        $(
            async fn $method:ident (
                &mut self
                $(, $arg:ident: $arg_ty:ty )*
                $(,)?
            ) -> Result<$ret_ty:ty, Self::Error>;
        )*
    ) => {
        #[::async_trait::async_trait]
        impl<R: ?Sized> $repo_trait for ::std::boxed::Box<R>
        where
            R: $repo_trait,
        {
            type Error = <R as $repo_trait>::Error;

            $(
                async fn $method (&mut self $(, $arg: $arg_ty)*) -> Result<$ret_ty, Self::Error> {
                    (**self).$method ( $($arg),* ).await
                }
            )*
        }

        #[::async_trait::async_trait]
        impl<R> $repo_trait for $crate::ErasedRepository<R>
        where
            R: $repo_trait,
            <R as $repo_trait>::Error: ::std::error::Error
                + ::std::marker::Send
                + ::std::marker::Sync
                + 'static,
        {
            type Error = $crate::RepositoryError;

            $(
                async fn $method (&mut self $(, $arg: $arg_ty)*) -> Result<$ret_ty, Self::Error> {
                    self.inner
                        .$method ( $($arg),* )
                        .await
                        .map_err($crate::RepositoryError::from_error)
                }
            )*
        }
    };
}
