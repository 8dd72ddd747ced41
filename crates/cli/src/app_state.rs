// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{convert::Infallible, sync::Arc};

use axum::extract::{FromRef, FromRequestParts};
use idlink_data_model::{BoxClock, BoxRng, SystemClock};
use idlink_handlers::SharedSessionResolver;
use idlink_linking::IdentityLinker;
use idlink_storage::BoxRepositoryFactory;
use idlink_storage_pg::PgRepositoryFactory;
use rand::{Rng, SeedableRng};

#[derive(Clone)]
pub struct AppState {
    pub repository_factory: PgRepositoryFactory,
    pub linker: IdentityLinker,
    pub session_resolver: SharedSessionResolver,
}

impl FromRef<AppState> for BoxRepositoryFactory {
    fn from_ref(input: &AppState) -> Self {
        input.repository_factory.clone().boxed()
    }
}

impl FromRef<AppState> for IdentityLinker {
    fn from_ref(input: &AppState) -> Self {
        input.linker.clone()
    }
}

impl FromRef<AppState> for SharedSessionResolver {
    fn from_ref(input: &AppState) -> Self {
        Arc::clone(&input.session_resolver)
    }
}

impl FromRequestParts<AppState> for BoxClock {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let clock = SystemClock::default();
        Ok(Box::new(clock))
    }
}

impl FromRequestParts<AppState> for BoxRng {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // This rng is used to source the local rng
        #[allow(clippy::disallowed_methods)]
        let seed = rand::thread_rng().r#gen();

        let rng = rand_chacha::ChaChaRng::from_seed(seed);
        Ok(Box::new(rng))
    }
}
