// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![deny(clippy::future_not_send)]
#![allow(clippy::module_name_repetitions)]

use std::convert::Infallible;

use axum::{
    Router,
    extract::{FromRef, FromRequestParts},
    routing::{get, post},
};
use idlink_data_model::{BoxClock, BoxRng};
use idlink_linking::IdentityLinker;
use idlink_storage::BoxRepositoryFactory;
use tower_http::trace::TraceLayer;

mod health;
mod identities;
mod response;
mod session;

#[cfg(test)]
mod test_utils;

pub use self::{
    identities::id_token::{IdentityResponse, UserResponse},
    response::ErrorResponse,
    session::{
        AuthenticatedUser, SessionError, SessionRejection, SessionResolver,
        SharedSessionResolver, TrustedHeaderSessionResolver,
    },
};

/// The path of the health check endpoint
pub const HEALTH_PATH: &str = "/health";

/// The path of the endpoint linking an identity from an ID token
pub const ID_TOKEN_LINK_PATH: &str = "/user/identities/id_token";

pub fn healthcheck_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    BoxRepositoryFactory: FromRef<S>,
{
    Router::new().route(HEALTH_PATH, get(self::health::get))
}

pub fn api_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    BoxRepositoryFactory: FromRef<S>,
    IdentityLinker: FromRef<S>,
    SharedSessionResolver: FromRef<S>,
    BoxClock: FromRequestParts<S, Rejection = Infallible>,
    BoxRng: FromRequestParts<S, Rejection = Infallible>,
{
    Router::new().route(
        ID_TOKEN_LINK_PATH,
        post(self::identities::id_token::post),
    )
}

/// The full router of the service, with request tracing
pub fn router<S>(state: S) -> Router
where
    S: Clone + Send + Sync + 'static,
    BoxRepositoryFactory: FromRef<S>,
    IdentityLinker: FromRef<S>,
    SharedSessionResolver: FromRef<S>,
    BoxClock: FromRequestParts<S, Rejection = Infallible>,
    BoxRng: FromRequestParts<S, Rejection = Infallible>,
{
    healthcheck_router()
        .merge(api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
