// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use idlink_storage::{BoxRepositoryFactory, RepositoryError, RepositoryTransaction};
use tracing::{Instrument, info_span};

use crate::ErrorResponse;

#[derive(Debug, thiserror::Error)]
#[error("Storage is unavailable")]
pub struct RouteError(#[from] RepositoryError);

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        tracing::error!(
            error = &self as &dyn std::error::Error,
            "Health check failed"
        );
        ErrorResponse::internal(&self).into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub async fn get(
    State(repositories): State<BoxRepositoryFactory>,
) -> Result<impl IntoResponse, RouteError> {
    let repo = repositories
        .create()
        .instrument(info_span!("Storage health"))
        .await?;
    repo.cancel().await?;

    Ok("ok")
}

#[cfg(test)]
mod tests {
    use http::{Request, StatusCode};

    use crate::test_utils::{RequestBuilderExt, ResponseExt, TestState, setup};

    #[tokio::test]
    async fn test_get_health() {
        setup();
        let state = TestState::new();
        let request = Request::get("/health").empty();

        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.body(), "ok");
    }
}
