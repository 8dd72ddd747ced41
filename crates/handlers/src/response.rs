// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use idlink_linking::{LinkError, LinkErrorKind};
use serde::{Deserialize, Serialize};

/// The body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error category
    pub error: String,

    /// A more precise reason, when the category has several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// A human readable description of the error
    pub error_description: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: &str, error_description: impl Into<String>) -> Self {
        Self {
            error: error.to_owned(),
            error_code: None,
            error_description: error_description.into(),
        }
    }

    #[must_use]
    pub(crate) fn with_code(mut self, error_code: &str) -> Self {
        self.error_code = Some(error_code.to_owned());
        self
    }

    pub(crate) fn internal(error: &dyn std::error::Error) -> Self {
        Self::new("internal_error", error.to_string())
    }

    pub(crate) fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Map a [`LinkError`] to a status code and a body
///
/// Internal errors are logged with their cause, and only their description
/// goes in the body.
pub(crate) fn link_error_response(error: &LinkError) -> Response {
    let kind = error.kind();
    let description = error.to_string();

    let (status, body) = match kind {
        LinkErrorKind::ValidationFailed => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("validation_failed", description),
        ),

        LinkErrorKind::ProviderNotFound
        | LinkErrorKind::BadIdToken
        | LinkErrorKind::UnacceptableAudience
        | LinkErrorKind::InvalidNonce => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_request", description).with_code(kind.as_str()),
        ),

        LinkErrorKind::LinkedToThisUser | LinkErrorKind::LinkedToAnotherUser => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::new("identity_already_exists", description).with_code(kind.as_str()),
        ),

        LinkErrorKind::Internal => {
            tracing::error!(
                error = error as &dyn std::error::Error,
                "Failed to link identity"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::internal(error),
            )
        }
    };

    body.into_response_with(status)
}
