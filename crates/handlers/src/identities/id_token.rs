// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use http::StatusCode;
use idlink_data_model::{BoxClock, BoxRng, Identity, Metadata};
use idlink_linking::{IdentityLinker, LinkError, LinkRequest, LinkedUser};
use idlink_storage::BoxRepositoryFactory;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{AuthenticatedUser, ErrorResponse, response::link_error_response};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid request body")]
    InvalidBody(#[from] JsonRejection),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidBody(rejection) => {
                ErrorResponse::new("validation_failed", rejection.body_text())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            Self::Link(e) => link_error_response(&e),
        }
    }
}

/// An identity of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: Ulid,
    pub provider: String,
    pub subject: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            provider: identity.provider,
            subject: identity.subject,
            metadata: identity.metadata,
            created_at: identity.created_at,
        }
    }
}

/// A user, with all its identities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Ulid,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub providers: Vec<String>,
    pub identities: Vec<IdentityResponse>,
}

impl From<LinkedUser> for UserResponse {
    fn from(linked: LinkedUser) -> Self {
        let LinkedUser {
            user, identities, ..
        } = linked;

        Self {
            id: user.id,
            created_at: user.created_at,
            metadata: user.metadata,
            providers: user.providers,
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }
}

#[tracing::instrument(
    name = "handler.identities.id_token.post",
    skip_all,
    fields(user.id = %user.id),
)]
pub async fn post(
    State(linker): State<IdentityLinker>,
    State(repositories): State<BoxRepositoryFactory>,
    mut rng: BoxRng,
    clock: BoxClock,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, RouteError> {
    let Json(request) = payload?;

    let linked = linker
        .link(&*repositories, &mut rng, &clock, user, &request)
        .await?;

    Ok(Json(linked.into()))
}

#[cfg(test)]
mod tests {
    use http::{Request, StatusCode};
    use idlink_data_model::{AuditAction, Clock};
    use idlink_storage_memory::FailPoint;
    use serde_json::{Value, json};

    use super::*;
    use crate::test_utils::{
        CLIENT_ID, ISSUER, PROVIDER, RequestBuilderExt, ResponseExt, SUBJECT, TestState, setup,
    };

    fn link_request(id_token: &str) -> Value {
        json!({
            "provider": PROVIDER,
            "id_token": id_token,
        })
    }

    #[tokio::test]
    async fn test_link_identity() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({ "name": "Alice" })).await;

        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));

        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);
        let body: UserResponse = response.json();

        assert_eq!(body.id, user.id);
        assert_eq!(body.providers, vec![PROVIDER]);
        assert_eq!(body.metadata["name"], "Alice Liddell");
        assert_eq!(body.metadata["email"], "alice@example.com");
        assert_eq!(body.metadata["iss"], ISSUER);
        assert_eq!(body.metadata["sub"], SUBJECT);

        assert_eq!(body.identities.len(), 1);
        let identity = &body.identities[0];
        assert_eq!(identity.provider, PROVIDER);
        assert_eq!(identity.subject, SUBJECT);
        assert_eq!(identity.metadata["email_verified"], true);
        assert_eq!(identity.created_at, state.clock.now());

        let store = state.store();
        assert_eq!(store.identities().len(), 1);
        let audit_log = store.audit_log();
        assert_eq!(audit_log.len(), 1);
        assert_eq!(audit_log[0].actor_id, user.id);
        assert_eq!(audit_log[0].action, AuditAction::IdentityLinked);
    }

    #[tokio::test]
    async fn test_link_by_issuer_and_client_id() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;

        let id_token = state.id_token(json!({ "aud": [CLIENT_ID, "other"] }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({
                "client_id": CLIENT_ID,
                "issuer": ISSUER,
                "id_token": id_token,
            }));

        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);
        let body: UserResponse = response.json();
        assert_eq!(body.providers, vec![PROVIDER]);
    }

    #[tokio::test]
    async fn test_relink_same_identity() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;
        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));

        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));
        state.request(request).await.assert_status(StatusCode::OK);

        // Replaying the same token for the same user
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "identity_already_exists",
          "error_code": "linked_to_this_user",
          "error_description": "Identity is already linked to this user"
        }
        "#);

        let store = state.store();
        assert_eq!(store.identities().len(), 1);
        assert_eq!(store.audit_log().len(), 1);
    }

    #[tokio::test]
    async fn test_identity_linked_to_another_user() {
        setup();
        let state = TestState::new();
        let alice = state.create_user(json!({})).await;
        let bob = state.create_user(json!({})).await;
        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));

        let request = Request::post("/user/identities/id_token")
            .authenticated(alice.id)
            .json(link_request(&id_token));
        state.request(request).await.assert_status(StatusCode::OK);

        let request = Request::post("/user/identities/id_token")
            .authenticated(bob.id)
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "identity_already_exists",
          "error_code": "linked_to_another_user",
          "error_description": "Identity is already linked to another user"
        }
        "#);

        let store = state.store();
        let bob = store.users().into_iter().find(|u| u.id == bob.id).unwrap();
        assert!(bob.providers.is_empty());
    }

    #[tokio::test]
    async fn test_unacceptable_audience() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;

        let id_token = state.id_token(json!({ "aud": "client-b" }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));

        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "invalid_request",
          "error_code": "unacceptable_audience",
          "error_description": "Unacceptable audience in id_token"
        }
        "#);

        state.assert_untouched(&user);
    }

    #[tokio::test]
    async fn test_nonce_mismatch() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;

        let id_token = state.id_token(json!({ "aud": CLIENT_ID, "nonce": "xyz" }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({
                "provider": PROVIDER,
                "id_token": id_token,
                "nonce": "abc",
            }));

        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "invalid_request",
          "error_code": "invalid_nonce",
          "error_description": "Invalid nonce"
        }
        "#);

        state.assert_untouched(&user);

        // The matching nonce goes through
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({
                "provider": PROVIDER,
                "id_token": id_token,
                "nonce": "xyz",
            }));
        state.request(request).await.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_id_token() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;

        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request("not-a-jwt"));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "invalid_request",
          "error_code": "bad_id_token",
          "error_description": "Bad ID token"
        }
        "#);

        // Signed by the right key, but for another issuer
        let id_token = state.id_token(json!({
            "aud": CLIENT_ID,
            "iss": "https://evil.example.com",
        }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error_code.as_deref(), Some("bad_id_token"));

        state.assert_untouched(&user);
    }

    #[tokio::test]
    async fn test_provider_not_found() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;
        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));

        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({
                "provider": "github",
                "id_token": id_token,
            }));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "invalid_request");
        assert_eq!(body.error_code.as_deref(), Some("provider_not_found"));

        state.assert_untouched(&user);
    }

    #[tokio::test]
    async fn test_validation_failed() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;

        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({ "provider": PROVIDER }));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "validation_failed",
          "error_description": "id_token is required"
        }
        "#);

        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(json!({ "id_token": id_token, "client_id": CLIENT_ID }));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "validation_failed");
        assert_eq!(
            body.error_description,
            "provider or client_id and issuer are required"
        );

        // Not JSON at all
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .header("content-type", "application/json")
            .body("{".to_owned())
            .unwrap();
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "validation_failed");

        state.assert_untouched(&user);
    }

    #[tokio::test]
    async fn test_unauthenticated() {
        setup();
        let state = TestState::new();
        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));

        let request = Request::post("/user/identities/id_token").json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "unauthorized",
          "error_description": "Missing authenticated user"
        }
        "#);

        let request = Request::post("/user/identities/id_token")
            .header("x-authenticated-user", "alice")
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        // A well-formed ID of a user which does not exist
        let request = Request::post("/user/identities/id_token")
            .authenticated(Ulid::nil())
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "user_not_found");

        assert!(state.store().identities().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure() {
        setup();
        let state = TestState::new();
        let user = state.create_user(json!({})).await;
        let id_token = state.id_token(json!({ "aud": CLIENT_ID }));

        state.store().fail_at(FailPoint::AuditLogAdd);
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));
        let response = state.request(request).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        // The description is kept, the cause is not sent
        insta::assert_json_snapshot!(response.json::<Value>(), @r#"
        {
          "error": "internal_error",
          "error_description": "Error recording audit log entry"
        }
        "#);

        state.assert_untouched(&user);

        state.store().clear_fail_points();
        let request = Request::post("/user/identities/id_token")
            .authenticated(user.id)
            .json(link_request(&id_token));
        state.request(request).await.assert_status(StatusCode::OK);
    }
}
