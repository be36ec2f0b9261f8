use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
    gardi::handlers::{error_body, valid_username, vault_error, ErrorResponse},
    vault::SharedVaultStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub encrypted_codes: Option<Vec<String>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub total_codes: usize,
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, envelopes stored", body = RegisterResponse),
        (status = 400, description = "Malformed username or envelope list", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
    ),
    tag = "vault"
)]
#[instrument(skip(store, payload))]
pub async fn register(
    Extension(store): Extension<SharedVaultStore>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_body(StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    // Structural checks first; the store re-validates under its lock.
    let Some(username) = request.username.filter(|name| valid_username(name)) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "Username must be at least 3 characters",
        )
        .into_response();
    };

    let policy = *store.policy();
    let Some(encrypted_codes) = request.encrypted_codes.filter(|codes| {
        codes.len() >= policy.min_codes && codes.len() <= policy.max_codes
    }) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            &format!(
                "Must provide between {} and {} encrypted codes",
                policy.min_codes, policy.max_codes
            ),
        )
        .into_response();
    };

    debug!("registering {} envelope(s) for {username}", encrypted_codes.len());

    match store.register(&username, encrypted_codes).await {
        Ok(total_codes) => (
            StatusCode::OK,
            Json(RegisterResponse {
                success: true,
                message: "User registered successfully".to_string(),
                total_codes,
            }),
        )
            .into_response(),
        Err(err) => vault_error(&err).into_response(),
    }
}
