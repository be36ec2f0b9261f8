use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    gardi::handlers::{error_body, vault_error, ErrorResponse},
    vault::SharedVaultStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetRequest {
    pub username: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/reset",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Account deleted, username freed", body = ResetResponse),
        (status = 400, description = "Missing username", body = ErrorResponse),
        (status = 404, description = "Unknown username", body = ErrorResponse),
    ),
    tag = "vault"
)]
#[instrument(skip(store, payload))]
pub async fn reset(
    Extension(store): Extension<SharedVaultStore>,
    payload: Option<Json<ResetRequest>>,
) -> impl IntoResponse {
    let username = match payload {
        Some(Json(ResetRequest {
            username: Some(username),
        })) => username,
        _ => return error_body(StatusCode::BAD_REQUEST, "Username is required").into_response(),
    };

    match store.reset(&username).await {
        Ok(()) => {
            info!("account {username} deleted");
            (
                StatusCode::OK,
                Json(ResetResponse {
                    success: true,
                    message: "Account deleted successfully".to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => vault_error(&err).into_response(),
    }
}
