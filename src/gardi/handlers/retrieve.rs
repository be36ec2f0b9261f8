use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
    gardi::handlers::{error_body, vault_error, ErrorResponse},
    vault::SharedVaultStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RetrieveRequest {
    pub username: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResponse {
    pub encrypted_code: String,
    pub codes_remaining: usize,
    pub total_codes: usize,
}

#[utoipa::path(
    post,
    path = "/api/retrieve",
    request_body = RetrieveRequest,
    responses(
        (status = 200, description = "Next unused envelope, now marked redeemed", body = RetrieveResponse),
        (status = 400, description = "Missing username", body = ErrorResponse),
        (status = 404, description = "Unknown username", body = ErrorResponse),
        (status = 410, description = "Every envelope has been redeemed", body = ErrorResponse),
        (status = 429, description = "Cooldown still running", body = ErrorResponse),
    ),
    tag = "vault"
)]
#[instrument(skip(store, payload))]
pub async fn retrieve(
    Extension(store): Extension<SharedVaultStore>,
    payload: Option<Json<RetrieveRequest>>,
) -> impl IntoResponse {
    let username = match payload {
        Some(Json(RetrieveRequest {
            username: Some(username),
        })) => username,
        _ => return error_body(StatusCode::BAD_REQUEST, "Username is required").into_response(),
    };

    match store.retrieve_next(&username).await {
        Ok(redemption) => {
            debug!(
                "redeemed one envelope for {username}, {} remaining",
                redemption.remaining
            );
            (
                StatusCode::OK,
                Json(RetrieveResponse {
                    encrypted_code: redemption.envelope,
                    codes_remaining: redemption.remaining,
                    total_codes: redemption.total,
                }),
            )
                .into_response()
        }
        Err(err) => vault_error(&err).into_response(),
    }
}
