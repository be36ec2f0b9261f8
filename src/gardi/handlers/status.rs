use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::{
    gardi::{handlers::ErrorResponse, ServerInfo, GIT_COMMIT_HASH},
    vault::SharedVaultStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Seconds since the server started.
    pub uptime: u64,
    pub status: String,
    pub time: String,
    pub total_users: u64,
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Service is up", body = StatusResponse),
        (status = 500, description = "Vault store unavailable", body = ErrorResponse),
    ),
    tag = "vault"
)]
#[instrument(skip(store, info))]
pub async fn status(
    Extension(store): Extension<SharedVaultStore>,
    Extension(info): Extension<ServerInfo>,
) -> impl IntoResponse {
    let total_users = match store.total_accounts().await {
        Ok(total) => total,
        Err(err) => {
            error!("status check failed: {err:?}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    let body = Json(StatusResponse {
        uptime: info.uptime().as_secs(),
        status: "OK".to_string(),
        time: Utc::now().to_rfc3339(),
        total_users,
    });

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse()
    {
        headers.insert("X-App", value);
    }

    (headers, body).into_response()
}
