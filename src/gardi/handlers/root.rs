use axum::{response::IntoResponse, Json};
use serde_json::json;

// welcome banner for the API root
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the 2FA Vault API" }))
}
