pub mod register;
pub use self::register::register;

pub mod retrieve;
pub use self::retrieve::retrieve;

pub mod reset;
pub use self::reset::reset;

pub mod root;
pub use self::root::root;

pub mod status;
pub use self::status::status;

// common functions for the handlers
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::vault::{VaultError, MIN_USERNAME_LEN};

/// Error body shared by every endpoint: `{"error": "<message>"}`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn valid_username(username: &str) -> bool {
    username.chars().count() >= MIN_USERNAME_LEN
}

pub(crate) fn error_body(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Translate a store outcome to its wire status and body. Backend failures
/// are logged and collapsed to a generic 500.
pub(crate) fn vault_error(err: &VaultError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        VaultError::UsernameTooShort
        | VaultError::CodeCountOutOfRange { .. }
        | VaultError::EmptyEnvelope => StatusCode::BAD_REQUEST,
        VaultError::AlreadyExists => StatusCode::CONFLICT,
        VaultError::NotFound => StatusCode::NOT_FOUND,
        VaultError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        VaultError::Exhausted => StatusCode::GONE,
        VaultError::Backend(_) => {
            error!("vault store failure: {err:?}");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    error_body(status, &err.to_string())
}
