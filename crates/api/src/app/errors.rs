use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use bankd_core::BankError;

/// Map an engine error to its HTTP response.
pub fn bank_error_to_response(err: BankError) -> axum::response::Response {
    match err {
        BankError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        BankError::InsufficientBalance => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_balance",
            "insufficient balance",
        ),
        BankError::Unprocessable(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg)
        }
        BankError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        BankError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
        BankError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        BankError::TooManyRequests => json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "too_many_requests",
            "too many requests",
        ),
        BankError::Store(msg) => {
            // Detail stays in the logs; the client gets a generic 500.
            tracing::error!(error = %msg, "store failure surfaced to handler");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
