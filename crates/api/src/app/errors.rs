use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_infra::StockError;

/// Error response for the read endpoints (actions answer with notices).
pub fn stock_error_to_response(err: StockError) -> axum::response::Response {
    match err {
        StockError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StockError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        StockError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StockError::Persistence(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
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
