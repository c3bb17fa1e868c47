use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{extract::Extension, Json};
use chrono::Utc;

use crate::app::dto::FormTokenResponse;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Issue a single-use anti-forgery token for the caller.
pub async fn issue_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.form_tokens.issue(principal.user_id(), Utc::now()) {
        Ok(multireqtoken) => Json(FormTokenResponse { multireqtoken }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "form token not issued");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "form_token_error", e.to_string())
        }
    }
}
