use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};

use stockledger_infra::ProductRef;

use crate::app::actions::ProductActions;
use crate::app::dto::{ActionForm, MovementListResponse, MovementResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/actions", post(exec_action))
        .route("/:id/movements", get(list_movements))
}

/// Run a product edit form action. Always `200`; outcomes are notices.
pub async fn exec_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Form(form): Form<ActionForm>,
) -> axum::response::Response {
    let response = ProductActions::new(&services).exec(&principal, form).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// Movements of a product (id or reference), newest first.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product: ProductRef = match id.parse() {
        Ok(p) => p,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}"));
        }
    };

    match services.rebuilder.list_movements(&product).await {
        Ok(listing) => Json(MovementListResponse {
            has_movements: listing.has_movements,
            movements: listing.movements.iter().map(MovementResponse::from).collect(),
        })
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
