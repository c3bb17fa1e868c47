use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::dto::WarehouseResponse;
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.warehouses().await {
        Ok(warehouses) => Json(
            warehouses
                .into_iter()
                .map(WarehouseResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::stock_error_to_response(e),
    }
}
