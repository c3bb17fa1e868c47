use axum::{routing::get, Router};

pub mod forms;
pub mod products;
pub mod system;
pub mod warehouses;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/forms/token", get(forms::issue_token))
        .route("/warehouses", get(warehouses::list))
        .nest("/products", products::router())
}
