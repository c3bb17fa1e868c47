//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store and service wiring
//! - `actions.rs`: product edit form actions (change-stock, rebuilds)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::middleware;

pub mod actions;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, ServiceError};

/// Build the full HTTP router for the configured backend (used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, ServiceError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router_with_services(config, services))
}

/// Build the router around existing services.
pub fn router_with_services(config: &AppConfig, services: Arc<AppServices>) -> Router {
    let jwt = Arc::new(stockledger_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
