//! Return and exchange reconciliation service for a retail back office.
//!
//! Operators look up a customer and one of their sales invoices, choose a
//! line to take back, and settle it as a refund or an exchange. The
//! service computes the money, moves stock and writes the ledger rows in
//! one atomic step.

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::returns::handlers;
use crate::returns::ReturnService;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod returns;
pub mod store;

/// Application state shared with route handlers.
#[derive(Clone)]
pub struct AppState {
    pub returns: ReturnService,

    /// HS256 key for operator tokens
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(returns: ReturnService, jwt_secret: &str) -> Self {
        Self {
            returns,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "retail-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Verifies that the store is reachable.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.returns.store().ping().await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Creates the main application router.
///
/// Health routes are public; everything under `/api` needs an operator
/// token.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/customers/search", get(handlers::search_customers_handler))
        .route("/customers/:id/invoices", get(handlers::customer_invoices_handler))
        .route("/products/search", get(handlers::search_products_handler))
        .route("/invoices/:id/returnable", get(handlers::returnable_invoice_handler))
        .route(
            "/returns",
            get(handlers::list_returns_handler).post(handlers::submit_return_handler),
        )
        .route("/returns/quote", post(handlers::quote_handler))
        .route("/returns/flow", post(handlers::flow_handler))
        .route("/returns/:id", get(handlers::get_return_handler))
        .route("/returns/:id/status", post(handlers::review_return_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
