use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{Customer, Invoice, Product, ProductReturn};
use crate::returns::flow::{advance, FlowEvent, ReturnFlow};
use crate::returns::locator;
use crate::returns::types::{
    ReturnListQuery, ReturnQuote, ReturnableInvoice, SearchQuery, SubmitReturnRequest,
    SubmitReturnResponse, UpdateReturnStatus,
};
use crate::AppState;

/// Body of `POST /api/returns/flow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRequest {
    #[serde(default)]
    pub state: ReturnFlow,
    pub event: FlowEvent,
}

/// Customer lookup endpoint handler.
///
/// Handles GET requests to `/api/customers/search?q=`.
pub async fn search_customers_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = locator::search_customers(state.returns.store(), &query.q).await?;
    Ok(Json(customers))
}

/// Handles GET requests to `/api/customers/:id/invoices`.
pub async fn customer_invoices_handler(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = locator::customer_invoices(state.returns.store(), customer_id).await?;
    Ok(Json(invoices))
}

/// Exchange product lookup, `/api/products/search?q=`.
pub async fn search_products_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = locator::search_products(state.returns.store(), &query.q).await?;
    Ok(Json(products))
}

/// Handles GET requests to `/api/invoices/:id/returnable`.
pub async fn returnable_invoice_handler(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<ReturnableInvoice>, AppError> {
    Ok(Json(state.returns.load_returnable(invoice_id).await?))
}

/// Validates a return and reports its outcome without writing anything.
pub async fn quote_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitReturnRequest>,
) -> Result<Json<ReturnQuote>, AppError> {
    Ok(Json(state.returns.quote(&request).await?))
}

/// Return submission endpoint handler.
///
/// Handles POST requests to `/api/returns`.
pub async fn submit_return_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(operator_id)): Extension<CurrentUser>,
    Json(request): Json<SubmitReturnRequest>,
) -> Result<Json<SubmitReturnResponse>, AppError> {
    info!(
        "Return submission from operator {} for invoice {}",
        operator_id, request.invoice_id
    );

    let response = state.returns.submit(&request).await?;
    Ok(Json(response))
}

pub async fn list_returns_handler(
    State(state): State<AppState>,
    Query(query): Query<ReturnListQuery>,
) -> Result<Json<Vec<ProductReturn>>, AppError> {
    Ok(Json(state.returns.list_returns(query.status).await?))
}

pub async fn get_return_handler(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
) -> Result<Json<ProductReturn>, AppError> {
    Ok(Json(state.returns.get_return(return_id).await?))
}

/// Review decision endpoint, `POST /api/returns/:id/status`.
pub async fn review_return_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(operator_id)): Extension<CurrentUser>,
    Path(return_id): Path<Uuid>,
    Json(update): Json<UpdateReturnStatus>,
) -> Result<Json<ProductReturn>, AppError> {
    info!(
        "Operator {} sets return {} to {}",
        operator_id, return_id, update.status
    );

    Ok(Json(state.returns.review(return_id, &update).await?))
}

/// Advances the caller's flow state by one event.
pub async fn flow_handler(
    State(state): State<AppState>,
    Json(request): Json<FlowRequest>,
) -> Result<Json<ReturnFlow>, AppError> {
    let flow = advance(&state.returns, request.state, request.event).await?;
    Ok(Json(flow))
}
