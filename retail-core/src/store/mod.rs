//! Row-store boundary for the return workflow.
//!
//! Every read the locator and reconciliation engine need, plus the single
//! atomic write that applies a reconciled return, goes through [`Store`].
//! [`PgStore`] talks to PostgreSQL; [`MemoryStore`] keeps the same tables
//! in process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::invoice::NewExchangeInvoice;
use crate::models::payment::NewPayment;
use crate::models::product::StockChange;
use crate::models::product_return::{NewProductReturn, ReturnStatus};
use crate::models::{Customer, Invoice, InvoiceItem, Payment, Product, ProductHistory, ProductReturn};

pub mod feed;
pub mod memory;
pub mod postgres;

pub use feed::{ChangeFeed, ChangeKind, TableChange};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by a store backend.
///
/// The `Display` text is the backend's own message; callers surface it to
/// the operator unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend schema lacks a column the query expects.
    #[error("{0}")]
    SchemaDrift(String),

    /// A write was refused because the data changed underneath it.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Builds a backend error, recognising missing-column messages.
    pub fn backend(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_missing_column(&message) {
            StoreError::SchemaDrift(message)
        } else {
            StoreError::Backend(message)
        }
    }

    pub fn is_schema_drift(&self) -> bool {
        matches!(self, StoreError::SchemaDrift(_))
    }
}

/// Matches errors of the form `column "x" does not exist`.
fn is_missing_column(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("column") && lower.contains("does not exist")
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            // undefined_column
            sqlx::Error::Database(db) if db.code().as_deref() == Some("42703") => {
                StoreError::SchemaDrift(db.message().to_string())
            }
            sqlx::Error::Database(db) => StoreError::backend(db.message()),
            _ => StoreError::backend(err.to_string()),
        }
    }
}

/// Everything one return submission writes, applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPlan {
    /// Number of the invoice the goods were bought on
    pub invoice_number: String,

    pub product_return: NewProductReturn,

    /// Inventory changes, returned product first
    pub stock_changes: Vec<StockChange>,

    /// Refund payment (refund disposition only)
    pub payment: Option<NewPayment>,

    /// Balance invoice (exchange where the customer owes more)
    pub exchange_invoice: Option<NewExchangeInvoice>,
}

/// Rows written by [`Store::apply_return`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedReturn {
    pub product_return: ProductReturn,
    pub history: Vec<ProductHistory>,
    pub payment: Option<Payment>,
    pub exchange_invoice: Option<Invoice>,
}

/// Storage operations used by the return workflow.
#[async_trait]
pub trait Store: Send + Sync {
    /// Verifies the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Case-insensitive substring match on name, phone or email.
    async fn search_customers(&self, term: &str, limit: i64) -> Result<Vec<Customer>, StoreError>;

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;

    /// Sales invoices of a customer that have at least one line item,
    /// newest first.
    async fn sales_invoices_with_items(&self, customer_id: Uuid) -> Result<Vec<Invoice>, StoreError>;

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError>;

    async fn invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError>;

    /// Quantity already returned per product for an invoice.
    async fn returned_quantities(&self, invoice_id: Uuid) -> Result<HashMap<Uuid, i32>, StoreError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn search_products(&self, term: &str, limit: i64) -> Result<Vec<Product>, StoreError>;

    /// Applies a reconciled return atomically.
    ///
    /// The returnable quantity and every stock decrement are re-checked
    /// against current data; on any failure nothing is written.
    async fn apply_return(&self, plan: &ReturnPlan) -> Result<AppliedReturn, StoreError>;

    async fn get_return(&self, id: Uuid) -> Result<Option<ProductReturn>, StoreError>;

    /// Returns newest first, optionally restricted to one status.
    async fn list_returns(&self, status: Option<ReturnStatus>) -> Result<Vec<ProductReturn>, StoreError>;

    /// Moves a return from `from` to `to`. Fails with
    /// [`StoreError::Conflict`] if the stored status is no longer `from`.
    async fn update_return_status(
        &self,
        id: Uuid,
        from: ReturnStatus,
        to: ReturnStatus,
        admin_notes: Option<&str>,
    ) -> Result<ProductReturn, StoreError>;

    /// Change notifications for committed writes.
    fn changes(&self) -> &ChangeFeed;
}
