use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sqlx(rename = "pending")]
    Pending,
    #[sqlx(rename = "paid")]
    Paid,
    #[sqlx(rename = "completed")]
    Completed,
    #[sqlx(rename = "cancelled")]
    Cancelled,
}

/// Kind of transaction an invoice header records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    /// A completed sale at the till
    #[sqlx(rename = "sales")]
    Sales,
    /// Follow-up invoice for the balance owed on an exchange
    #[sqlx(rename = "exchange")]
    Exchange,
}

/// Invoice model representing a completed sale or exchange balance.
///
/// This struct maps to the `invoices` table. Sales invoices are created at
/// checkout and are read-only for the return workflow; exchange invoices
/// are written by the ledger when a customer owes a price difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: Uuid,

    /// Human-facing invoice number
    pub invoice_number: String,

    /// Buyer, if the sale was recorded against a customer
    pub customer_id: Option<Uuid>,

    /// Invoice total
    pub total_amount: Decimal,

    /// Invoice status
    pub status: InvoiceStatus,

    /// Sales or exchange
    pub invoice_type: InvoiceType,

    /// Free-form notes
    pub notes: Option<String>,

    /// Timestamp when the invoice was created
    pub created_at: DateTime<Utc>,
}

/// One purchased line on an invoice.
///
/// `quantity` is the original purchase count; returns never modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Exchange invoice to be written by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExchangeInvoice {
    pub invoice_number: String,
    pub customer_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub notes: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}
