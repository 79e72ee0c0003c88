use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::product_return::RefundMethod;

/// A money movement tied to an invoice.
///
/// Refunds are stored with a negative `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: RefundMethod,
    pub notes: String,
    pub payment_date: DateTime<Utc>,
}

/// Payment row to be written by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: RefundMethod,
    pub notes: String,
}
