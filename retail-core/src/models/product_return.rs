use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// The operator's disposition for a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    #[default]
    #[sqlx(rename = "refund")]
    Refund,
    #[sqlx(rename = "exchange")]
    Exchange,
}

/// Review status of a return.
///
/// Returns progress `pending -> approved -> completed`; `rejected` is
/// reachable from either of the first two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[sqlx(rename = "pending")]
    Pending,
    #[sqlx(rename = "approved")]
    Approved,
    #[sqlx(rename = "completed")]
    Completed,
    #[sqlx(rename = "rejected")]
    Rejected,
}

impl ReturnStatus {
    /// Whether a reviewer may move a return from `self` to `next`.
    pub fn can_transition_to(self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (ReturnStatus::Pending, ReturnStatus::Approved)
                | (ReturnStatus::Pending, ReturnStatus::Rejected)
                | (ReturnStatus::Approved, ReturnStatus::Completed)
                | (ReturnStatus::Approved, ReturnStatus::Rejected)
        )
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnStatus::Pending => write!(f, "pending"),
            ReturnStatus::Approved => write!(f, "approved"),
            ReturnStatus::Completed => write!(f, "completed"),
            ReturnStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// How a refund is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Back to the method used for the original sale
    #[default]
    #[sqlx(rename = "original")]
    Original,
    #[sqlx(rename = "store_credit")]
    StoreCredit,
    #[sqlx(rename = "cash")]
    Cash,
}

/// Condition of the returned goods as judged at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    #[default]
    #[sqlx(rename = "good")]
    Good,
    #[sqlx(rename = "opened")]
    Opened,
    #[sqlx(rename = "damaged")]
    Damaged,
    #[sqlx(rename = "defective")]
    Defective,
}

/// One return/exchange transaction.
///
/// Maps to the `product_returns` table. For refunds `refund_amount` holds
/// the amount paid back after fees; for exchanges it is zero and
/// `price_difference` carries the balance (positive: customer owes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductReturn {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub quantity: i32,
    pub reason: String,
    pub return_type: ReturnType,
    pub status: ReturnStatus,
    pub refund_amount: Decimal,
    pub exchange_product_id: Option<Uuid>,
    pub price_difference: Decimal,
    pub payment_method: Option<RefundMethod>,
    pub condition: ItemCondition,
    pub return_fees: Decimal,
    pub admin_notes: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Return row to be written by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductReturn {
    pub invoice_id: Uuid,
    pub invoice_item_id: Uuid,
    pub product_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub quantity: i32,
    pub reason: String,
    pub return_type: ReturnType,
    pub refund_amount: Decimal,
    pub exchange_product_id: Option<Uuid>,
    pub price_difference: Decimal,
    pub payment_method: Option<RefundMethod>,
    pub condition: ItemCondition,
    pub return_fees: Decimal,
    pub admin_notes: String,
    pub total_amount: Decimal,
}
