use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stocked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,

    /// Units on hand
    pub quantity: i32,

    pub selling_price: Decimal,
}

/// Inventory movement recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Stock came back from a customer
    #[sqlx(rename = "return")]
    Return,
    /// Stock left the shelf as an exchange replacement
    #[sqlx(rename = "remove")]
    Remove,
}

/// Append-only audit trail line, one per inventory mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductHistory {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub action_type: HistoryAction,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A pending change to one product's on-hand quantity, together with the
/// history row that documents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: Uuid,
    pub product_name: String,

    /// Signed change applied to `products.quantity`
    pub delta: i32,

    pub action: HistoryAction,
    pub notes: String,
}
