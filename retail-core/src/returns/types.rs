use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::product_return::{ItemCondition, RefundMethod, ReturnStatus, ReturnType};
use crate::models::{Invoice, Payment, ProductHistory, ProductReturn};

/// An invoice line annotated with how much of it can still be returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnableLine {
    pub invoice_item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,

    /// Originally purchased quantity
    pub quantity: i32,

    pub unit_price: Decimal,

    /// Sum of prior returns for this product on the invoice
    pub already_returned: i32,

    /// `quantity - already_returned`
    pub max_return_quantity: i32,
}

/// An invoice ready for the configure step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnableInvoice {
    pub invoice: Invoice,

    /// Lines with at least one unit left to return
    pub lines: Vec<ReturnableLine>,

    /// Operator-facing notice, e.g. when return history was unavailable
    pub notice: Option<String>,
}

/// Monetary outcome of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum ExchangeBalance {
    /// Replacement costs more; the customer pays the difference
    CustomerOwes(Decimal),
    /// Replacement costs less; the store owes the difference as credit
    StoreCredit(Decimal),
    EvenSwap,
}

/// Quantity, disposition and fees chosen for a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnSelection {
    pub quantity: i32,
    pub return_type: ReturnType,
    pub return_fees: Decimal,
}

/// Computed outcome of a validated return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnQuote {
    pub quantity: i32,
    pub unit_price: Decimal,

    /// `unit_price * quantity`, rounded to cents
    pub refund_amount: Decimal,

    pub return_fees: Decimal,

    /// `refund_amount - return_fees`
    pub net_refund: Decimal,

    /// Replacement price times quantity (exchange only)
    pub exchange_amount: Option<Decimal>,

    /// Positive when the customer owes more; zero for refunds
    pub price_difference: Decimal,

    pub balance: Option<ExchangeBalance>,
}

/// Return submission as sent by the configure step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReturnRequest {
    pub invoice_id: Uuid,
    pub invoice_item_id: Option<Uuid>,
    pub quantity: i32,
    #[serde(default)]
    pub return_type: ReturnType,
    pub exchange_product_id: Option<Uuid>,
    pub refund_method: Option<RefundMethod>,
    pub return_fees: Option<Decimal>,
    pub reason: Option<String>,
    pub condition: Option<ItemCondition>,
    pub admin_notes: Option<String>,
}

/// Everything a successful submission wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReturnResponse {
    pub product_return: ProductReturn,
    pub quote: ReturnQuote,
    pub history: Vec<ProductHistory>,
    pub payment: Option<Payment>,
    pub exchange_invoice: Option<Invoice>,
}

/// `?q=` search parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnListQuery {
    pub status: Option<ReturnStatus>,
}

/// Review decision for a return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReturnStatus {
    pub status: ReturnStatus,
    pub admin_notes: Option<String>,
}
