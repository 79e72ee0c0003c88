//! Return arithmetic and validation.
//!
//! Nothing here touches the store: callers load the invoice lines, prior
//! returns and replacement product, then ask for a [`ReturnQuote`].

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::product_return::ReturnType;
use crate::models::{InvoiceItem, Product};
use crate::returns::types::{ExchangeBalance, ReturnQuote, ReturnSelection, ReturnableLine};

/// Rounds a money amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Annotates invoice lines with prior returns and hides fully returned ones.
///
/// Prior returns are keyed by product, so every line of the same product
/// on the invoice sees the same `already_returned`.
pub fn returnable_lines(items: &[InvoiceItem], returned: &HashMap<Uuid, i32>) -> Vec<ReturnableLine> {
    items
        .iter()
        .map(|item| {
            let already_returned = returned.get(&item.product_id).copied().unwrap_or(0);
            ReturnableLine {
                invoice_item_id: item.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                already_returned,
                max_return_quantity: (item.quantity - already_returned).max(0),
            }
        })
        .filter(|line| line.max_return_quantity > 0)
        .collect()
}

/// `round(unit_price * min(requested, max), 2)`, never negative.
pub fn refund_amount(unit_price: Decimal, requested: i32, max_return_quantity: i32) -> Decimal {
    let quantity = requested.min(max_return_quantity).max(0);
    round_money(unit_price * Decimal::from(quantity)).max(Decimal::ZERO)
}

/// What the customer owes (positive) or is owed (negative) on an exchange.
///
/// Exchanging an item for the same product is always an even swap.
pub fn exchange_price_difference(
    returned_product_id: Uuid,
    exchange_product: &Product,
    quantity: i32,
    refund_amount: Decimal,
    return_fees: Decimal,
) -> Decimal {
    if exchange_product.id == returned_product_id {
        return Decimal::ZERO;
    }

    let exchange_amount = exchange_product.selling_price * Decimal::from(quantity);
    round_money(exchange_amount - (refund_amount - return_fees))
}

pub fn classify_balance(price_difference: Decimal) -> ExchangeBalance {
    if price_difference > Decimal::ZERO {
        ExchangeBalance::CustomerOwes(price_difference)
    } else if price_difference < Decimal::ZERO {
        ExchangeBalance::StoreCredit(-price_difference)
    } else {
        ExchangeBalance::EvenSwap
    }
}

/// Validates a selection and computes its monetary outcome.
///
/// Checks run in the order the operator fills the form and the first
/// failure is returned.
pub fn quote(
    line: Option<&ReturnableLine>,
    selection: &ReturnSelection,
    exchange_product: Option<&Product>,
) -> Result<ReturnQuote, AppError> {
    let line = line.ok_or_else(|| AppError::validation("Please select an item to return"))?;

    let quantity = selection.quantity;
    if quantity < 1 || quantity > line.max_return_quantity {
        return Err(AppError::validation(format!(
            "Return quantity must be between 1 and {}",
            line.max_return_quantity
        )));
    }

    let exchange_product = match selection.return_type {
        ReturnType::Exchange => {
            let product = exchange_product
                .ok_or_else(|| AppError::validation("Please select a product for exchange"))?;
            if product.quantity < quantity {
                return Err(AppError::validation(format!(
                    "Insufficient stock for exchange. Only {} available",
                    product.quantity
                )));
            }
            Some(product)
        }
        ReturnType::Refund => None,
    };

    let refund = refund_amount(line.unit_price, quantity, line.max_return_quantity);
    let fees = round_money(selection.return_fees);
    if fees < Decimal::ZERO {
        return Err(AppError::validation("Return fees cannot be negative"));
    }
    if fees > refund {
        return Err(AppError::validation("Return fees cannot exceed the refund amount"));
    }

    let (exchange_amount, price_difference, balance) = match exchange_product {
        Some(product) => {
            let difference = exchange_price_difference(line.product_id, product, quantity, refund, fees);
            (
                Some(round_money(product.selling_price * Decimal::from(quantity))),
                difference,
                Some(classify_balance(difference)),
            )
        }
        None => (None, Decimal::ZERO, None),
    };

    Ok(ReturnQuote {
        quantity,
        unit_price: line.unit_price,
        refund_amount: refund,
        return_fees: fees,
        net_refund: refund - fees,
        exchange_amount,
        price_difference,
        balance,
    })
}
