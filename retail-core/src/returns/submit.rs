use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::invoice::NewExchangeInvoice;
use crate::models::payment::NewPayment;
use crate::models::product::{HistoryAction, StockChange};
use crate::models::product_return::{NewProductReturn, ReturnType};
use crate::models::{Invoice, Product};
use crate::returns::types::{ReturnQuote, ReturnableLine, SubmitReturnRequest};
use crate::store::ReturnPlan;

pub const DEFAULT_REASON: &str = "No reason provided";
pub const DEFAULT_ADMIN_NOTES: &str = "No admin notes";

/// Trimmed text, or `default` when blank or absent.
fn text_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default.to_string(),
    }
}

/// Builds the rows a validated return writes.
///
/// `quote` must come from [`crate::returns::reconcile::quote`] for the same
/// line and request, and `exchange_product` must be set for exchanges.
pub fn plan_return(
    invoice: &Invoice,
    line: &ReturnableLine,
    request: &SubmitReturnRequest,
    quote: &ReturnQuote,
    exchange_product: Option<&Product>,
) -> ReturnPlan {
    let quantity = quote.quantity;
    let refund_method = request.refund_method.unwrap_or_default();

    let mut stock_changes = vec![StockChange {
        product_id: line.product_id,
        product_name: line.product_name.clone(),
        delta: quantity,
        action: HistoryAction::Return,
        notes: format!(
            "Returned {} unit(s) from invoice {}",
            quantity, invoice.invoice_number
        ),
    }];

    let (refund_amount, total_amount, payment_method, payment) = match request.return_type {
        ReturnType::Refund => (
            quote.net_refund,
            quote.refund_amount,
            Some(refund_method),
            Some(NewPayment {
                invoice_id: invoice.id,
                amount: payout(quote.net_refund),
                payment_method: refund_method,
                notes: format!("Refund for return on invoice {}", invoice.invoice_number),
            }),
        ),
        ReturnType::Exchange => (
            Decimal::ZERO,
            quote.exchange_amount.unwrap_or(Decimal::ZERO),
            None,
            None,
        ),
    };

    let mut exchange_invoice = None;
    if let Some(product) = exchange_product.filter(|_| request.return_type == ReturnType::Exchange) {
        stock_changes.push(StockChange {
            product_id: product.id,
            product_name: product.name.clone(),
            delta: -quantity,
            action: HistoryAction::Remove,
            notes: format!(
                "Exchanged out {} unit(s) against invoice {}",
                quantity, invoice.invoice_number
            ),
        });

        if quote.price_difference > Decimal::ZERO && product.id != line.product_id {
            exchange_invoice = Some(NewExchangeInvoice {
                invoice_number: exchange_invoice_number(&invoice.invoice_number),
                customer_id: invoice.customer_id,
                total_amount: quote.price_difference,
                notes: format!(
                    "Balance due for exchange of {} x {} against invoice {}",
                    quantity, line.product_name, invoice.invoice_number
                ),
                product_id: product.id,
                product_name: product.name.clone(),
                quantity,
                unit_price: product.selling_price,
            });
        }
    }

    ReturnPlan {
        invoice_number: invoice.invoice_number.clone(),
        product_return: NewProductReturn {
            invoice_id: invoice.id,
            invoice_item_id: line.invoice_item_id,
            product_id: line.product_id,
            customer_id: invoice.customer_id,
            quantity,
            reason: text_or(request.reason.as_deref(), DEFAULT_REASON),
            return_type: request.return_type,
            refund_amount,
            exchange_product_id: exchange_product.map(|p| p.id),
            price_difference: quote.price_difference,
            payment_method,
            condition: request.condition.unwrap_or_default(),
            return_fees: quote.return_fees,
            admin_notes: text_or(request.admin_notes.as_deref(), DEFAULT_ADMIN_NOTES),
            total_amount,
        },
        stock_changes,
        payment,
        exchange_invoice,
    }
}

/// Signed payment amount for a refund. Never negative zero.
fn payout(net_refund: Decimal) -> Decimal {
    if net_refund.is_zero() {
        Decimal::ZERO
    } else {
        -net_refund
    }
}

/// `EXC-<original>-<suffix>`, unique per call.
fn exchange_invoice_number(original: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("EXC-{}-{}", original, &suffix[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{InvoiceStatus, InvoiceType};
    use crate::models::product_return::{ItemCondition, RefundMethod};
    use crate::returns::reconcile::quote;
    use crate::returns::types::ReturnSelection;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn invoice() -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-001".to_string(),
            customer_id: Some(Uuid::new_v4()),
            total_amount: dec!(50.00),
            status: InvoiceStatus::Paid,
            invoice_type: InvoiceType::Sales,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn line() -> ReturnableLine {
        ReturnableLine {
            invoice_item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Bulb-9W".to_string(),
            quantity: 10,
            unit_price: dec!(5.00),
            already_returned: 0,
            max_return_quantity: 10,
        }
    }

    fn request(invoice: &Invoice, line: &ReturnableLine, return_type: ReturnType) -> SubmitReturnRequest {
        SubmitReturnRequest {
            invoice_id: invoice.id,
            invoice_item_id: Some(line.invoice_item_id),
            quantity: 3,
            return_type,
            exchange_product_id: None,
            refund_method: None,
            return_fees: None,
            reason: Some("   ".to_string()),
            condition: None,
            admin_notes: None,
        }
    }

    fn selection(request: &SubmitReturnRequest) -> ReturnSelection {
        ReturnSelection {
            quantity: request.quantity,
            return_type: request.return_type,
            return_fees: request.return_fees.unwrap_or_default(),
        }
    }

    #[test]
    fn test_refund_plan() {
        let invoice = invoice();
        let line = line();
        let mut request = request(&invoice, &line, ReturnType::Refund);
        request.return_fees = Some(dec!(1.00));
        request.refund_method = Some(RefundMethod::Cash);
        let quote = quote(Some(&line), &selection(&request), None).unwrap();

        let plan = plan_return(&invoice, &line, &request, &quote, None);

        assert_eq!(plan.product_return.refund_amount, dec!(14.00));
        assert_eq!(plan.product_return.total_amount, dec!(15.00));
        assert_eq!(plan.product_return.reason, DEFAULT_REASON);
        assert_eq!(plan.product_return.admin_notes, DEFAULT_ADMIN_NOTES);
        assert_eq!(plan.product_return.condition, ItemCondition::Good);
        assert_eq!(plan.product_return.payment_method, Some(RefundMethod::Cash));

        let payment = plan.payment.expect("refund writes a payment");
        assert_eq!(payment.amount, dec!(-14.00));
        assert_eq!(payment.payment_method, RefundMethod::Cash);

        assert_eq!(plan.stock_changes.len(), 1);
        assert_eq!(plan.stock_changes[0].delta, 3);
        assert_eq!(plan.stock_changes[0].action, HistoryAction::Return);
        assert!(plan.stock_changes[0].notes.contains("INV-001"));
        assert!(plan.exchange_invoice.is_none());
    }

    #[test]
    fn test_fees_equal_to_refund_pay_out_plain_zero() {
        let invoice = invoice();
        let line = line();
        let mut request = request(&invoice, &line, ReturnType::Refund);
        request.return_fees = Some(dec!(15.00));
        let quote = quote(Some(&line), &selection(&request), None).unwrap();

        let plan = plan_return(&invoice, &line, &request, &quote, None);

        let payment = plan.payment.expect("refund writes a payment");
        assert!(payment.amount.is_zero());
        assert!(!payment.amount.is_sign_negative());
        assert_eq!(serde_json::to_string(&payment.amount).unwrap(), "0.0");
    }

    #[test]
    fn test_exchange_plan_with_balance_due() {
        let invoice = invoice();
        let line = line();
        let replacement = Product {
            id: Uuid::new_v4(),
            name: "Bulb-12W".to_string(),
            quantity: 20,
            selling_price: dec!(8.00),
        };
        let mut request = request(&invoice, &line, ReturnType::Exchange);
        request.exchange_product_id = Some(replacement.id);
        let quote = quote(Some(&line), &selection(&request), Some(&replacement)).unwrap();

        let plan = plan_return(&invoice, &line, &request, &quote, Some(&replacement));

        assert!(plan.payment.is_none());
        assert_eq!(plan.product_return.refund_amount, Decimal::ZERO);
        assert_eq!(plan.product_return.price_difference, dec!(9.00));
        assert_eq!(plan.product_return.exchange_product_id, Some(replacement.id));

        assert_eq!(plan.stock_changes.len(), 2);
        assert_eq!(plan.stock_changes[1].product_id, replacement.id);
        assert_eq!(plan.stock_changes[1].delta, -3);
        assert_eq!(plan.stock_changes[1].action, HistoryAction::Remove);

        let balance = plan.exchange_invoice.expect("customer owes the difference");
        assert_eq!(balance.total_amount, dec!(9.00));
        assert!(balance.invoice_number.starts_with("EXC-INV-001-"));
        assert_eq!(balance.customer_id, invoice.customer_id);
    }

    #[test]
    fn test_same_product_exchange_writes_no_invoice() {
        let invoice = invoice();
        let line = line();
        let same = Product {
            id: line.product_id,
            name: line.product_name.clone(),
            quantity: 20,
            selling_price: dec!(9.00),
        };
        let request = request(&invoice, &line, ReturnType::Exchange);
        let quote = quote(Some(&line), &selection(&request), Some(&same)).unwrap();

        let plan = plan_return(&invoice, &line, &request, &quote, Some(&same));

        assert!(plan.exchange_invoice.is_none());
        assert_eq!(plan.product_return.price_difference, Decimal::ZERO);
        let net: i32 = plan.stock_changes.iter().map(|c| c.delta).sum();
        assert_eq!(net, 0);
    }
}
