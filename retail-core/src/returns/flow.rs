//! Operator flow for a return: pick a customer, pick one of their
//! invoices, then configure the return.
//!
//! [`ReturnFlow`] is plain serializable state owned by the caller. The pure
//! [`reduce`] applies a [`FlowAction`]; [`advance`] first resolves an
//! id-based [`FlowEvent`] through the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::product_return::{ItemCondition, RefundMethod, ReturnType};
use crate::models::{Customer, Invoice, Product};
use crate::returns::locator;
use crate::returns::reconcile;
use crate::returns::service::ReturnService;
use crate::returns::types::{
    ReturnQuote, ReturnSelection, ReturnableInvoice, ReturnableLine, SubmitReturnRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    #[default]
    SelectCustomer,
    SelectInvoice,
    ConfigureReturn,
}

/// Values entered on the configure step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnForm {
    pub invoice_item_id: Option<Uuid>,
    pub quantity: i32,
    pub return_type: ReturnType,
    pub exchange_product: Option<Product>,
    pub refund_method: RefundMethod,
    pub return_fees: Decimal,
    pub reason: String,
    pub condition: ItemCondition,
    pub admin_notes: String,
}

impl Default for ReturnForm {
    fn default() -> Self {
        Self {
            invoice_item_id: None,
            quantity: 1,
            return_type: ReturnType::Refund,
            exchange_product: None,
            refund_method: RefundMethod::Original,
            return_fees: Decimal::ZERO,
            reason: String::new(),
            condition: ItemCondition::Good,
            admin_notes: String::new(),
        }
    }
}

/// Partial update of the free-form configure fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDetails {
    pub refund_method: Option<RefundMethod>,
    pub return_fees: Option<Decimal>,
    pub reason: Option<String>,
    pub condition: Option<ItemCondition>,
    pub admin_notes: Option<String>,
}

/// Full state of one operator's return flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnFlow {
    pub step: FlowStep,
    pub customer: Option<Customer>,

    /// Candidate invoices of the selected customer
    pub invoices: Vec<Invoice>,

    pub invoice: Option<Invoice>,
    pub lines: Vec<ReturnableLine>,
    pub notice: Option<String>,
    pub form: ReturnForm,

    /// Outcome of the current form, when it validates
    pub preview: Option<ReturnQuote>,
}

/// A resolved transition.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    CustomerSelected {
        customer: Customer,
        invoices: Vec<Invoice>,
    },
    InvoiceSelected(ReturnableInvoice),
    LineSelected(Uuid),
    QuantityChanged(i32),
    ReturnTypeChanged(ReturnType),
    ExchangeProductSelected(Product),
    DetailsChanged(FormDetails),
    Back,
    Reset,
}

/// A transition as sent over the wire, by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    SelectCustomer { customer_id: Uuid },
    SelectInvoice { invoice_id: Uuid },
    SelectLine { invoice_item_id: Uuid },
    SetQuantity { quantity: i32 },
    SetReturnType { return_type: ReturnType },
    SelectExchangeProduct { product_id: Uuid },
    UpdateDetails(FormDetails),
    Back,
    Reset,
}

impl ReturnFlow {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_step(&self, step: FlowStep) -> Result<(), AppError> {
        if self.step == step {
            Ok(())
        } else {
            Err(AppError::invalid_transition(format!(
                "Action requires step {:?}, flow is at {:?}",
                step, self.step
            )))
        }
    }

    pub fn selected_line(&self) -> Option<&ReturnableLine> {
        let id = self.form.invoice_item_id?;
        self.lines.iter().find(|line| line.invoice_item_id == id)
    }

    fn refresh_preview(&mut self) {
        self.preview = if self.step == FlowStep::ConfigureReturn {
            let selection = ReturnSelection {
                quantity: self.form.quantity,
                return_type: self.form.return_type,
                return_fees: self.form.return_fees,
            };
            reconcile::quote(
                self.selected_line(),
                &selection,
                self.form.exchange_product.as_ref(),
            )
            .ok()
        } else {
            None
        };
    }

    /// The submission for the configured return.
    pub fn submission(&self) -> Result<SubmitReturnRequest, AppError> {
        self.require_step(FlowStep::ConfigureReturn)?;
        let invoice = self
            .invoice
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition("No invoice selected"))?;

        Ok(SubmitReturnRequest {
            invoice_id: invoice.id,
            invoice_item_id: self.form.invoice_item_id,
            quantity: self.form.quantity,
            return_type: self.form.return_type,
            exchange_product_id: self.form.exchange_product.as_ref().map(|p| p.id),
            refund_method: Some(self.form.refund_method),
            return_fees: Some(self.form.return_fees),
            reason: Some(self.form.reason.clone()),
            condition: Some(self.form.condition),
            admin_notes: Some(self.form.admin_notes.clone()),
        })
    }
}

/// Applies one action to the flow.
///
/// Selections move forward only from their own step. `Back` drops
/// everything chosen on and after the step it leaves.
pub fn reduce(mut flow: ReturnFlow, action: FlowAction) -> Result<ReturnFlow, AppError> {
    match action {
        FlowAction::CustomerSelected { customer, invoices } => {
            flow.require_step(FlowStep::SelectCustomer)?;
            flow.customer = Some(customer);
            flow.invoices = invoices;
            flow.step = FlowStep::SelectInvoice;
        }
        FlowAction::InvoiceSelected(returnable) => {
            flow.require_step(FlowStep::SelectInvoice)?;
            let customer_id = flow.customer.as_ref().map(|c| c.id);
            if customer_id.is_none() || returnable.invoice.customer_id != customer_id {
                return Err(AppError::invalid_transition(
                    "Invoice does not belong to the selected customer",
                ));
            }
            if !flow.invoices.iter().any(|i| i.id == returnable.invoice.id) {
                return Err(AppError::invalid_transition(
                    "Invoice is not one of the customer's returnable invoices",
                ));
            }
            flow.invoice = Some(returnable.invoice);
            flow.lines = returnable.lines;
            flow.notice = returnable.notice;
            flow.form = ReturnForm::default();
            flow.step = FlowStep::ConfigureReturn;
        }
        FlowAction::LineSelected(invoice_item_id) => {
            flow.require_step(FlowStep::ConfigureReturn)?;
            if !flow.lines.iter().any(|l| l.invoice_item_id == invoice_item_id) {
                return Err(AppError::validation("Please select an item to return"));
            }
            flow.form.invoice_item_id = Some(invoice_item_id);
            flow.form.quantity = 1;
        }
        FlowAction::QuantityChanged(quantity) => {
            flow.require_step(FlowStep::ConfigureReturn)?;
            flow.form.quantity = quantity;
        }
        FlowAction::ReturnTypeChanged(return_type) => {
            flow.require_step(FlowStep::ConfigureReturn)?;
            flow.form.return_type = return_type;
            if return_type == ReturnType::Refund {
                flow.form.exchange_product = None;
            }
        }
        FlowAction::ExchangeProductSelected(product) => {
            flow.require_step(FlowStep::ConfigureReturn)?;
            if flow.form.return_type != ReturnType::Exchange {
                return Err(AppError::invalid_transition(
                    "Choose exchange before selecting a replacement product",
                ));
            }
            flow.form.exchange_product = Some(product);
        }
        FlowAction::DetailsChanged(details) => {
            flow.require_step(FlowStep::ConfigureReturn)?;
            let form = &mut flow.form;
            if let Some(method) = details.refund_method {
                form.refund_method = method;
            }
            if let Some(fees) = details.return_fees {
                form.return_fees = fees;
            }
            if let Some(reason) = details.reason {
                form.reason = reason;
            }
            if let Some(condition) = details.condition {
                form.condition = condition;
            }
            if let Some(notes) = details.admin_notes {
                form.admin_notes = notes;
            }
        }
        FlowAction::Back => match flow.step {
            FlowStep::SelectCustomer => {}
            FlowStep::SelectInvoice => {
                flow.customer = None;
                flow.invoices.clear();
                flow.step = FlowStep::SelectCustomer;
            }
            FlowStep::ConfigureReturn => {
                flow.invoice = None;
                flow.lines.clear();
                flow.notice = None;
                flow.form = ReturnForm::default();
                flow.step = FlowStep::SelectInvoice;
            }
        },
        FlowAction::Reset => flow = ReturnFlow::default(),
    }

    flow.refresh_preview();
    Ok(flow)
}

/// Resolves a wire event through the store and applies it.
pub async fn advance(
    service: &ReturnService,
    flow: ReturnFlow,
    event: FlowEvent,
) -> Result<ReturnFlow, AppError> {
    let action = match event {
        FlowEvent::SelectCustomer { customer_id } => {
            flow.require_step(FlowStep::SelectCustomer)?;
            let customer = service
                .store()
                .get_customer(customer_id)
                .await?
                .ok_or_else(|| AppError::not_found("Customer"))?;
            let invoices = locator::customer_invoices(service.store(), customer_id).await?;
            FlowAction::CustomerSelected { customer, invoices }
        }
        FlowEvent::SelectInvoice { invoice_id } => {
            flow.require_step(FlowStep::SelectInvoice)?;
            FlowAction::InvoiceSelected(service.load_returnable(invoice_id).await?)
        }
        FlowEvent::SelectLine { invoice_item_id } => FlowAction::LineSelected(invoice_item_id),
        FlowEvent::SetQuantity { quantity } => FlowAction::QuantityChanged(quantity),
        FlowEvent::SetReturnType { return_type } => FlowAction::ReturnTypeChanged(return_type),
        FlowEvent::SelectExchangeProduct { product_id } => {
            let product = service
                .store()
                .get_product(product_id)
                .await?
                .ok_or_else(|| AppError::not_found("Exchange product"))?;
            FlowAction::ExchangeProductSelected(product)
        }
        FlowEvent::UpdateDetails(details) => FlowAction::DetailsChanged(details),
        FlowEvent::Back => FlowAction::Back,
        FlowEvent::Reset => FlowAction::Reset,
    };

    reduce(flow, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{InvoiceStatus, InvoiceType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn customer() -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: "Asha".to_string(),
            phone: None,
            email: None,
            created_at: Utc::now(),
        }
    }

    fn returnable_for(customer: &Customer) -> ReturnableInvoice {
        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-001".to_string(),
            customer_id: Some(customer.id),
            total_amount: dec!(50.00),
            status: InvoiceStatus::Paid,
            invoice_type: InvoiceType::Sales,
            notes: None,
            created_at: Utc::now(),
        };
        let line = ReturnableLine {
            invoice_item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Bulb-9W".to_string(),
            quantity: 10,
            unit_price: dec!(5.00),
            already_returned: 0,
            max_return_quantity: 10,
        };
        ReturnableInvoice {
            invoice,
            lines: vec![line],
            notice: None,
        }
    }

    fn configured() -> (ReturnFlow, Uuid) {
        let customer = customer();
        let returnable = returnable_for(&customer);
        let item_id = returnable.lines[0].invoice_item_id;

        let flow = reduce(
            ReturnFlow::new(),
            FlowAction::CustomerSelected {
                customer,
                invoices: vec![returnable.invoice.clone()],
            },
        )
        .unwrap();
        let flow = reduce(flow, FlowAction::InvoiceSelected(returnable)).unwrap();
        (flow, item_id)
    }

    #[test]
    fn test_forward_transitions() {
        let (flow, _) = configured();

        assert_eq!(flow.step, FlowStep::ConfigureReturn);
        assert!(flow.customer.is_some());
        assert!(flow.invoice.is_some());
        assert_eq!(flow.lines.len(), 1);
        assert_eq!(flow.form, ReturnForm::default());
    }

    #[test]
    fn test_out_of_order_actions_are_rejected() {
        let customer = customer();
        let returnable = returnable_for(&customer);

        let err = reduce(ReturnFlow::new(), FlowAction::InvoiceSelected(returnable)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let err = reduce(ReturnFlow::new(), FlowAction::QuantityChanged(2)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let (flow, _) = configured();
        let err = reduce(
            flow,
            FlowAction::CustomerSelected {
                customer,
                invoices: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_invoice_must_belong_to_customer() {
        let flow = reduce(
            ReturnFlow::new(),
            FlowAction::CustomerSelected {
                customer: customer(),
                invoices: Vec::new(),
            },
        )
        .unwrap();
        let stranger = returnable_for(&customer());

        let err = reduce(flow, FlowAction::InvoiceSelected(stranger)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_invoice_must_be_a_listed_candidate() {
        let customer = customer();
        let listed = returnable_for(&customer);
        let mut unlisted = returnable_for(&customer);
        unlisted.invoice.invoice_number = "EXC-INV-001-1A2B3C4D".to_string();
        unlisted.invoice.invoice_type = InvoiceType::Exchange;

        let flow = reduce(
            ReturnFlow::new(),
            FlowAction::CustomerSelected {
                customer,
                invoices: vec![listed.invoice.clone()],
            },
        )
        .unwrap();

        let err = reduce(flow.clone(), FlowAction::InvoiceSelected(unlisted)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(flow.invoice.is_none());

        let flow = reduce(flow, FlowAction::InvoiceSelected(listed)).unwrap();
        assert_eq!(flow.step, FlowStep::ConfigureReturn);
    }

    #[test]
    fn test_back_discards_downstream_state() {
        let (flow, item_id) = configured();
        let flow = reduce(flow, FlowAction::LineSelected(item_id)).unwrap();
        let flow = reduce(flow, FlowAction::QuantityChanged(4)).unwrap();

        let flow = reduce(flow, FlowAction::Back).unwrap();
        assert_eq!(flow.step, FlowStep::SelectInvoice);
        assert!(flow.invoice.is_none());
        assert!(flow.lines.is_empty());
        assert_eq!(flow.form, ReturnForm::default());
        assert!(flow.customer.is_some());

        let flow = reduce(flow, FlowAction::Back).unwrap();
        assert_eq!(flow.step, FlowStep::SelectCustomer);
        assert!(flow.customer.is_none());
        assert!(flow.invoices.is_empty());

        let flow = reduce(flow, FlowAction::Back).unwrap();
        assert_eq!(flow, ReturnFlow::default());
    }

    #[test]
    fn test_preview_tracks_the_form() {
        let (flow, item_id) = configured();
        assert!(flow.preview.is_none(), "no line selected yet");

        let flow = reduce(flow, FlowAction::LineSelected(item_id)).unwrap();
        let flow = reduce(flow, FlowAction::QuantityChanged(3)).unwrap();
        let preview = flow.preview.clone().expect("valid form has a preview");
        assert_eq!(preview.refund_amount, dec!(15.00));

        let flow = reduce(flow, FlowAction::QuantityChanged(11)).unwrap();
        assert!(flow.preview.is_none());
    }

    #[test]
    fn test_switching_to_refund_clears_exchange_product() {
        let (flow, item_id) = configured();
        let flow = reduce(flow, FlowAction::LineSelected(item_id)).unwrap();

        let replacement = Product {
            id: Uuid::new_v4(),
            name: "Bulb-12W".to_string(),
            quantity: 5,
            selling_price: dec!(8.00),
        };
        let err = reduce(flow.clone(), FlowAction::ExchangeProductSelected(replacement.clone()))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let flow = reduce(flow, FlowAction::ReturnTypeChanged(ReturnType::Exchange)).unwrap();
        let flow = reduce(flow, FlowAction::ExchangeProductSelected(replacement)).unwrap();
        assert!(flow.form.exchange_product.is_some());
        assert!(flow.preview.is_some());

        let flow = reduce(flow, FlowAction::ReturnTypeChanged(ReturnType::Refund)).unwrap();
        assert!(flow.form.exchange_product.is_none());
    }

    #[test]
    fn test_submission_carries_the_form() {
        let (flow, item_id) = configured();
        let flow = reduce(flow, FlowAction::LineSelected(item_id)).unwrap();
        let flow = reduce(
            flow,
            FlowAction::DetailsChanged(FormDetails {
                reason: Some("Flickers".to_string()),
                refund_method: Some(RefundMethod::StoreCredit),
                ..FormDetails::default()
            }),
        )
        .unwrap();

        let request = flow.submission().unwrap();
        assert_eq!(request.invoice_item_id, Some(item_id));
        assert_eq!(request.quantity, 1);
        assert_eq!(request.reason.as_deref(), Some("Flickers"));
        assert_eq!(request.refund_method, Some(RefundMethod::StoreCredit));

        assert!(ReturnFlow::new().submission().is_err());
    }

    #[test]
    fn test_flow_state_round_trips_through_json() {
        let (flow, item_id) = configured();
        let flow = reduce(flow, FlowAction::LineSelected(item_id)).unwrap();

        let json = serde_json::to_string(&flow).unwrap();
        let restored: ReturnFlow = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.step, FlowStep::ConfigureReturn);
        assert_eq!(restored.form.invoice_item_id, Some(item_id));
    }

    #[test]
    fn test_event_wire_format() {
        let event: FlowEvent =
            serde_json::from_str(r#"{"type":"set_quantity","quantity":3}"#).unwrap();
        assert_eq!(event, FlowEvent::SetQuantity { quantity: 3 });

        let event: FlowEvent = serde_json::from_str(r#"{"type":"back"}"#).unwrap();
        assert_eq!(event, FlowEvent::Back);
    }
}
