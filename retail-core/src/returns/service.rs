use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invoice::InvoiceType;
use crate::models::product_return::{ReturnStatus, ReturnType};
use crate::models::{Product, ProductReturn};
use crate::returns::reconcile::{self, returnable_lines};
use crate::returns::submit::plan_return;
use crate::returns::types::{
    ReturnQuote, ReturnSelection, ReturnableInvoice, ReturnableLine, SubmitReturnRequest,
    SubmitReturnResponse, UpdateReturnStatus,
};
use crate::store::Store;

/// Shown when prior returns could not be read because of a schema mismatch.
pub const MIGRATION_PENDING_NOTICE: &str =
    "Return history could not be loaded; a database migration may be pending. \
     This invoice is treated as having no prior returns.";

/// A request resolved against the store and validated.
#[derive(Debug, Clone)]
struct QuotedReturn {
    returnable: ReturnableInvoice,
    line: ReturnableLine,
    exchange_product: Option<Product>,
    quote: ReturnQuote,
}

/// Runs the return workflow against a [`Store`].
///
/// Holds no per-operator state; the flow state lives with the caller.
#[derive(Clone)]
pub struct ReturnService {
    store: Arc<dyn Store>,
}

impl ReturnService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Loads a sales invoice with its still-returnable lines.
    ///
    /// A missing-column error while reading prior returns is not fatal: the
    /// invoice is treated as having no returns and a notice is attached.
    pub async fn load_returnable(&self, invoice_id: Uuid) -> Result<ReturnableInvoice, AppError> {
        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))?;

        if invoice.invoice_type != InvoiceType::Sales {
            warn!(
                "Rejected return lookup on {:?} invoice {}",
                invoice.invoice_type, invoice.invoice_number
            );
            return Err(AppError::validation(format!(
                "Invoice {} is not a sales invoice and cannot be returned against",
                invoice.invoice_number
            )));
        }

        let items = self.store.invoice_items(invoice_id).await?;

        let (returned, notice) = match self.store.returned_quantities(invoice_id).await {
            Ok(returned) => (returned, None),
            Err(e) if e.is_schema_drift() => {
                warn!(
                    "Prior returns unavailable for invoice {}: {}",
                    invoice.invoice_number, e
                );
                (HashMap::new(), Some(MIGRATION_PENDING_NOTICE.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let lines = returnable_lines(&items, &returned);
        info!(
            "Invoice {}: {} of {} line(s) returnable",
            invoice.invoice_number,
            lines.len(),
            items.len()
        );

        Ok(ReturnableInvoice {
            invoice,
            lines,
            notice,
        })
    }

    async fn resolve(&self, request: &SubmitReturnRequest) -> Result<QuotedReturn, AppError> {
        let returnable = self.load_returnable(request.invoice_id).await?;

        let line = request
            .invoice_item_id
            .and_then(|id| returnable.lines.iter().find(|l| l.invoice_item_id == id))
            .cloned();

        let exchange_product = match (request.return_type, request.exchange_product_id) {
            (ReturnType::Exchange, Some(product_id)) => Some(
                self.store
                    .get_product(product_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Exchange product"))?,
            ),
            _ => None,
        };

        let selection = ReturnSelection {
            quantity: request.quantity,
            return_type: request.return_type,
            return_fees: request.return_fees.unwrap_or_default(),
        };
        let quote = reconcile::quote(line.as_ref(), &selection, exchange_product.as_ref())?;

        // quote() only succeeds with a line selected.
        let line = line.ok_or_else(|| AppError::validation("Please select an item to return"))?;

        Ok(QuotedReturn {
            returnable,
            line,
            exchange_product,
            quote,
        })
    }

    /// Validates a request and reports its outcome without writing.
    pub async fn quote(&self, request: &SubmitReturnRequest) -> Result<ReturnQuote, AppError> {
        Ok(self.resolve(request).await?.quote)
    }

    /// Validates and applies a return in one atomic store write.
    ///
    /// Submissions are not deduplicated: sending the same request twice
    /// records two returns.
    pub async fn submit(&self, request: &SubmitReturnRequest) -> Result<SubmitReturnResponse, AppError> {
        let resolved = self.resolve(request).await?;

        let plan = plan_return(
            &resolved.returnable.invoice,
            &resolved.line,
            request,
            &resolved.quote,
            resolved.exchange_product.as_ref(),
        );
        let applied = self.store.apply_return(&plan).await?;

        info!(
            "Recorded {:?} return {} of {} x {} on invoice {}",
            applied.product_return.return_type,
            applied.product_return.id,
            applied.product_return.quantity,
            resolved.line.product_name,
            resolved.returnable.invoice.invoice_number
        );

        Ok(SubmitReturnResponse {
            product_return: applied.product_return,
            quote: resolved.quote,
            history: applied.history,
            payment: applied.payment,
            exchange_invoice: applied.exchange_invoice,
        })
    }

    pub async fn get_return(&self, id: Uuid) -> Result<ProductReturn, AppError> {
        self.store
            .get_return(id)
            .await?
            .ok_or_else(|| AppError::not_found("Return"))
    }

    pub async fn list_returns(&self, status: Option<ReturnStatus>) -> Result<Vec<ProductReturn>, AppError> {
        Ok(self.store.list_returns(status).await?)
    }

    /// Applies a review decision. Inventory is not touched.
    pub async fn review(&self, id: Uuid, update: &UpdateReturnStatus) -> Result<ProductReturn, AppError> {
        let current = self.get_return(id).await?;

        if !current.status.can_transition_to(update.status) {
            return Err(AppError::invalid_transition(format!(
                "Cannot move a {} return to {}",
                current.status, update.status
            )));
        }

        let admin_notes = update
            .admin_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty());

        let updated = self
            .store
            .update_return_status(id, current.status, update.status, admin_notes)
            .await?;

        info!("Return {}: {} -> {}", id, current.status, updated.status);
        Ok(updated)
    }
}
