use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::invoice::{InvoiceStatus, InvoiceType};
use crate::models::product_return::ReturnStatus;
use crate::models::{Customer, Invoice, InvoiceItem, Payment, Product, ProductHistory, ProductReturn};
use crate::store::{AppliedReturn, ChangeFeed, ReturnPlan, Store, StoreError};

#[derive(Debug, Default)]
struct Tables {
    customers: Vec<Customer>,
    invoices: Vec<Invoice>,
    invoice_items: Vec<InvoiceItem>,
    products: Vec<Product>,
    returns: Vec<ProductReturn>,
    history: Vec<ProductHistory>,
    payments: Vec<Payment>,
    missing_return_columns: bool,
}

impl Tables {
    fn returned_for(&self, invoice_id: Uuid, product_id: Uuid) -> i32 {
        self.returns
            .iter()
            .filter(|r| r.invoice_id == invoice_id && r.product_id == product_id)
            .map(|r| r.quantity)
            .sum()
    }
}

/// In-process store holding every table behind one mutex.
///
/// Each [`Store::apply_return`] runs inside a single critical section, so a
/// rejected plan leaves no rows behind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.lock().customers.push(customer);
    }

    pub fn insert_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    pub fn insert_invoice(&self, invoice: Invoice, items: Vec<InvoiceItem>) {
        let mut tables = self.lock();
        tables.invoices.push(invoice);
        tables.invoice_items.extend(items);
    }

    /// Makes return-history lookups fail the way a database without the
    /// `product_returns` columns does.
    pub fn simulate_missing_return_columns(&self, missing: bool) {
        self.lock().missing_return_columns = missing;
    }

    pub fn product(&self, id: Uuid) -> Option<Product> {
        self.lock().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.lock().payments.clone()
    }

    pub fn history(&self) -> Vec<ProductHistory> {
        self.lock().history.clone()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.lock().invoices.clone()
    }

    pub fn invoice_items_snapshot(&self) -> Vec<InvoiceItem> {
        self.lock().invoice_items.clone()
    }

    pub fn returns(&self) -> Vec<ProductReturn> {
        self.lock().returns.clone()
    }
}

fn matches_term(value: Option<&str>, needle: &str) -> bool {
    value.map_or(false, |v| v.to_lowercase().contains(needle))
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn search_customers(&self, term: &str, limit: i64) -> Result<Vec<Customer>, StoreError> {
        let needle = term.to_lowercase();
        let tables = self.lock();
        let mut found: Vec<Customer> = tables
            .customers
            .iter()
            .filter(|c| {
                matches_term(Some(&c.name), &needle)
                    || matches_term(c.phone.as_deref(), &needle)
                    || matches_term(c.email.as_deref(), &needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.lock().customers.iter().find(|c| c.id == id).cloned())
    }

    async fn sales_invoices_with_items(&self, customer_id: Uuid) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.lock();
        let mut found: Vec<Invoice> = tables
            .invoices
            .iter()
            .filter(|i| i.customer_id == Some(customer_id) && i.invoice_type == InvoiceType::Sales)
            .filter(|i| tables.invoice_items.iter().any(|item| item.invoice_id == i.id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        Ok(self.lock().invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError> {
        Ok(self
            .lock()
            .invoice_items
            .iter()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn returned_quantities(&self, invoice_id: Uuid) -> Result<HashMap<Uuid, i32>, StoreError> {
        let tables = self.lock();
        if tables.missing_return_columns {
            return Err(StoreError::backend(
                "column product_returns.product_id does not exist",
            ));
        }

        let mut returned = HashMap::new();
        for r in tables.returns.iter().filter(|r| r.invoice_id == invoice_id) {
            *returned.entry(r.product_id).or_insert(0) += r.quantity;
        }
        Ok(returned)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.product(id))
    }

    async fn search_products(&self, term: &str, limit: i64) -> Result<Vec<Product>, StoreError> {
        let needle = term.to_lowercase();
        let mut found: Vec<Product> = self
            .lock()
            .products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn apply_return(&self, plan: &ReturnPlan) -> Result<AppliedReturn, StoreError> {
        let applied = {
            let mut tables = self.lock();
            let new_return = &plan.product_return;

            let item = tables
                .invoice_items
                .iter()
                .find(|item| {
                    item.id == new_return.invoice_item_id && item.invoice_id == new_return.invoice_id
                })
                .ok_or_else(|| StoreError::NotFound("Invoice item not found".to_string()))?;

            let remaining = item.quantity - tables.returned_for(new_return.invoice_id, new_return.product_id);
            if new_return.quantity > remaining {
                return Err(StoreError::Conflict(format!(
                    "Only {} unit(s) remain returnable on invoice {}",
                    remaining.max(0),
                    plan.invoice_number
                )));
            }

            // Validate every stock change, in order, before touching anything.
            let mut projected: HashMap<Uuid, i32> = HashMap::new();
            for change in &plan.stock_changes {
                let product = tables
                    .products
                    .iter()
                    .find(|p| p.id == change.product_id)
                    .ok_or_else(|| StoreError::NotFound(format!("Product {} not found", change.product_name)))?;
                let on_hand = projected.entry(product.id).or_insert(product.quantity);
                *on_hand += change.delta;
                if *on_hand < 0 {
                    return Err(StoreError::Conflict(format!(
                        "Insufficient stock for {}",
                        change.product_name
                    )));
                }
            }

            let now = Utc::now();
            let product_return = ProductReturn {
                id: Uuid::new_v4(),
                invoice_id: new_return.invoice_id,
                product_id: new_return.product_id,
                customer_id: new_return.customer_id,
                quantity: new_return.quantity,
                reason: new_return.reason.clone(),
                return_type: new_return.return_type,
                status: ReturnStatus::Pending,
                refund_amount: new_return.refund_amount,
                exchange_product_id: new_return.exchange_product_id,
                price_difference: new_return.price_difference,
                payment_method: new_return.payment_method,
                condition: new_return.condition,
                return_fees: new_return.return_fees,
                admin_notes: new_return.admin_notes.clone(),
                total_amount: new_return.total_amount,
                created_at: now,
            };
            tables.returns.push(product_return.clone());

            let mut history = Vec::with_capacity(plan.stock_changes.len());
            for change in &plan.stock_changes {
                if let Some(product) = tables.products.iter_mut().find(|p| p.id == change.product_id) {
                    product.quantity += change.delta;
                }
                let entry = ProductHistory {
                    id: Uuid::new_v4(),
                    product_id: change.product_id,
                    quantity: change.delta.abs(),
                    action_type: change.action,
                    notes: change.notes.clone(),
                    created_at: now,
                };
                tables.history.push(entry.clone());
                history.push(entry);
            }

            let payment = plan.payment.as_ref().map(|p| Payment {
                id: Uuid::new_v4(),
                invoice_id: p.invoice_id,
                amount: p.amount,
                payment_method: p.payment_method,
                notes: p.notes.clone(),
                payment_date: now,
            });
            if let Some(payment) = &payment {
                tables.payments.push(payment.clone());
            }

            let exchange_invoice = plan.exchange_invoice.as_ref().map(|new_invoice| {
                let invoice = Invoice {
                    id: Uuid::new_v4(),
                    invoice_number: new_invoice.invoice_number.clone(),
                    customer_id: new_invoice.customer_id,
                    total_amount: new_invoice.total_amount,
                    status: InvoiceStatus::Pending,
                    invoice_type: InvoiceType::Exchange,
                    notes: Some(new_invoice.notes.clone()),
                    created_at: now,
                };
                let item = InvoiceItem {
                    id: Uuid::new_v4(),
                    invoice_id: invoice.id,
                    product_id: new_invoice.product_id,
                    product_name: new_invoice.product_name.clone(),
                    quantity: new_invoice.quantity,
                    unit_price: new_invoice.unit_price,
                };
                (invoice, item)
            });
            let exchange_invoice = exchange_invoice.map(|(invoice, item)| {
                tables.invoices.push(invoice.clone());
                tables.invoice_items.push(item);
                invoice
            });

            AppliedReturn {
                product_return,
                history,
                payment,
                exchange_invoice,
            }
        };

        self.feed.publish_applied(&applied);
        Ok(applied)
    }

    async fn get_return(&self, id: Uuid) -> Result<Option<ProductReturn>, StoreError> {
        Ok(self.lock().returns.iter().find(|r| r.id == id).cloned())
    }

    async fn list_returns(&self, status: Option<ReturnStatus>) -> Result<Vec<ProductReturn>, StoreError> {
        let mut found: Vec<ProductReturn> = self
            .lock()
            .returns
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_return_status(
        &self,
        id: Uuid,
        from: ReturnStatus,
        to: ReturnStatus,
        admin_notes: Option<&str>,
    ) -> Result<ProductReturn, StoreError> {
        let updated = {
            let mut tables = self.lock();
            let record = tables
                .returns
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("Return {} not found", id)))?;
            if record.status != from {
                return Err(StoreError::Conflict(format!(
                    "Return {} is {}, expected {}",
                    id, record.status, from
                )));
            }
            record.status = to;
            if let Some(notes) = admin_notes {
                record.admin_notes = notes.to_string();
            }
            record.clone()
        };

        self.feed.publish_return_updated(id);
        Ok(updated)
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }
}
