use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::invoice::NewExchangeInvoice;
use crate::models::payment::NewPayment;
use crate::models::product::StockChange;
use crate::models::product_return::{NewProductReturn, ReturnStatus};
use crate::models::{Customer, Invoice, InvoiceItem, Payment, Product, ProductHistory, ProductReturn};
use crate::store::{AppliedReturn, ChangeFeed, ReturnPlan, Store, StoreError};

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    /// Database connection pool
    pool: PgPool,

    feed: ChangeFeed,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::default(),
        }
    }
}

/// Wraps a search term for `ILIKE`, escaping the pattern metacharacters.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn search_customers(&self, term: &str, limit: i64) -> Result<Vec<Customer>, StoreError> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, created_at
            FROM customers
            WHERE name ILIKE $1
                OR phone ILIKE $1
                OR email ILIKE $1
            ORDER BY name ASC
            LIMIT $2
            "#,
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, phone, email, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn sales_invoices_with_items(&self, customer_id: Uuid) -> Result<Vec<Invoice>, StoreError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT
                i.id, i.invoice_number, i.customer_id, i.total_amount,
                i.status, i.invoice_type, i.notes, i.created_at
            FROM invoices i
            WHERE i.customer_id = $1
                AND i.invoice_type = 'sales'
                AND EXISTS (SELECT 1 FROM invoice_items ii WHERE ii.invoice_id = i.id)
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT
                id, invoice_number, customer_id, total_amount,
                status, invoice_type, notes, created_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    async fn invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, product_id, product_name, quantity, unit_price
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY product_name ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn returned_quantities(&self, invoice_id: Uuid) -> Result<HashMap<Uuid, i32>, StoreError> {
        let rows: Vec<(Uuid, i32)> = sqlx::query_as(
            r#"
            SELECT product_id, COALESCE(SUM(quantity), 0)::INT4
            FROM product_returns
            WHERE invoice_id = $1
            GROUP BY product_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, quantity, selling_price FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn search_products(&self, term: &str, limit: i64) -> Result<Vec<Product>, StoreError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, quantity, selling_price
            FROM products
            WHERE name ILIKE $1
            ORDER BY name ASC
            LIMIT $2
            "#,
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn apply_return(&self, plan: &ReturnPlan) -> Result<AppliedReturn, StoreError> {
        // All writes share one transaction; dropping it on error rolls back.
        let mut tx = self.pool.begin().await?;

        check_returnable(&mut tx, plan).await?;

        let product_return = insert_return(&mut tx, &plan.product_return).await?;

        let mut history = Vec::with_capacity(plan.stock_changes.len());
        for change in &plan.stock_changes {
            apply_stock_change(&mut tx, change).await?;
            history.push(insert_history(&mut tx, change).await?);
        }

        let payment = match &plan.payment {
            Some(payment) => Some(insert_payment(&mut tx, payment).await?),
            None => None,
        };

        let exchange_invoice = match &plan.exchange_invoice {
            Some(invoice) => Some(insert_exchange_invoice(&mut tx, invoice).await?),
            None => None,
        };

        tx.commit().await?;

        info!(
            "Applied return {} for invoice {} ({} stock change(s))",
            product_return.id,
            plan.invoice_number,
            history.len()
        );

        let applied = AppliedReturn {
            product_return,
            history,
            payment,
            exchange_invoice,
        };
        self.feed.publish_applied(&applied);

        Ok(applied)
    }

    async fn get_return(&self, id: Uuid) -> Result<Option<ProductReturn>, StoreError> {
        let record = sqlx::query_as::<_, ProductReturn>(
            r#"
            SELECT
                id, invoice_id, product_id, customer_id, quantity, reason,
                return_type, status, refund_amount, exchange_product_id,
                price_difference, payment_method, condition, return_fees,
                admin_notes, total_amount, created_at
            FROM product_returns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_returns(&self, status: Option<ReturnStatus>) -> Result<Vec<ProductReturn>, StoreError> {
        let records = sqlx::query_as::<_, ProductReturn>(
            r#"
            SELECT
                id, invoice_id, product_id, customer_id, quantity, reason,
                return_type, status, refund_amount, exchange_product_id,
                price_difference, payment_method, condition, return_fees,
                admin_notes, total_amount, created_at
            FROM product_returns
            WHERE $1::VARCHAR IS NULL OR status = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn update_return_status(
        &self,
        id: Uuid,
        from: ReturnStatus,
        to: ReturnStatus,
        admin_notes: Option<&str>,
    ) -> Result<ProductReturn, StoreError> {
        let updated = sqlx::query_as::<_, ProductReturn>(
            r#"
            UPDATE product_returns
            SET
                status = $3,
                admin_notes = COALESCE($4, admin_notes)
            WHERE id = $1 AND status = $2
            RETURNING
                id, invoice_id, product_id, customer_id, quantity, reason,
                return_type, status, refund_amount, exchange_product_id,
                price_difference, payment_method, condition, return_fees,
                admin_notes, total_amount, created_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(admin_notes)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(record) => {
                self.feed.publish_return_updated(id);
                Ok(record)
            }
            None => {
                warn!("Status update for return {} found no row in state {}", id, from);
                Err(StoreError::Conflict(format!(
                    "Return {} is no longer {}",
                    id, from
                )))
            }
        }
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }
}

/// Locks the invoice line and re-checks the returnable quantity.
async fn check_returnable(
    tx: &mut Transaction<'_, Postgres>,
    plan: &ReturnPlan,
) -> Result<(), StoreError> {
    let new_return = &plan.product_return;

    let original: Option<i32> = sqlx::query_scalar(
        "SELECT quantity FROM invoice_items WHERE id = $1 AND invoice_id = $2 FOR UPDATE",
    )
    .bind(new_return.invoice_item_id)
    .bind(new_return.invoice_id)
    .fetch_optional(&mut **tx)
    .await?;

    let original = original.ok_or_else(|| StoreError::NotFound("Invoice item not found".to_string()))?;

    let returned: i32 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(quantity), 0)::INT4
        FROM product_returns
        WHERE invoice_id = $1 AND product_id = $2
        "#,
    )
    .bind(new_return.invoice_id)
    .bind(new_return.product_id)
    .fetch_one(&mut **tx)
    .await?;

    let remaining = original - returned;
    if new_return.quantity > remaining {
        return Err(StoreError::Conflict(format!(
            "Only {} unit(s) remain returnable on invoice {}",
            remaining.max(0),
            plan.invoice_number
        )));
    }

    Ok(())
}

async fn insert_return(
    tx: &mut Transaction<'_, Postgres>,
    new_return: &NewProductReturn,
) -> Result<ProductReturn, StoreError> {
    let record = sqlx::query_as::<_, ProductReturn>(
        r#"
        INSERT INTO product_returns (
            id, invoice_id, product_id, customer_id, quantity, reason,
            return_type, status, refund_amount, exchange_product_id,
            price_difference, payment_method, condition, return_fees,
            admin_notes, total_amount
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
        )
        RETURNING
            id, invoice_id, product_id, customer_id, quantity, reason,
            return_type, status, refund_amount, exchange_product_id,
            price_difference, payment_method, condition, return_fees,
            admin_notes, total_amount, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_return.invoice_id)
    .bind(new_return.product_id)
    .bind(new_return.customer_id)
    .bind(new_return.quantity)
    .bind(&new_return.reason)
    .bind(new_return.return_type)
    .bind(ReturnStatus::Pending)
    .bind(new_return.refund_amount)
    .bind(new_return.exchange_product_id)
    .bind(new_return.price_difference)
    .bind(new_return.payment_method)
    .bind(new_return.condition)
    .bind(new_return.return_fees)
    .bind(&new_return.admin_notes)
    .bind(new_return.total_amount)
    .fetch_one(&mut **tx)
    .await?;

    Ok(record)
}

/// Applies a signed stock change, refusing to go below zero.
async fn apply_stock_change(
    tx: &mut Transaction<'_, Postgres>,
    change: &StockChange,
) -> Result<(), StoreError> {
    let updated: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET quantity = quantity + $2
        WHERE id = $1 AND quantity + $2 >= 0
        RETURNING quantity
        "#,
    )
    .bind(change.product_id)
    .bind(change.delta)
    .fetch_optional(&mut **tx)
    .await?;

    match updated {
        Some(_) => Ok(()),
        None => Err(StoreError::Conflict(format!(
            "Insufficient stock for {}",
            change.product_name
        ))),
    }
}

async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    change: &StockChange,
) -> Result<ProductHistory, StoreError> {
    let entry = sqlx::query_as::<_, ProductHistory>(
        r#"
        INSERT INTO product_history (id, product_id, quantity, action_type, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, product_id, quantity, action_type, notes, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(change.product_id)
    .bind(change.delta.abs())
    .bind(change.action)
    .bind(&change.notes)
    .fetch_one(&mut **tx)
    .await?;

    Ok(entry)
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &NewPayment,
) -> Result<Payment, StoreError> {
    let record = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, invoice_id, amount, payment_method, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, invoice_id, amount, payment_method, notes, payment_date
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payment.invoice_id)
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(&payment.notes)
    .fetch_one(&mut **tx)
    .await?;

    Ok(record)
}

async fn insert_exchange_invoice(
    tx: &mut Transaction<'_, Postgres>,
    new_invoice: &NewExchangeInvoice,
) -> Result<Invoice, StoreError> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            id, invoice_number, customer_id, total_amount, status, invoice_type, notes
        ) VALUES (
            $1, $2, $3, $4, 'pending', 'exchange', $5
        )
        RETURNING
            id, invoice_number, customer_id, total_amount,
            status, invoice_type, notes, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new_invoice.invoice_number)
    .bind(new_invoice.customer_id)
    .bind(new_invoice.total_amount)
    .bind(&new_invoice.notes)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO invoice_items (id, invoice_id, product_id, product_name, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(invoice.id)
    .bind(new_invoice.product_id)
    .bind(&new_invoice.product_name)
    .bind(new_invoice.quantity)
    .bind(new_invoice.unit_price)
    .execute(&mut **tx)
    .await?;

    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bulb"), "%bulb%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    /// Test helper to create a test database pool.
    ///
    /// Needs DATABASE_URL pointing at a migrated database.
    async fn create_test_store() -> Result<PgStore, anyhow::Error> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL not set for tests"))?;

        let pool = PgPool::connect(&database_url).await?;
        Ok(PgStore::new(pool))
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_returned_quantities_empty_for_unknown_invoice() {
        let store = create_test_store().await.expect("Failed to create test store");

        let returned = store
            .returned_quantities(Uuid::new_v4())
            .await
            .expect("Query should succeed");

        assert!(returned.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_apply_return_rejects_unknown_line() {
        use crate::models::product_return::{ItemCondition, ReturnType};
        use rust_decimal::Decimal;

        let store = create_test_store().await.expect("Failed to create test store");

        let plan = ReturnPlan {
            invoice_number: "INV-MISSING".to_string(),
            product_return: NewProductReturn {
                invoice_id: Uuid::new_v4(),
                invoice_item_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                customer_id: None,
                quantity: 1,
                reason: "No reason provided".to_string(),
                return_type: ReturnType::Refund,
                refund_amount: Decimal::ONE,
                exchange_product_id: None,
                price_difference: Decimal::ZERO,
                payment_method: None,
                condition: ItemCondition::Good,
                return_fees: Decimal::ZERO,
                admin_notes: "No admin notes".to_string(),
                total_amount: Decimal::ONE,
            },
            stock_changes: Vec::new(),
            payment: None,
            exchange_invoice: None,
        };

        let err = store.apply_return(&plan).await.expect_err("Unknown line must fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
