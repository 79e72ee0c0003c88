use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Customer, Invoice, Product};
use crate::store::Store;

/// Shortest search term that triggers a lookup.
pub const MIN_SEARCH_CHARS: usize = 2;

/// Most results a search returns.
pub const SEARCH_LIMIT: i64 = 10;

/// Trimmed search term, or `None` if it is too short to search with.
fn search_term(raw: &str) -> Option<&str> {
    let term = raw.trim();
    (term.chars().count() >= MIN_SEARCH_CHARS).then_some(term)
}

/// Finds customers whose name, phone or email contains `raw`.
///
/// Terms shorter than [`MIN_SEARCH_CHARS`] return no candidates without
/// querying the store.
pub async fn search_customers(store: &dyn Store, raw: &str) -> Result<Vec<Customer>, AppError> {
    let Some(term) = search_term(raw) else {
        return Ok(Vec::new());
    };

    let customers = store.search_customers(term, SEARCH_LIMIT).await?;
    info!("Customer search '{}' matched {} customer(s)", term, customers.len());
    Ok(customers)
}

/// Lists a customer's sales invoices that have at least one item, newest
/// first.
pub async fn customer_invoices(store: &dyn Store, customer_id: Uuid) -> Result<Vec<Invoice>, AppError> {
    store
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;

    let invoices = store.sales_invoices_with_items(customer_id).await?;
    info!(
        "Customer {} has {} returnable invoice(s)",
        customer_id,
        invoices.len()
    );
    Ok(invoices)
}

/// Finds candidate replacement products for an exchange.
pub async fn search_products(store: &dyn Store, raw: &str) -> Result<Vec<Product>, AppError> {
    let Some(term) = search_term(raw) else {
        return Ok(Vec::new());
    };

    Ok(store.search_products(term, SEARCH_LIMIT).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{InvoiceItem, InvoiceStatus, InvoiceType};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn customer(name: &str, phone: &str, email: &str) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: Some(phone.to_string()),
            email: Some(email.to_string()),
            created_at: Utc::now(),
        }
    }

    fn invoice(number: &str, customer_id: Uuid, invoice_type: InvoiceType, age_days: i64) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: number.to_string(),
            customer_id: Some(customer_id),
            total_amount: dec!(10.00),
            status: InvoiceStatus::Paid,
            invoice_type,
            notes: None,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn item(invoice_id: Uuid) -> InvoiceItem {
        InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id,
            product_id: Uuid::new_v4(),
            product_name: "Bulb-9W".to_string(),
            quantity: 2,
            unit_price: dec!(5.00),
        }
    }

    #[tokio::test]
    async fn test_short_terms_do_not_search() {
        let store = MemoryStore::new();
        store.insert_customer(customer("Asha", "555-0101", "asha@example.com"));

        assert!(search_customers(&store, "a").await.unwrap().is_empty());
        assert!(search_customers(&store, "  a  ").await.unwrap().is_empty());
        assert_eq!(search_customers(&store, "as").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_name_phone_or_email() {
        let store = MemoryStore::new();
        store.insert_customer(customer("Asha Rao", "555-0101", "asha@example.com"));
        store.insert_customer(customer("Bilal Khan", "555-0202", "bk@shop.test"));

        let by_name = search_customers(&store, "RAO").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Asha Rao");

        let by_phone = search_customers(&store, "0202").await.unwrap();
        assert_eq!(by_phone[0].name, "Bilal Khan");

        let by_email = search_customers(&store, "shop.test").await.unwrap();
        assert_eq!(by_email[0].name, "Bilal Khan");

        assert_eq!(search_customers(&store, "555").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_is_capped() {
        let store = MemoryStore::new();
        for n in 0..15 {
            store.insert_customer(customer(&format!("Customer {:02}", n), "555", "c@example.com"));
        }

        let found = search_customers(&store, "customer").await.unwrap();
        assert_eq!(found.len(), SEARCH_LIMIT as usize);
    }

    #[tokio::test]
    async fn test_customer_invoices_filters_and_orders() {
        let store = MemoryStore::new();
        let buyer = customer("Asha", "555", "asha@example.com");
        let buyer_id = buyer.id;
        store.insert_customer(buyer);

        let older = invoice("INV-001", buyer_id, InvoiceType::Sales, 10);
        let newer = invoice("INV-002", buyer_id, InvoiceType::Sales, 1);
        let empty = invoice("INV-003", buyer_id, InvoiceType::Sales, 0);
        let exchange = invoice("EXC-INV-001-1", buyer_id, InvoiceType::Exchange, 0);

        store.insert_invoice(older.clone(), vec![item(older.id)]);
        store.insert_invoice(newer.clone(), vec![item(newer.id)]);
        store.insert_invoice(empty, Vec::new());
        store.insert_invoice(exchange.clone(), vec![item(exchange.id)]);

        let invoices = customer_invoices(&store, buyer_id).await.unwrap();
        let numbers: Vec<&str> = invoices.iter().map(|i| i.invoice_number.as_str()).collect();

        assert_eq!(numbers, vec!["INV-002", "INV-001"]);
    }

    #[tokio::test]
    async fn test_customer_invoices_unknown_customer() {
        let store = MemoryStore::new();

        let err = customer_invoices(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
