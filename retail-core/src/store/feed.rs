use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::store::AppliedReturn;

/// Kind of write that produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A committed row change. Subscribers re-fetch the affected list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: String,
    pub kind: ChangeKind,
    pub record_id: Uuid,
}

impl TableChange {
    fn new(table: &str, kind: ChangeKind, record_id: Uuid) -> Self {
        Self {
            table: table.to_string(),
            kind,
            record_id,
        }
    }
}

/// Broadcast channel of table changes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }

    pub fn publish(&self, change: TableChange) {
        // No subscribers is fine.
        if self.sender.send(change).is_err() {
            debug!("No change feed subscribers");
        }
    }

    /// Publishes one notification per row written for a return.
    pub fn publish_applied(&self, applied: &AppliedReturn) {
        self.publish(TableChange::new(
            "product_returns",
            ChangeKind::Insert,
            applied.product_return.id,
        ));

        for entry in &applied.history {
            self.publish(TableChange::new("products", ChangeKind::Update, entry.product_id));
            self.publish(TableChange::new("product_history", ChangeKind::Insert, entry.id));
        }

        if let Some(payment) = &applied.payment {
            self.publish(TableChange::new("payments", ChangeKind::Insert, payment.id));
        }

        if let Some(invoice) = &applied.exchange_invoice {
            self.publish(TableChange::new("invoices", ChangeKind::Insert, invoice.id));
        }
    }

    pub fn publish_return_updated(&self, return_id: Uuid) {
        self.publish(TableChange::new("product_returns", ChangeKind::Update, return_id));
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        let id = Uuid::new_v4();

        feed.publish_return_updated(id);

        let change = rx.recv().await.expect("change should be delivered");
        assert_eq!(change.table, "product_returns");
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.record_id, id);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish_return_updated(Uuid::new_v4());
    }
}
