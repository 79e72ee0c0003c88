use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer model representing a buyer.
///
/// Maps to the `customers` table. Customers are created at sale time and
/// are only ever read by the return workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    /// Unique identifier for the customer
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Contact phone number
    pub phone: Option<String>,

    /// Contact email address
    pub email: Option<String>,

    /// Timestamp when the customer was created
    pub created_at: DateTime<Utc>,
}
