use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Category;

/// A single spending entry booked against a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingRecord {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub external_id: Uuid,
    pub amount: Decimal,
    pub remark: String,
    pub spending_date: DateTime<Utc>,
    #[serde(skip)]
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Denormalized for responses; filled by the load-category operations, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl SpendingRecord {
    pub fn new(
        amount: Decimal,
        remark: impl Into<String>,
        spending_date: DateTime<Utc>,
        category_id: i64,
    ) -> Self {
        let now = super::now();
        Self {
            id: 0,
            external_id: Uuid::new_v4(),
            amount,
            remark: remark.into(),
            spending_date: super::to_storage_precision(spending_date),
            category_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            category: None,
        }
    }
}
