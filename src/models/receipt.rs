use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReceiptItem;

/// A receipt, either entered manually or produced by text extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub external_id: Uuid,
    pub store_name: String,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Ordered by insertion; populated by the load-items operations.
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

impl Receipt {
    pub fn new(store_name: impl Into<String>, total: Decimal, date: DateTime<Utc>) -> Self {
        let now = super::now();
        Self {
            id: 0,
            external_id: Uuid::new_v4(),
            store_name: store_name.into(),
            date: super::to_storage_precision(date),
            total,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            items: Vec::new(),
        }
    }

    /// Sum of the loaded item prices.
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }
}
