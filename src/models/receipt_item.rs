use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub external_id: Uuid,
    #[serde(skip)]
    pub receipt_id: i64,
    pub name: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ReceiptItem {
    pub fn new(receipt_id: i64, name: impl Into<String>, price: Decimal) -> Self {
        let now = super::now();
        Self {
            id: 0,
            external_id: Uuid::new_v4(),
            receipt_id,
            name: name.into(),
            price,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_receipt_item_creation() {
        let item = ReceiptItem::new(5, "Coffee", dec!(3.20));

        assert_eq!(item.receipt_id, 5);
        assert_eq!(item.name, "Coffee");
        assert_eq!(item.price, dec!(3.20));
        assert!(!item.is_deleted);
    }
}
