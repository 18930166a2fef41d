//! Row-to-entity mapping. Column `uuid` carries the external id.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::models::{Category, Receipt, ReceiptItem, SpendingRecord, Store};

impl<'r> FromRow<'r, PgRow> for Category {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("uuid")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            stores: Vec::new(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Store {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("uuid")?,
            name: row.try_get("name")?,
            category_id: row.try_get("category_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for SpendingRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("uuid")?,
            amount: row.try_get("amount")?,
            remark: row.try_get("remark")?,
            spending_date: row.try_get("spending_date")?,
            category_id: row.try_get("category_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            category: None,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Receipt {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("uuid")?,
            store_name: row.try_get("store_name")?,
            date: row.try_get("date")?,
            total: row.try_get("total")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            items: Vec::new(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ReceiptItem {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("uuid")?,
            receipt_id: row.try_get("receipt_id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}
