use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::query::{
    execute, group_by_owner, missing_returning_row, order_by_keys, query_many, query_single,
};
use super::DbExecutor;
use crate::error::Result;
use crate::models::ReceiptItem;

/// Repository for receipt lines.
#[derive(Clone)]
pub struct ReceiptItemRepository {
    pool: PgPool,
}

impl ReceiptItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(name = "db.receipt_item.insert", skip_all, fields(item = %item.external_id))]
    pub async fn insert(
        &self,
        tx: Option<&mut PgConnection>,
        item: &ReceiptItem,
    ) -> Result<ReceiptItem> {
        let query = sqlx::query_as::<_, ReceiptItem>(
            r#"
            INSERT INTO receipt_items (uuid, receipt_id, name, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, uuid, receipt_id, name, price, created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(item.external_id)
        .bind(item.receipt_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.created_at)
        .bind(item.updated_at);

        query_single(DbExecutor::new(&self.pool, tx), query)
            .await?
            .ok_or_else(|| missing_returning_row("receipt_items"))
    }

    /// Multi-row insert; the result follows the input order.
    #[instrument(name = "db.receipt_item.insert_many", skip_all, fields(count = items.len()))]
    pub async fn insert_many(
        &self,
        tx: Option<&mut PgConnection>,
        items: &[ReceiptItem],
    ) -> Result<Vec<ReceiptItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO receipt_items (uuid, receipt_id, name, price, created_at, updated_at) ",
        );
        builder.push_values(items, |mut row, item| {
            row.push_bind(item.external_id)
                .push_bind(item.receipt_id)
                .push_bind(&item.name)
                .push_bind(item.price)
                .push_bind(item.created_at)
                .push_bind(item.updated_at);
        });
        builder.push(
            " RETURNING id, uuid, receipt_id, name, price, created_at, updated_at, is_deleted, deleted_at",
        );

        let created = query_many(
            DbExecutor::new(&self.pool, tx),
            builder.build_query_as::<ReceiptItem>(),
        )
        .await?;

        let requested: Vec<Uuid> = items.iter().map(|i| i.external_id).collect();
        Ok(order_by_keys(&requested, created, |i| i.external_id))
    }

    #[instrument(name = "db.receipt_item.get_by_external_id", skip_all, fields(item = %external_id))]
    pub async fn get_by_external_id(
        &self,
        tx: Option<&mut PgConnection>,
        external_id: Uuid,
    ) -> Result<Option<ReceiptItem>> {
        let query = sqlx::query_as::<_, ReceiptItem>(
            r#"
            SELECT id, uuid, receipt_id, name, price, created_at, updated_at, is_deleted, deleted_at
            FROM receipt_items
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Active lines of one receipt in insertion order.
    #[instrument(name = "db.receipt_item.get_by_receipt_id", skip_all, fields(receipt_id = receipt_id))]
    pub async fn get_by_receipt_id(
        &self,
        tx: Option<&mut PgConnection>,
        receipt_id: i64,
    ) -> Result<Vec<ReceiptItem>> {
        let query = sqlx::query_as::<_, ReceiptItem>(
            r#"
            SELECT id, uuid, receipt_id, name, price, created_at, updated_at, is_deleted, deleted_at
            FROM receipt_items
            WHERE receipt_id = $1 AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(receipt_id);

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.receipt_item.get_by_receipt_ids", skip_all, fields(count = receipt_ids.len()))]
    pub async fn get_by_receipt_ids(
        &self,
        tx: Option<&mut PgConnection>,
        receipt_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ReceiptItem>>> {
        if receipt_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = sqlx::query_as::<_, ReceiptItem>(
            r#"
            SELECT id, uuid, receipt_id, name, price, created_at, updated_at, is_deleted, deleted_at
            FROM receipt_items
            WHERE receipt_id = ANY($1) AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(receipt_ids);

        let items = query_many(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(group_by_owner(items, |i| i.receipt_id))
    }

    #[instrument(name = "db.receipt_item.delete", skip_all, fields(item = %external_id))]
    pub async fn delete(&self, tx: Option<&mut PgConnection>, external_id: Uuid) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE receipt_items
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    #[instrument(name = "db.receipt_item.delete_by_receipt_id", skip_all, fields(receipt_id = receipt_id))]
    pub async fn delete_by_receipt_id(
        &self,
        tx: Option<&mut PgConnection>,
        receipt_id: i64,
    ) -> Result<u64> {
        let query = sqlx::query(
            r#"
            UPDATE receipt_items
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE receipt_id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(receipt_id);

        execute(DbExecutor::new(&self.pool, tx), query).await
    }
}
