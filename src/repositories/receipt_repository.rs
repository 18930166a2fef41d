use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::query::{execute, missing_returning_row, query_many, query_single};
use super::{DbExecutor, ReceiptItemRepository};
use crate::error::Result;
use crate::models::Receipt;

/// Repository for receipts and their item collections.
#[derive(Clone)]
pub struct ReceiptRepository {
    pool: PgPool,
    item_repo: ReceiptItemRepository,
}

impl ReceiptRepository {
    pub fn new(pool: PgPool, item_repo: ReceiptItemRepository) -> Self {
        Self { pool, item_repo }
    }

    /// Inserts the receipt row only; items are written by the caller.
    #[instrument(name = "db.receipt.insert", skip_all, fields(receipt = %receipt.external_id))]
    pub async fn insert(&self, tx: Option<&mut PgConnection>, receipt: &Receipt) -> Result<Receipt> {
        let query = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (uuid, store_name, date, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, uuid, store_name, date, total, created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(receipt.external_id)
        .bind(&receipt.store_name)
        .bind(receipt.date)
        .bind(receipt.total)
        .bind(receipt.created_at)
        .bind(receipt.updated_at);

        query_single(DbExecutor::new(&self.pool, tx), query)
            .await?
            .ok_or_else(|| missing_returning_row("receipts"))
    }

    #[instrument(name = "db.receipt.get_by_external_id", skip_all, fields(receipt = %external_id))]
    pub async fn get_by_external_id(
        &self,
        tx: Option<&mut PgConnection>,
        external_id: Uuid,
    ) -> Result<Option<Receipt>> {
        let query = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, uuid, store_name, date, total, created_at, updated_at, is_deleted, deleted_at
            FROM receipts
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Active receipts, newest first.
    #[instrument(name = "db.receipt.list", skip_all)]
    pub async fn list(&self, tx: Option<&mut PgConnection>) -> Result<Vec<Receipt>> {
        let query = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, uuid, store_name, date, total, created_at, updated_at, is_deleted, deleted_at
            FROM receipts
            WHERE is_deleted = FALSE
            ORDER BY date DESC, created_at DESC
            "#,
        );

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.receipt.delete", skip_all, fields(receipt = %external_id))]
    pub async fn delete(&self, tx: Option<&mut PgConnection>, external_id: Uuid) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE receipts
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    #[instrument(name = "db.receipt.load_items", skip_all, fields(receipt = %receipt.external_id))]
    pub async fn load_items(
        &self,
        tx: Option<&mut PgConnection>,
        receipt: &mut Receipt,
    ) -> Result<()> {
        receipt.items = self.item_repo.get_by_receipt_id(tx, receipt.id).await?;
        Ok(())
    }

    /// Attaches items to many receipts with a single query.
    #[instrument(name = "db.receipt.load_items_for_many", skip_all, fields(count = receipts.len()))]
    pub async fn load_items_for_many(
        &self,
        tx: Option<&mut PgConnection>,
        receipts: &mut [Receipt],
    ) -> Result<()> {
        if receipts.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = receipts.iter().map(|r| r.id).collect();
        let mut items_by_receipt = self.item_repo.get_by_receipt_ids(tx, &ids).await?;

        for receipt in receipts.iter_mut() {
            receipt.items = items_by_receipt.remove(&receipt.id).unwrap_or_default();
        }

        Ok(())
    }
}
