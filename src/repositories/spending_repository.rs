use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::query::{distinct_ids, execute, missing_returning_row, query_many, query_single};
use super::{CategoryRepository, DbExecutor};
use crate::error::Result;
use crate::models::{Category, SpendingRecord};

/// Repository for spending records.
#[derive(Clone)]
pub struct SpendingRepository {
    pool: PgPool,
    category_repo: CategoryRepository,
}

impl SpendingRepository {
    pub fn new(pool: PgPool, category_repo: CategoryRepository) -> Self {
        Self {
            pool,
            category_repo,
        }
    }

    #[instrument(name = "db.spending.insert", skip_all, fields(spending = %record.external_id))]
    pub async fn insert(
        &self,
        tx: Option<&mut PgConnection>,
        record: &SpendingRecord,
    ) -> Result<SpendingRecord> {
        let query = sqlx::query_as::<_, SpendingRecord>(
            r#"
            INSERT INTO spending_records (uuid, amount, remark, spending_date, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, uuid, amount, remark, spending_date, category_id,
                      created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(record.external_id)
        .bind(record.amount)
        .bind(&record.remark)
        .bind(record.spending_date)
        .bind(record.category_id)
        .bind(record.created_at)
        .bind(record.updated_at);

        query_single(DbExecutor::new(&self.pool, tx), query)
            .await?
            .ok_or_else(|| missing_returning_row("spending_records"))
    }

    #[instrument(name = "db.spending.get_by_id", skip_all, fields(id = id))]
    pub async fn get_by_id(
        &self,
        tx: Option<&mut PgConnection>,
        id: i64,
    ) -> Result<Option<SpendingRecord>> {
        let query = sqlx::query_as::<_, SpendingRecord>(
            r#"
            SELECT id, uuid, amount, remark, spending_date, category_id,
                   created_at, updated_at, is_deleted, deleted_at
            FROM spending_records
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.spending.get_by_external_id", skip_all, fields(spending = %external_id))]
    pub async fn get_by_external_id(
        &self,
        tx: Option<&mut PgConnection>,
        external_id: Uuid,
    ) -> Result<Option<SpendingRecord>> {
        let query = sqlx::query_as::<_, SpendingRecord>(
            r#"
            SELECT id, uuid, amount, remark, spending_date, category_id,
                   created_at, updated_at, is_deleted, deleted_at
            FROM spending_records
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Active records, most recent spending first.
    #[instrument(name = "db.spending.list", skip_all)]
    pub async fn list(&self, tx: Option<&mut PgConnection>) -> Result<Vec<SpendingRecord>> {
        let query = sqlx::query_as::<_, SpendingRecord>(
            r#"
            SELECT id, uuid, amount, remark, spending_date, category_id,
                   created_at, updated_at, is_deleted, deleted_at
            FROM spending_records
            WHERE is_deleted = FALSE
            ORDER BY spending_date DESC, created_at DESC
            "#,
        );

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Soft-deletes a record. Returns false when no active row matched.
    #[instrument(name = "db.spending.delete", skip_all, fields(spending = %external_id))]
    pub async fn delete(&self, tx: Option<&mut PgConnection>, external_id: Uuid) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE spending_records
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    /// Attaches the owning category. Leaves `category` empty if it was deleted.
    #[instrument(name = "db.spending.load_category", skip_all, fields(spending = %record.external_id))]
    pub async fn load_category(
        &self,
        tx: Option<&mut PgConnection>,
        record: &mut SpendingRecord,
    ) -> Result<()> {
        record.category = self.category_repo.get_by_id(tx, record.category_id).await?;
        Ok(())
    }

    /// Attaches categories to many records with a single lookup.
    #[instrument(name = "db.spending.load_categories", skip_all, fields(count = records.len()))]
    pub async fn load_categories(
        &self,
        tx: Option<&mut PgConnection>,
        records: &mut [SpendingRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let ids = distinct_ids(records.iter().map(|r| r.category_id));
        let categories: HashMap<i64, Category> = self
            .category_repo
            .list_by_ids(tx, &ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        for record in records.iter_mut() {
            record.category = categories.get(&record.category_id).cloned();
        }

        Ok(())
    }
}
