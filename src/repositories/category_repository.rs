use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::query::{execute, missing_returning_row, query_many, query_single};
use super::{DbExecutor, StoreRepository};
use crate::error::Result;
use crate::models::Category;

/// Repository for Category persistence and store loading.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
    store_repo: StoreRepository,
}

impl CategoryRepository {
    pub fn new(pool: PgPool, store_repo: StoreRepository) -> Self {
        Self { pool, store_repo }
    }

    /// Inserts a category and returns the stored row.
    #[instrument(name = "db.category.insert", skip_all, fields(category = %category.external_id))]
    pub async fn insert(
        &self,
        tx: Option<&mut PgConnection>,
        category: &Category,
    ) -> Result<Category> {
        let query = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (uuid, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(category.external_id)
        .bind(&category.name)
        .bind(category.created_at)
        .bind(category.updated_at);

        query_single(DbExecutor::new(&self.pool, tx), query)
            .await?
            .ok_or_else(|| missing_returning_row("categories"))
    }

    /// Soft-deletes a category. Returns false when no active row matched.
    #[instrument(name = "db.category.delete", skip_all, fields(category = %external_id))]
    pub async fn delete(&self, tx: Option<&mut PgConnection>, external_id: Uuid) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE categories
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    #[instrument(name = "db.category.get_by_id", skip_all, fields(id = id))]
    pub async fn get_by_id(&self, tx: Option<&mut PgConnection>, id: i64) -> Result<Option<Category>> {
        let query = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            FROM categories
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.category.get_by_external_id", skip_all, fields(category = %external_id))]
    pub async fn get_by_external_id(
        &self,
        tx: Option<&mut PgConnection>,
        external_id: Uuid,
    ) -> Result<Option<Category>> {
        let query = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            FROM categories
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Uniqueness probe: the active category holding `name`, if any.
    #[instrument(name = "db.category.get_by_name", skip_all)]
    pub async fn get_by_name(
        &self,
        tx: Option<&mut PgConnection>,
        name: &str,
    ) -> Result<Option<Category>> {
        let query = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            FROM categories
            WHERE name = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(name);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Lists active categories ordered by name.
    #[instrument(name = "db.category.list", skip_all)]
    pub async fn list(&self, tx: Option<&mut PgConnection>) -> Result<Vec<Category>> {
        let query = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            FROM categories
            WHERE is_deleted = FALSE
            ORDER BY name
            "#,
        );

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Batch lookup by internal ids, used to avoid N+1 queries.
    #[instrument(name = "db.category.list_by_ids", skip_all, fields(count = ids.len()))]
    pub async fn list_by_ids(
        &self,
        tx: Option<&mut PgConnection>,
        ids: &[i64],
    ) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, uuid, name, created_at, updated_at, is_deleted, deleted_at
            FROM categories
            WHERE id = ANY($1) AND is_deleted = FALSE
            ORDER BY name
            "#,
        )
        .bind(ids);

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Persists the name and `updated_at`. Returns false when no active row matched.
    #[instrument(name = "db.category.update", skip_all, fields(category = %category.external_id))]
    pub async fn update(&self, tx: Option<&mut PgConnection>, category: &Category) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE categories
            SET name = $1, updated_at = $2
            WHERE id = $3 AND is_deleted = FALSE
            "#,
        )
        .bind(&category.name)
        .bind(category.updated_at)
        .bind(category.id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    /// Attaches the category's active stores.
    #[instrument(name = "db.category.load_stores", skip_all, fields(category = %category.external_id))]
    pub async fn load_stores(
        &self,
        tx: Option<&mut PgConnection>,
        category: &mut Category,
    ) -> Result<()> {
        category.stores = self.store_repo.get_by_category_id(tx, category.id).await?;
        Ok(())
    }

    /// Attaches stores to many categories with a single query. Categories
    /// without stores end up with an empty collection.
    #[instrument(name = "db.category.load_stores_for_many", skip_all, fields(count = categories.len()))]
    pub async fn load_stores_for_many(
        &self,
        tx: Option<&mut PgConnection>,
        categories: &mut [Category],
    ) -> Result<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
        let mut stores_by_category = self.store_repo.get_by_category_ids(tx, &ids).await?;

        for category in categories.iter_mut() {
            category.stores = stores_by_category.remove(&category.id).unwrap_or_default();
        }

        Ok(())
    }
}
