use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::query::{
    execute, group_by_owner, missing_returning_row, order_by_keys, query_many, query_single,
};
use super::DbExecutor;
use crate::error::Result;
use crate::models::Store;

const STORE_RETURNING: &str =
    " RETURNING id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at";

/// Repository for Store persistence.
#[derive(Clone)]
pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a store and returns the stored row.
    #[instrument(name = "db.store.insert", skip_all, fields(store = %store.external_id))]
    pub async fn insert(&self, tx: Option<&mut PgConnection>, store: &Store) -> Result<Store> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (uuid, name, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(store.external_id)
        .bind(&store.name)
        .bind(store.category_id)
        .bind(store.created_at)
        .bind(store.updated_at);

        query_single(DbExecutor::new(&self.pool, tx), query)
            .await?
            .ok_or_else(|| missing_returning_row("stores"))
    }

    /// Inserts all stores with one multi-row statement.
    ///
    /// `RETURNING` order is not guaranteed to follow the `VALUES` order, so the
    /// returned rows are matched back to the input by external id.
    #[instrument(name = "db.store.insert_many", skip_all, fields(count = stores.len()))]
    pub async fn insert_many(
        &self,
        tx: Option<&mut PgConnection>,
        stores: &[Store],
    ) -> Result<Vec<Store>> {
        if stores.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO stores (uuid, name, category_id, created_at, updated_at) ");
        builder.push_values(stores, |mut row, store| {
            row.push_bind(store.external_id)
                .push_bind(&store.name)
                .push_bind(store.category_id)
                .push_bind(store.created_at)
                .push_bind(store.updated_at);
        });
        builder.push(STORE_RETURNING);

        let created = query_many(
            DbExecutor::new(&self.pool, tx),
            builder.build_query_as::<Store>(),
        )
        .await?;

        let requested: Vec<Uuid> = stores.iter().map(|s| s.external_id).collect();
        Ok(order_by_keys(&requested, created, |s| s.external_id))
    }

    /// Soft-deletes a store. Returns false when no active row matched.
    #[instrument(name = "db.store.delete", skip_all, fields(store = %external_id))]
    pub async fn delete(&self, tx: Option<&mut PgConnection>, external_id: Uuid) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE stores
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }

    /// Soft-deletes every listed store in one statement. Returns the number deleted.
    #[instrument(name = "db.store.delete_many", skip_all, fields(count = external_ids.len()))]
    pub async fn delete_many(
        &self,
        tx: Option<&mut PgConnection>,
        external_ids: &[Uuid],
    ) -> Result<u64> {
        if external_ids.is_empty() {
            return Ok(0);
        }

        let query = sqlx::query(
            r#"
            UPDATE stores
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE uuid = ANY($1) AND is_deleted = FALSE
            "#,
        )
        .bind(external_ids);

        execute(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Soft-deletes all active stores of a category.
    #[instrument(name = "db.store.delete_by_category_id", skip_all, fields(category_id = category_id))]
    pub async fn delete_by_category_id(
        &self,
        tx: Option<&mut PgConnection>,
        category_id: i64,
    ) -> Result<u64> {
        let query = sqlx::query(
            r#"
            UPDATE stores
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE category_id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(category_id);

        execute(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.store.get_by_id", skip_all, fields(id = id))]
    pub async fn get_by_id(&self, tx: Option<&mut PgConnection>, id: i64) -> Result<Option<Store>> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    #[instrument(name = "db.store.get_by_external_id", skip_all, fields(store = %external_id))]
    pub async fn get_by_external_id(
        &self,
        tx: Option<&mut PgConnection>,
        external_id: Uuid,
    ) -> Result<Option<Store>> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE uuid = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(external_id);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Uniqueness probe within a category.
    #[instrument(name = "db.store.get_by_category_and_name", skip_all, fields(category_id = category_id))]
    pub async fn get_by_category_and_name(
        &self,
        tx: Option<&mut PgConnection>,
        category_id: i64,
        name: &str,
    ) -> Result<Option<Store>> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE category_id = $1 AND name = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(category_id)
        .bind(name);

        query_single(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Active stores of one category in insertion order.
    #[instrument(name = "db.store.get_by_category_id", skip_all, fields(category_id = category_id))]
    pub async fn get_by_category_id(
        &self,
        tx: Option<&mut PgConnection>,
        category_id: i64,
    ) -> Result<Vec<Store>> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE category_id = $1 AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(category_id);

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Active stores of many categories, grouped by category id. Categories
    /// without stores are absent from the map.
    #[instrument(name = "db.store.get_by_category_ids", skip_all, fields(count = category_ids.len()))]
    pub async fn get_by_category_ids(
        &self,
        tx: Option<&mut PgConnection>,
        category_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Store>>> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE category_id = ANY($1) AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(category_ids);

        let stores = query_many(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(group_by_owner(stores, |s| s.category_id))
    }

    /// Lists active stores ordered by name.
    #[instrument(name = "db.store.list", skip_all)]
    pub async fn list(&self, tx: Option<&mut PgConnection>) -> Result<Vec<Store>> {
        let query = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, uuid, name, category_id, created_at, updated_at, is_deleted, deleted_at
            FROM stores
            WHERE is_deleted = FALSE
            ORDER BY name, id
            "#,
        );

        query_many(DbExecutor::new(&self.pool, tx), query).await
    }

    /// Persists the name and `updated_at`. Returns false when no active row matched.
    #[instrument(name = "db.store.update", skip_all, fields(store = %store.external_id))]
    pub async fn update(&self, tx: Option<&mut PgConnection>, store: &Store) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE stores
            SET name = $1, updated_at = $2
            WHERE id = $3 AND is_deleted = FALSE
            "#,
        )
        .bind(&store.name)
        .bind(store.updated_at)
        .bind(store.id);

        let affected = execute(DbExecutor::new(&self.pool, tx), query).await?;
        Ok(affected > 0)
    }
}
