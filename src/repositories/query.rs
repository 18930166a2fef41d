//! Shared query execution for the repositories.
//!
//! Every repository method funnels through these helpers so that "no rows"
//! and "the query failed" are told apart in one place: absence is `Ok(None)`
//! or an empty `Vec`, only storage failures become errors.

use std::collections::HashMap;
use std::hash::Hash;

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, Postgres};
use tracing::{error, warn};

use super::DbExecutor;
use crate::error::{AppError, Result};

/// Runs `query` and maps the first row, if any. Further rows are ignored.
pub async fn query_single<'q, T>(
    executor: DbExecutor<'_>,
    query: QueryAs<'q, Postgres, T, PgArguments>,
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    executor.fetch_optional(query).await.map_err(classify)
}

/// Runs `query` and maps every row, preserving order. A row that fails to
/// map aborts the whole call.
pub async fn query_many<'q, T>(
    executor: DbExecutor<'_>,
    query: QueryAs<'q, Postgres, T, PgArguments>,
) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    executor.fetch_all(query).await.map_err(classify)
}

/// Runs a statement and returns the number of affected rows.
pub async fn execute(
    executor: DbExecutor<'_>,
    query: Query<'_, Postgres, PgArguments>,
) -> Result<u64> {
    executor
        .execute(query)
        .await
        .map(|result| result.rows_affected())
        .map_err(classify)
}

/// Error for an `INSERT ... RETURNING` that produced no row.
pub fn missing_returning_row(table: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("insert into {} returned no row", table))
}

fn classify(err: sqlx::Error) -> AppError {
    let err = AppError::from(err);
    if err.is_domain() {
        warn!(error = %err, "Statement rejected by constraint");
    } else {
        error!(error = %err, "Statement failed");
    }
    err
}

/// Reorders `rows` to follow `keys`. Rows whose key is not listed keep their
/// relative order at the end.
pub fn order_by_keys<T, K, F>(keys: &[K], rows: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let position: HashMap<&K, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let mut indexed: Vec<(usize, T)> = rows
        .into_iter()
        .map(|row| {
            let slot = position.get(&key_of(&row)).copied().unwrap_or(usize::MAX);
            (slot, row)
        })
        .collect();
    indexed.sort_by_key(|(slot, _)| *slot);
    indexed.into_iter().map(|(_, row)| row).collect()
}

/// Groups rows by an owning id, keeping row order inside each group.
pub fn group_by_owner<T, F>(rows: Vec<T>, owner_of: F) -> HashMap<i64, Vec<T>>
where
    F: Fn(&T) -> i64,
{
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(owner_of(&row)).or_default().push(row);
    }
    grouped
}

/// Distinct ids in first-seen order.
pub fn distinct_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
