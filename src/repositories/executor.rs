use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, PgConnection, PgPool, Postgres};

/// Where a repository statement runs: straight on the pool, or on the
/// connection of a transaction opened by [`super::UnitOfWork`].
///
/// Repository methods take `Option<&mut PgConnection>`; `None` means the
/// caller is not inside a unit of work and the pool is used.
pub enum DbExecutor<'c> {
    Pool(&'c PgPool),
    Connection(&'c mut PgConnection),
}

impl<'c> DbExecutor<'c> {
    pub fn new(pool: &'c PgPool, tx: Option<&'c mut PgConnection>) -> Self {
        match tx {
            Some(conn) => DbExecutor::Connection(conn),
            None => DbExecutor::Pool(pool),
        }
    }

    pub async fn fetch_optional<'q, T>(
        self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match self {
            DbExecutor::Pool(pool) => query.fetch_optional(pool).await,
            DbExecutor::Connection(conn) => query.fetch_optional(conn).await,
        }
    }

    pub async fn fetch_all<'q, T>(
        self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match self {
            DbExecutor::Pool(pool) => query.fetch_all(pool).await,
            DbExecutor::Connection(conn) => query.fetch_all(conn).await,
        }
    }

    pub async fn execute<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Result<PgQueryResult, sqlx::Error> {
        match self {
            DbExecutor::Pool(pool) => query.execute(pool).await,
            DbExecutor::Connection(conn) => query.execute(conn).await,
        }
    }
}
