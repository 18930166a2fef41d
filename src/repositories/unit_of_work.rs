use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, error, warn};

use crate::error::{AppError, Result};

/// Transaction boundary for operations spanning several repositories.
///
/// The closure receives the transaction's connection and must hand it to
/// every repository call it makes (`Some(&mut *tx)`); all statements then
/// share one connection and commit together. Nesting is not supported.
#[derive(Clone)]
pub struct UnitOfWork {
    pool: PgPool,
}

impl UnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begins a transaction and runs `f` inside it.
    ///
    /// `Ok` commits and surfaces a commit failure, `Err` rolls back and
    /// returns the original error, a panic rolls back and is then resumed.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        debug!("Transaction started");

        let outcome = AssertUnwindSafe(f(&mut *tx)).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await.map_err(AppError::from)?;
                debug!("Transaction committed");
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                debug!(error = %err, "Transaction rolled back");
                Err(err)
            }
            Err(payload) => {
                error!("Unit of work panicked, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after panic failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Like [`Self::with_transaction`] but gives up after `deadline`.
    ///
    /// On expiry the in-flight statement is abandoned and the transaction is
    /// rolled back when its connection is dropped.
    pub async fn with_transaction_timeout<T, F>(&self, deadline: Duration, f: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
    {
        match tokio::time::timeout(deadline, self.with_transaction(f)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?deadline, "Unit of work exceeded its deadline");
                Err(AppError::Timeout(format!(
                    "transaction did not finish within {:?}",
                    deadline
                )))
            }
        }
    }
}
