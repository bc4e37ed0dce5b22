/// Resilient executor for units of database work
///
/// Every read and write in the system goes through [`Executor`]. It owns a
/// handle to the connection pool and a [`RetryPolicy`], and runs a
/// [`UnitOfWork`] either on a plain pooled connection or inside a
/// transaction:
///
/// ```text
/// run_in_transaction(work)
///   └─> attempt n
///         ├─> acquire connection, BEGIN
///         ├─> work.execute(&mut conn)
///         ├─> Ok  → COMMIT → return
///         └─> Err → ROLLBACK → retry if transient, else return
/// ```
///
/// Connections are RAII guards, so they go back to the pool on every exit
/// path, including panics and deadline cancellation. A transaction dropped
/// without commit is rolled back by sqlx.
///
/// # Deadline
///
/// The policy deadline bounds checkout, BEGIN and the work itself. COMMIT is
/// never cancelled: once it is sent the attempt runs to completion, so a
/// caller is never told an adjustment failed when it was applied. A single
/// statement outside a transaction commits itself, so it is not cancelled
/// either. A COMMIT whose reply is lost surfaces as
/// [`StoreError::CommitOutcomeUnknown`] and is not retried.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use balance_admin_shared::db::error::StoreError;
/// use balance_admin_shared::db::executor::{Executor, UnitOfWork};
/// use sqlx::PgConnection;
///
/// struct CountUsers;
///
/// #[async_trait]
/// impl UnitOfWork for CountUsers {
///     type Output = i64;
///     type Error = StoreError;
///
///     async fn execute(&self, conn: &mut PgConnection) -> Result<i64, StoreError> {
///         let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
///             .fetch_one(conn)
///             .await?;
///         Ok(count)
///     }
/// }
///
/// # async fn example(executor: Executor) -> Result<(), StoreError> {
/// let total = executor.run(&CountUsers).await?;
/// # Ok(())
/// # }
/// ```

use crate::db::error::{Retryable, StoreError};
use crate::db::retry::{retry_within, Budget, RetryPolicy};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// A self-contained set of database operations run as one retryable action
///
/// `execute` may be called more than once when an attempt fails with a
/// retryable error, so it must not keep state between calls.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Value produced on success
    type Output: Send;

    /// Failure type; store errors convert into it, and it decides retryability
    type Error: From<StoreError> + Retryable + Display + Send;

    /// Short name used in log events
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Runs the work against a connection that is exclusively owned for the
    /// duration of the call
    async fn execute(&self, conn: &mut PgConnection) -> Result<Self::Output, Self::Error>;
}

/// Whether a unit of work needs a transaction boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atomicity {
    /// Runs on a plain pooled connection (single statements, reads)
    Single,

    /// Runs between BEGIN and COMMIT; rolled back on any failure
    Transactional,
}

/// Runs units of work with retry, backoff and a total deadline
#[derive(Debug, Clone)]
pub struct Executor {
    pool: PgPool,
    policy: RetryPolicy,
}

impl Executor {
    /// Creates an executor with the default retry policy
    pub fn new(pool: PgPool) -> Self {
        Self::with_policy(pool, RetryPolicy::default())
    }

    /// Creates an executor with a custom retry policy
    pub fn with_policy(pool: PgPool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `work` on a pooled connection without a transaction
    pub async fn run<W: UnitOfWork>(&self, work: &W) -> Result<W::Output, W::Error> {
        self.execute(work, Atomicity::Single).await
    }

    /// Runs `work` inside a transaction
    pub async fn run_in_transaction<W: UnitOfWork>(
        &self,
        work: &W,
    ) -> Result<W::Output, W::Error> {
        self.execute(work, Atomicity::Transactional).await
    }

    /// Runs `work` with the requested atomicity, retrying transient failures
    /// within the policy deadline
    pub async fn execute<W: UnitOfWork>(
        &self,
        work: &W,
        atomicity: Atomicity,
    ) -> Result<W::Output, W::Error> {
        let budget = Budget::start(&self.policy);

        retry_within(&self.policy, budget, work.name(), |attempt| {
            self.attempt(work, atomicity, attempt, budget)
        })
        .await
    }

    async fn attempt<W: UnitOfWork>(
        &self,
        work: &W,
        atomicity: Atomicity,
        attempt: u32,
        budget: Budget,
    ) -> Result<W::Output, W::Error> {
        debug!(operation = work.name(), attempt, ?atomicity, "Running unit of work");

        match atomicity {
            Atomicity::Single => {
                let mut conn = within(work, budget, self.pool.acquire())
                    .await?
                    .map_err(StoreError::from)?;
                work.execute(&mut *conn).await
            }
            Atomicity::Transactional => {
                let mut tx = within(work, budget, self.pool.begin())
                    .await?
                    .map_err(StoreError::from)?;

                // Dropping `tx` on a deadline rolls it back
                let outcome = within(work, budget, work.execute(&mut *tx)).await?;

                match outcome {
                    Ok(output) => {
                        tx.commit().await.map_err(|e| {
                            let err = StoreError::from_commit(e);
                            if matches!(err, StoreError::CommitOutcomeUnknown(_)) {
                                warn!(
                                    operation = work.name(),
                                    attempt,
                                    error = %err,
                                    "Commit reply lost, not retrying"
                                );
                            }
                            err
                        })?;
                        Ok(output)
                    }
                    Err(err) => {
                        if let Err(rollback_err) = tx.rollback().await {
                            warn!(
                                operation = work.name(),
                                attempt,
                                error = %rollback_err,
                                "Rollback failed"
                            );
                        }
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Awaits `fut` within what is left of `budget`
async fn within<W, F>(work: &W, budget: Budget, fut: F) -> Result<F::Output, StoreError>
where
    W: UnitOfWork,
    F: Future,
{
    let Some(remaining) = budget.remaining() else {
        return Ok(fut.await);
    };

    tokio::time::timeout(remaining, fut).await.map_err(|_| {
        warn!(
            operation = work.name(),
            deadline_ms = budget.limit().unwrap_or_default().as_millis() as u64,
            "Unit of work exceeded its deadline"
        );
        budget.exceeded()
    })
}
