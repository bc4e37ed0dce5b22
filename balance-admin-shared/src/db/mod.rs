/// Database layer
///
/// - `pool`: connection pool lifecycle (create, health check, close)
/// - `error`: classification of database failures into retryable / non-retryable
/// - `retry`: backoff policy and the retry loop
/// - `executor`: runs units of work with retry, optionally inside a transaction
/// - `migrations`: embedded schema migrations
/// - `seed`: random development data
///
/// # Example
///
/// ```no_run
/// use balance_admin_shared::db::executor::Executor;
/// use balance_admin_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::from_url(&std::env::var("DATABASE_URL")?)?).await?;
///
///     let executor = Executor::new(pool);
///     Ok(())
/// }
/// ```

pub mod error;
pub mod executor;
pub mod migrations;
pub mod pool;
pub mod retry;
pub mod seed;
