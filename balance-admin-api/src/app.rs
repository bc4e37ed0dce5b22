/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use balance_admin_api::{app::{build_router, AppState}, config::Config};
/// use balance_admin_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.pool_config()?).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::error::attach_error_detail;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use balance_admin_shared::db::executor::Executor;
use balance_admin_shared::ledger::Ledger;
use balance_admin_shared::query::UserQueryService;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor. Every field is a
/// handle onto the same pool.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Balance adjustments
    pub ledger: Ledger,

    /// User listing
    pub users: UserQueryService,
}

impl AppState {
    /// Creates state whose services share one executor over `db`
    pub fn new(db: PgPool, config: Config) -> Self {
        let executor = Executor::with_policy(db.clone(), config.retry.policy());

        Self {
            db,
            ledger: Ledger::new(executor.clone()),
            users: UserQueryService::new(executor),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /                        # Liveness
/// ├── GET  /health                  # Database and pool health
/// └── /api/
///     ├── GET  /users               # Paginated, sorted listing
///     ├── POST /:userId/credit      # Add funds
///     └── POST /:userId/debit       # Remove funds
/// ```
///
/// Middleware, innermost first: error detail (development only), tracing,
/// CORS.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new()
        .route("/", get(routes::health::liveness))
        .route("/health", get(routes::health::health_check));

    let api_routes = Router::new()
        .route("/users", get(routes::users::list_users))
        .route("/:user_id/credit", post(routes::balance::credit_user))
        .route("/:user_id/debit", post(routes::balance::debit_user));

    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    let mut router = Router::new()
        .merge(health_routes)
        .nest("/api", api_routes);

    if state.config.api.is_development() {
        router = router.layer(axum::middleware::from_fn(attach_error_detail));
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
