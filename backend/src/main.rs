//! Trading House Back Office - Backend Server
//!
//! Invoice lifecycle and inventory reconciliation for a trading house:
//! customer, vendor and commissioner invoices, shop/cold stock, and the
//! broker and commissioner commission ledgers.

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod routes;
mod services;

pub use config::Config;
use services::DueDateSweeper;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub sweeper: DueDateSweeper,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "th_server=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::load()?;

    tracing::info!("Starting Trading House Back Office Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let sweeper = DueDateSweeper::new(db_pool.clone());
    match config.sweeper.run_at() {
        Some(run_at) if config.sweeper.enabled => {
            sweeper.clone().spawn_daily(run_at);
        }
        _ => tracing::info!("Daily overdue sweep disabled"),
    }

    // Create application state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        sweeper,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Trading House Back Office API v1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crate::config::{DatabaseConfig, ServerConfig, SweeperConfig};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            environment: "test".to_string(),
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/trading_house_test".to_string(),
                max_connections: 1,
                min_connections: 0,
            },
            sweeper: SweeperConfig {
                enabled: false,
                run_at_hour: 0,
                run_at_minute: 5,
            },
        };
        let db = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&config.database.url)
            .unwrap();
        AppState {
            sweeper: DueDateSweeper::new(db.clone()),
            db,
            config: Arc::new(config),
        }
    }

    fn status_of(method: &str, uri: &str) -> StatusCode {
        tokio_test::block_on(async {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            create_app(test_state())
                .oneshot(request)
                .await
                .unwrap()
                .status()
        })
    }

    #[test]
    fn test_root() {
        assert_eq!(status_of("GET", "/"), StatusCode::OK);
    }

    #[test]
    fn test_malformed_id_is_bad_request() {
        assert_eq!(status_of("GET", "/api/v1/items/not-a-uuid"), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of("GET", "/api/v1/customer-invoices/42"),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unknown_route_and_method() {
        assert_eq!(status_of("GET", "/api/v1/customers"), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of("GET", "/api/v1/maintenance/overdue-sweep"),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
