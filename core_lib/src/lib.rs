//! Core library for the user API: validation, persistence, file serving,
//! middleware and route handlers.

pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod validation;

pub use config::AppConfig;
pub use database::{connect_lazy, StoreError, UpdateOutcome, User, UserRepository, UserStore};
pub use error::{AppError, Result};
pub use files::FileManager;
pub use handlers::routes::create_routes;
pub use middleware::cors::{cors_layer, AllowedOrigin};
pub use middleware::rate_limit::{Clock, ManualClock, RateLimiter, SystemClock, RATE_LIMIT_MESSAGE};

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::{any::Any, net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub files: FileManager,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, files: FileManager, rate_limiter: RateLimiter) -> Self {
        Self {
            users,
            files,
            rate_limiter,
        }
    }

    /// Wires the SQLite-backed store, the file directory and a wall-clock
    /// rate limiter from configuration.
    pub fn from_config(config: &AppConfig) -> std::io::Result<Self> {
        let pool = connect_lazy(&config.database);
        let files = FileManager::new(&config.files.base_dir)?;
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self::new(Arc::new(UserRepository::new(pool)), files, rate_limiter))
    }
}

/// Assembles routes and the middleware stack. From the outside in:
/// request id and tracing, origin gate, CORS, panic catcher, routes.
pub fn create_app(state: AppState, origin: AllowedOrigin) -> Router {
    let router = Router::new()
        .merge(create_routes(&state))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&origin))
        .layer(axum_middleware::from_fn_with_state(
            origin,
            middleware::cors::origin_gate,
        ));

    middleware::logging::with_request_logging(router)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Binds `addr` and serves until Ctrl+C or SIGTERM. A bind failure is
/// returned to the caller.
pub async fn run_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on {}", listener.local_addr()?);

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
