//! Subforge Server - HTTP API server.
//!
//! ## Endpoints
//!
//! - `POST /convert` - Convert subscription URLs into a configuration
//! - `POST /sub` - Convert and issue a replayable subscription link
//! - `GET /sub?id=…` - Rebuild the configuration behind a link
//! - `GET /fetchConfig` - Session draft template, or the default one
//! - `GET /configReset` - The default template
//! - `POST /cus/save` - Save the session draft template
//! - `GET /cus/check_draft` - Whether the session has a draft
//! - `POST /cus/cleanup` - Delete the session draft
//! - `GET /cus/fetch_proxies?urls=…` - Converted nodes of the given sources
//!
//! ## Example
//!
//! ```no_run
//! use subforge_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
pub mod fetch;
mod handlers;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use subforge_storage::Database;

pub use error::{ApiError, Result};
pub use fetch::{FetchConfig, FetchError, Fetcher, HttpFetcher};
pub use state::{AppState, DEFAULT_TEMPLATE};

/// Default server port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Where the server keeps its database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// The platform data directory.
    #[default]
    Default,
    /// A specific file.
    Path(PathBuf),
    /// Nothing persisted (for testing).
    InMemory,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 8787).
    pub port: u16,
    /// Database location.
    pub db_path: DatabaseLocation,
    /// Subscription fetch settings.
    pub fetch: FetchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: DatabaseLocation::Default,
            fetch: FetchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a config for in-memory testing.
    pub fn in_memory() -> Self {
        Self {
            db_path: DatabaseLocation::InMemory,
            ..Self::default()
        }
    }

    /// Sets the database file.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = DatabaseLocation::Path(path.into());
        self
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the fetch settings.
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] subforge_storage::StorageError),

    /// The default template is unusable.
    #[error("template error: {0}")]
    Template(#[from] subforge_core::TemplateError),

    /// HTTP client setup failed.
    #[error("fetch client error: {0}")]
    Fetch(#[from] FetchError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/convert", post(handlers::convert))
        .route(
            "/sub",
            get(handlers::get_subscription).post(handlers::create_subscription),
        )
        .route("/fetchConfig", get(handlers::fetch_config))
        .route("/configReset", get(handlers::config_reset))
        .route("/cus/save", post(handlers::save_draft))
        .route("/cus/check_draft", get(handlers::check_draft))
        .route("/cus/cleanup", post(handlers::cleanup_draft))
        .route("/cus/fetch_proxies", get(handlers::fetch_proxies))
        .layer(cors)
        .with_state(state)
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let db = match &config.db_path {
            DatabaseLocation::Default => Database::new()?,
            DatabaseLocation::Path(path) => Database::with_path(path)?,
            DatabaseLocation::InMemory => Database::in_memory()?,
        };

        Self::with_database(config, db)
    }

    /// Creates a server with an existing database.
    pub fn with_database(
        config: ServerConfig,
        db: Database,
    ) -> std::result::Result<Self, ServerError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let state = AppState::new(db, fetcher)?;
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router: router(state),
            addr,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Subforge server on {}", self.addr);

        let domain = if self.addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Restarts should not wait out TIME_WAIT sockets.
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
