#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the bus directory.
//!
//! Serves the bus CRUD, search, voting, and upload endpoints over a
//! [`BusRepository`] chosen at startup, plus an optional static SPA build.
//! Mutating endpoints require a bearer token (see [`auth`]).

pub mod auth;
pub mod error;
mod handlers;
pub mod interactive;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use bus_directory_database::{BusRepository, DbError, StoreConfig};
use bus_directory_uploads::{UploadClient, UploadConfig, UploadError};

use crate::auth::{AuthConfig, AuthConfigError};
use crate::error::ApiError;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 4000;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Shared application state.
pub struct AppState {
    /// Bus and vote store.
    pub repo: Arc<dyn BusRepository>,
    /// S3 presigner; `None` when uploads aren't configured.
    pub uploads: Option<UploadClient>,
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The store couldn't be opened.
    #[error("Failed to open store: {0}")]
    Store(#[from] DbError),

    /// Upload configuration is invalid.
    #[error("Invalid upload configuration: {0}")]
    Upload(#[from] UploadError),

    /// Token verification isn't configured.
    #[error(transparent)]
    Auth(#[from] AuthConfigError),

    /// Binding or running the HTTP server failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Single allowed CORS origin; any origin when `None`.
    pub allowed_origin: Option<String>,
    /// Directory of a built SPA to serve at `/`.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            allowed_origin: None,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `ALLOWED_ORIGIN`, and `STATIC_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: var("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            allowed_origin: var("ALLOWED_ORIGIN"),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
        }
    }

    fn cors(&self) -> Cors {
        match &self.allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allowed_methods(["GET", "POST", "PUT", "OPTIONS"])
                .allow_any_header()
                .max_age(3600),
            None => Cors::permissive(),
        }
    }
}

/// Registers every API route plus JSON and query error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(handlers::health))
    .route("/buses", web::get().to(handlers::list_buses))
    .route("/buses", web::post().to(handlers::create_bus))
    .route("/buses/{licenseNo}", web::get().to(handlers::get_bus))
    .route("/buses/{licenseNo}", web::put().to(handlers::update_bus))
    .route("/buses/{licenseNo}/verify", web::post().to(handlers::verify_bus))
    .route("/buses/{licenseNo}/report", web::post().to(handlers::report_bus))
    .route("/buses/{licenseNo}/my-vote", web::get().to(handlers::my_vote))
    .route("/search", web::get().to(handlers::search))
    .route("/routes", web::get().to(handlers::routes))
    .route("/protected/ping", web::get().to(handlers::ping))
    .route("/uploads/avatar-url", web::post().to(handlers::upload_url));
}

/// Opens the store and the optional upload presigner from the environment.
///
/// # Errors
///
/// Returns [`StartupError`] if the store config is invalid, the seed file
/// can't be read, or the upload config is invalid.
pub async fn build_state() -> Result<AppState, StartupError> {
    let repo = bus_directory_database::connect(&StoreConfig::from_env()?).await?;

    let uploads = match UploadConfig::from_env()? {
        Some(config) => Some(UploadClient::new(config).await),
        None => {
            log::info!("UPLOAD_BUCKET not set; upload URLs are disabled");
            None
        }
    };

    Ok(AppState { repo, uploads })
}

/// Starts the bus directory API server.
///
/// Builds the application state from the environment and runs the
/// Actix-Web HTTP server until shutdown. The caller provides the async
/// runtime (e.g. via `#[actix_web::main]`) and initialises logging.
///
/// # Errors
///
/// Returns [`StartupError`] if the state can't be built or the server fails
/// to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), StartupError> {
    let config = ServerConfig::from_env();
    let auth = web::Data::new(AuthConfig::from_env()?);
    let state = web::Data::new(build_state().await?);

    log::info!(
        "Starting server on {}:{} (store: {})",
        config.bind_addr,
        config.port,
        state.repo.backend()
    );

    let bind = (config.bind_addr.clone(), config.port);

    HttpServer::new(move || {
        let app = App::new()
            .wrap(config.cors())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(auth.clone())
            .configure(configure);

        match &config.static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
