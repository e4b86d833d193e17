#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone binary for the bus directory API server.

#[actix_web::main]
async fn main() -> Result<(), bus_directory_server::StartupError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    bus_directory_server::run_server().await.inspect_err(|e| {
        log::error!("Server stopped: {e}");
    })
}
