#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tools for the bus directory.
//!
//! ```text
//! bus_directory serve
//! bus_directory import buses.json
//! bus_directory check
//! bus_directory search --from Colombo --to Kandy
//! bus_directory search "colombo to kandy" --verified
//! ```
//!
//! Running `bus_directory` with no subcommand enters interactive mode.
//! The store is chosen from the environment (`BUS_STORE`,
//! `BUS_TABLE_NAME`, ...).

mod commands;
mod interactive;

use std::path::PathBuf;

use bus_directory_search::SearchParams;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bus_directory", about = "Sri Lanka bus route directory tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Bulk-create buses from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Print the store configuration and probe the store
    Check,
    /// Search buses by text or by trip
    Search {
        /// Free-text query (e.g. "kandy" or "colombo to kandy")
        query: Option<String>,
        /// Trip origin for a directional search
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Trip destination for a directional search
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Only this bus type (normal, semi, luxury)
        #[arg(long = "type")]
        bus_type: Option<String>,
        /// Only verified buses
        #[arg(long)]
        verified: bool,
    },
}

/// Runs the API server on its own actix system.
///
/// The server needs actix-web's runtime, so it runs in a blocking task to
/// avoid nesting tokio runtimes.
async fn serve(interactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(async move {
            if interactive {
                bus_directory_server::interactive::run().await
            } else {
                bus_directory_server::run_server().await
            }
        })
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bus_directory_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Serve => serve(false).await?,
        Commands::Import { file } => {
            let (_, repo) = commands::open_store().await?;
            commands::import(&multi, repo.as_ref(), &file).await?;
        }
        Commands::Check => {
            let (config, repo) = commands::open_store().await?;
            commands::check(&config, repo.as_ref()).await?;
        }
        Commands::Search {
            query,
            from,
            to,
            bus_type,
            verified,
        } => {
            let (_, repo) = commands::open_store().await?;
            let params = SearchParams {
                directional: from.is_some() && to.is_some(),
                query,
                from,
                to,
                bus_type,
                verified_only: verified,
                ..SearchParams::default()
            };
            commands::search(repo.as_ref(), &params).await?;
        }
    }

    Ok(())
}
