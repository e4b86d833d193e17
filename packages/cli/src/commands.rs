//! Implementations of the non-interactive subcommands.

use std::error::Error;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use bus_directory_cli_utils::{BusImportBar, MultiProgress};
use bus_directory_database::import::{ImportStats, import_buses, read_entries};
use bus_directory_database::{BusRepository, StoreBackend, StoreConfig};
use bus_directory_search::{SearchParams, SearchResults};

/// Widest company name printed before truncating.
const COMPANY_WIDTH: usize = 24;

/// Opens the store selected by the environment.
///
/// # Errors
///
/// Returns an error if the store config is invalid or the store can't be
/// opened.
pub async fn open_store() -> Result<(StoreConfig, Arc<dyn BusRepository>), Box<dyn Error>> {
    let config = StoreConfig::from_env()?;
    let repo = bus_directory_database::connect(&config).await?;
    Ok((config, repo))
}

/// Bulk-creates buses from a JSON array file.
///
/// # Errors
///
/// Returns an error if the file can't be read or the store fails.
pub async fn import(
    multi: &MultiProgress,
    repo: &dyn BusRepository,
    path: &Path,
) -> Result<ImportStats, Box<dyn Error>> {
    let progress = BusImportBar::start(multi, &path.display().to_string());
    let entries = match read_entries(path) {
        Ok(entries) => entries,
        Err(e) => {
            progress.finish(format!("Failed to read {}", path.display()));
            return Err(e.into());
        }
    };
    log::info!("Importing {} bus entries from {}", entries.len(), path.display());

    let stats = import_buses(repo, entries, progress.as_ref()).await?;

    println!("{stats}");
    Ok(stats)
}

/// Prints the store configuration and probes the store with a one-item
/// listing.
///
/// # Errors
///
/// Returns an error if the probe fails.
pub async fn check(config: &StoreConfig, repo: &dyn BusRepository) -> Result<(), Box<dyn Error>> {
    println!("Store:       {}", config.backend);
    match config.backend {
        StoreBackend::DynamoDb => {
            println!("Region:      {}", config.region);
            println!(
                "Bus table:   {}",
                config.bus_table.as_deref().unwrap_or("(unset)")
            );
            println!("Vote table:  {}", config.votes_table);
            if let Some(endpoint) = &config.endpoint {
                println!("Endpoint:    {endpoint}");
            }
        }
        StoreBackend::Memory => {
            if let Some(seed) = &config.seed_file {
                println!("Seed file:   {}", seed.display());
            }
        }
    }

    let page = repo.list(1, None).await?;
    println!(
        "Probe:       ok ({})",
        if page.buses.is_empty() {
            "store is empty"
        } else {
            "store has buses"
        }
    );

    Ok(())
}

/// Runs a search and prints the results as a table.
///
/// # Errors
///
/// Returns an error for an invalid directional request or a store failure.
pub async fn search(repo: &dyn BusRepository, params: &SearchParams) -> Result<(), Box<dyn Error>> {
    let results = bus_directory_search::search(repo, params).await?;
    print!("{}", format_results(&results));
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let cut: String = value.chars().take(width - 3).collect();
        format!("{cut}...")
    } else {
        value.to_string()
    }
}

/// Renders search results as a fixed-width table.
#[must_use]
pub fn format_results(results: &SearchResults) -> String {
    let mut out = String::new();

    if let Some(direction) = &results.search_direction {
        let _ = writeln!(out, "Buses for {direction}\n");
    }

    if results.hits.is_empty() {
        out.push_str("No buses found.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<12} {:<COMPANY_WIDTH$} {:<9} {:<5} {:<4} NAME",
        "LICENSE", "COMPANY", "TYPE", "DEPS", "OK"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for hit in &results.hits {
        let _ = writeln!(
            out,
            "{:<12} {:<COMPANY_WIDTH$} {:<9} {:<5} {:<4} {}",
            hit.bus.license_no,
            truncate(&hit.bus.company_name, COMPANY_WIDTH),
            hit.bus.bus_type.to_string(),
            hit.daily_departures,
            if hit.bus.is_verified() { "yes" } else { "" },
            hit.name(),
        );
    }

    let _ = writeln!(
        out,
        "\n{} of {} bus(es)",
        results.hits.len(),
        results.total_found
    );
    out
}
