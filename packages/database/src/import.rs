//! Bulk import of bus submissions from a JSON file.

use std::fmt;
use std::path::Path;

use bus_directory_bus_models::new_bus_from_submission;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::progress::ProgressCallback;
use crate::{BusRepository, DbError};

/// Counts from one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Buses written to the store.
    pub created: usize,
    /// Entries whose license number already existed.
    pub skipped: usize,
    /// Entries rejected as invalid submissions.
    pub invalid: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} skipped, {} invalid",
            self.created, self.skipped, self.invalid
        )
    }
}

/// Reads a JSON array of bus submissions from `path`.
///
/// # Errors
///
/// Returns [`DbError::Io`] or [`DbError::Json`] if the file can't be read
/// or isn't an array of objects.
pub fn read_entries(path: &Path) -> Result<Vec<Map<String, Value>>, DbError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Creates a bus for every entry, skipping license numbers that already
/// exist and entries that aren't valid submissions.
///
/// # Errors
///
/// Returns [`DbError`] for store failures other than a duplicate license
/// number; the import stops at the first such failure.
pub async fn import_buses(
    repo: &dyn BusRepository,
    entries: Vec<Map<String, Value>>,
    progress: &dyn ProgressCallback,
) -> Result<ImportStats, DbError> {
    let mut stats = ImportStats::default();
    let now = Utc::now();

    progress.set_total(entries.len() as u64);

    for (i, entry) in entries.into_iter().enumerate() {
        match new_bus_from_submission(entry, now) {
            Ok(bus) => {
                progress.set_message(bus.license_no.clone());
                match repo.create(&bus).await {
                    Ok(()) => stats.created += 1,
                    Err(DbError::AlreadyExists { license_no }) => {
                        log::debug!("{license_no} already exists, skipping");
                        stats.skipped += 1;
                    }
                    Err(e) => {
                        progress.finish(format!("Import failed at entry {i}"));
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                log::warn!("Entry {i} rejected: {e}");
                stats.invalid += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish(format!("Imported buses: {stats}"));
    log::info!("Import finished: {stats}");

    Ok(stats)
}
