//! In-process bus store.
//!
//! Records are kept in insertion order so scans and pagination are stable.
//! This store is for local development and tests: it is not shared across
//! processes and is lost on restart.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use bus_directory_bus_models::{
    BusPatch, BusRecord, VoteRecord, VoteTransition, VoteType, apply_delta,
    new_bus_from_submission,
};
use bus_directory_database_models::{BusIndex, INDEX_QUERY_LIMIT, ListPage, VoteOutcome};
use chrono::Utc;

use crate::{BusRepository, DbError};

/// Bus and vote store held in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    buses: Mutex<Vec<BusRecord>>,
    votes: Mutex<BTreeMap<String, VoteRecord>>,
}

fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    operation: &'static str,
) -> Result<MutexGuard<'a, T>, DbError> {
    mutex.lock().map_err(|e| DbError::Store {
        operation,
        message: e.to_string(),
    })
}

impl MemoryRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `buses` in the given order.
    #[must_use]
    pub fn with_buses(buses: Vec<BusRecord>) -> Self {
        Self {
            buses: Mutex::new(buses),
            votes: Mutex::default(),
        }
    }

    /// Loads a JSON array of buses.
    ///
    /// Entries that carry a `createdAt` are taken as stored records; others
    /// are treated as fresh submissions and get their derived fields
    /// filled in. Later duplicates of a license number are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] or [`DbError::Json`] if the file can't be
    /// read, and [`DbError::Conversion`] if an entry isn't a valid bus.
    pub fn from_seed_file(path: &Path) -> Result<Self, DbError> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&contents)?;

        let now = Utc::now();
        let mut buses: Vec<BusRecord> = Vec::with_capacity(entries.len());

        for entry in entries {
            let bus = if entry.contains_key("createdAt") {
                serde_json::from_value(serde_json::Value::Object(entry)).map_err(|e| {
                    DbError::Conversion {
                        message: e.to_string(),
                    }
                })?
            } else {
                new_bus_from_submission(entry, now).map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?
            };

            if buses.iter().any(|b| b.license_no == bus.license_no) {
                log::warn!("Skipping duplicate seed entry {}", bus.license_no);
                continue;
            }
            buses.push(bus);
        }

        log::info!("Loaded {} buses from {}", buses.len(), path.display());

        Ok(Self::with_buses(buses))
    }

    /// Number of stored buses.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, DbError> {
        Ok(lock(&self.buses, "Count")?.len())
    }

    /// Whether the store holds no buses.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait::async_trait]
impl BusRepository for MemoryRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, license_no: &str) -> Result<Option<BusRecord>, DbError> {
        Ok(lock(&self.buses, "GetItem")?
            .iter()
            .find(|b| b.license_no == license_no)
            .cloned())
    }

    async fn list(&self, limit: usize, last_key: Option<&str>) -> Result<ListPage, DbError> {
        let buses = lock(&self.buses, "Scan")?;

        let start = last_key
            .and_then(|key| buses.iter().position(|b| b.license_no == key))
            .map_or(0, |i| i + 1);

        let page: Vec<BusRecord> = buses.iter().skip(start).take(limit).cloned().collect();
        let last_key = if start + page.len() < buses.len() {
            page.last().map(|b| b.license_no.clone())
        } else {
            None
        };

        Ok(ListPage {
            buses: page,
            last_key,
        })
    }

    async fn create(&self, bus: &BusRecord) -> Result<(), DbError> {
        let mut buses = lock(&self.buses, "PutItem")?;
        if buses.iter().any(|b| b.license_no == bus.license_no) {
            return Err(DbError::AlreadyExists {
                license_no: bus.license_no.clone(),
            });
        }
        buses.push(bus.clone());
        Ok(())
    }

    async fn update(&self, license_no: &str, patch: &BusPatch) -> Result<BusRecord, DbError> {
        let mut buses = lock(&self.buses, "UpdateItem")?;
        let existing = buses
            .iter_mut()
            .find(|b| b.license_no == license_no)
            .ok_or_else(|| DbError::NotFound {
                license_no: license_no.to_string(),
            })?;

        let merged = patch.apply(existing, Utc::now())?;
        *existing = merged.clone();
        Ok(merged)
    }

    async fn increment_legacy_votes(&self, license_no: &str) -> Result<BusRecord, DbError> {
        let mut buses = lock(&self.buses, "UpdateItem")?;
        let bus = buses
            .iter_mut()
            .find(|b| b.license_no == license_no)
            .ok_or_else(|| DbError::NotFound {
                license_no: license_no.to_string(),
            })?;

        bus.verified_votes = bus.verified_votes.saturating_add(1);
        bus.updated_at = Some(Utc::now());
        Ok(bus.clone())
    }

    async fn scan_all(&self, limit: usize) -> Result<Vec<BusRecord>, DbError> {
        Ok(lock(&self.buses, "Scan")?
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn query_by_index(
        &self,
        index: BusIndex,
        value: &str,
    ) -> Result<Vec<BusRecord>, DbError> {
        Ok(lock(&self.buses, "Query")?
            .iter()
            .filter(|b| index.matches(b, value))
            .take(INDEX_QUERY_LIMIT)
            .cloned()
            .collect())
    }

    async fn get_vote(
        &self,
        license_no: &str,
        user_email: &str,
    ) -> Result<Option<VoteType>, DbError> {
        Ok(lock(&self.votes, "GetItem")?
            .get(&VoteRecord::key(license_no, user_email))
            .map(|v| v.vote_type))
    }

    async fn apply_vote(
        &self,
        license_no: &str,
        user_email: &str,
        vote: VoteType,
    ) -> Result<VoteOutcome, DbError> {
        if self.get(license_no).await?.is_none() {
            return Err(DbError::NotFound {
                license_no: license_no.to_string(),
            });
        }

        let now = Utc::now();
        let key = VoteRecord::key(license_no, user_email);

        let transition = {
            let mut votes = lock(&self.votes, "PutItem")?;
            let transition =
                VoteTransition::compute(votes.get(&key).map(|v| v.vote_type), vote);
            match transition.next {
                Some(next) => {
                    votes.insert(key, VoteRecord::new(license_no, user_email, next, now));
                }
                None => {
                    votes.remove(&key);
                }
            }
            transition
        };

        let mut buses = lock(&self.buses, "UpdateItem")?;
        let bus = buses
            .iter_mut()
            .find(|b| b.license_no == license_no)
            .ok_or_else(|| DbError::NotFound {
                license_no: license_no.to_string(),
            })?;

        bus.verify_count = apply_delta(bus.verify_count, transition.verify_delta);
        bus.report_count = apply_delta(bus.report_count, transition.report_delta);
        bus.updated_at = Some(now);

        Ok(VoteOutcome {
            verify_delta: transition.verify_delta,
            report_delta: transition.report_delta,
            verify_count: bus.verify_count,
            report_count: bus.report_count,
            user_vote: transition.next,
        })
    }
}
