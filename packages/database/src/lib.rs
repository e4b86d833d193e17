#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bus repository abstraction for the bus directory.
//!
//! [`BusRepository`] is the single storage contract used by the search
//! service, the vote ledger, and the HTTP handlers. Two implementations
//! exist:
//!
//! - [`dynamo::DynamoRepository`]: `DynamoDB` tables for buses and votes,
//!   with `CompanyIndex`, `RouteIndex`, and `TypeIndex` secondary indexes.
//! - [`memory::MemoryRepository`]: a single-process development store,
//!   optionally seeded from a JSON file.
//!
//! Which one is used is decided at startup from [`config::StoreConfig`].

pub mod config;
pub mod db;
pub mod dynamo;
pub mod import;
pub mod item;
pub mod memory;
pub mod progress;

use bus_directory_bus_models::{BusPatch, BusRecord, PatchError, VoteType};
use bus_directory_database_models::{BusIndex, ListPage, VoteOutcome};

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// No bus exists with the given license number.
    #[error("Bus not found: {license_no}")]
    NotFound {
        /// License number that was looked up.
        license_no: String,
    },

    /// A bus with this license number already exists.
    #[error("Bus with license number {license_no} already exists")]
    AlreadyExists {
        /// Conflicting license number.
        license_no: String,
    },

    /// An update did not fit the record schema.
    #[error(transparent)]
    InvalidPatch(#[from] PatchError),

    /// The backing store rejected or failed an operation.
    #[error("Store error during {operation}: {message}")]
    Store {
        /// Store operation that failed (e.g. `Scan`).
        operation: &'static str,
        /// Underlying error description.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Store configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// I/O error reading a seed file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error reading a seed file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage contract for bus records and per-user votes.
///
/// Implementations must keep a stable record order so that repeated scans of
/// an unchanged store return identical results.
#[async_trait::async_trait]
pub trait BusRepository: Send + Sync {
    /// Short name of the backing store, for logs and health output.
    fn backend(&self) -> &'static str;

    /// Fetches one bus by license number.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store fails.
    async fn get(&self, license_no: &str) -> Result<Option<BusRecord>, DbError>;

    /// Lists up to `limit` buses, resuming after `last_key` if given.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store fails.
    async fn list(&self, limit: usize, last_key: Option<&str>) -> Result<ListPage, DbError>;

    /// Stores a new bus.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if the license number is taken.
    async fn create(&self, bus: &BusRecord) -> Result<(), DbError>;

    /// Overwrites the patched fields of an existing bus and returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the bus doesn't exist and
    /// [`DbError::InvalidPatch`] if the patch doesn't fit the schema.
    async fn update(&self, license_no: &str, patch: &BusPatch) -> Result<BusRecord, DbError>;

    /// Adds one to the legacy `verifiedVotes` counter.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the bus doesn't exist.
    async fn increment_legacy_votes(&self, license_no: &str) -> Result<BusRecord, DbError>;

    /// Returns up to `limit` buses in store order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store fails.
    async fn scan_all(&self, limit: usize) -> Result<Vec<BusRecord>, DbError>;

    /// Returns buses whose indexed attribute equals `value` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the index is unavailable or the query
    /// fails.
    async fn query_by_index(&self, index: BusIndex, value: &str)
    -> Result<Vec<BusRecord>, DbError>;

    /// Returns the caller's current vote on a bus, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Store`] if the store fails.
    async fn get_vote(&self, license_no: &str, user_email: &str)
    -> Result<Option<VoteType>, DbError>;

    /// Casts a vote, toggling or switching the caller's existing vote.
    ///
    /// Performs two writes without a transaction: the vote record is
    /// upserted or deleted, then the bus counters are adjusted (floored at
    /// zero). Concurrent votes by the same user are last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the bus doesn't exist.
    async fn apply_vote(
        &self,
        license_no: &str,
        user_email: &str,
        vote: VoteType,
    ) -> Result<VoteOutcome, DbError>;
}

pub use config::{StoreBackend, StoreConfig};
pub use db::{connect, connect_from_env};
