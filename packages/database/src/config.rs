//! Store selection from environment variables.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BUS_STORE` | auto | `dynamodb` or `memory` |
//! | `BUS_TABLE_NAME` | unset | Bus table; its presence selects `DynamoDB` in auto mode |
//! | `VOTES_TABLE_NAME` | `bus_votes` | Vote table |
//! | `DYNAMODB_ENDPOINT` | unset | Endpoint override, e.g. `DynamoDB` Local |
//! | `AWS_REGION` | `ap-south-1` | AWS region |
//! | `SEED_FILE` | unset | JSON array of buses loaded into the memory store |

use std::path::PathBuf;

use strum_macros::{AsRefStr, Display, EnumString};

use crate::DbError;

/// Default vote table name.
pub const DEFAULT_VOTES_TABLE: &str = "bus_votes";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Which repository implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    /// In-process store for local development.
    Memory,
    /// `DynamoDB` tables.
    #[strum(to_string = "dynamodb", serialize = "dynamo")]
    DynamoDb,
}

/// Resolved store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: StoreBackend,
    /// Bus table (required for `DynamoDB`).
    pub bus_table: Option<String>,
    /// Vote table.
    pub votes_table: String,
    /// Endpoint override.
    pub endpoint: Option<String>,
    /// AWS region.
    pub region: String,
    /// Seed file for the memory store.
    pub seed_file: Option<PathBuf>,
}

impl StoreConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if `BUS_STORE` is unrecognized or
    /// `DynamoDB` is requested without `BUS_TABLE_NAME`.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, treating blank values as
    /// unset.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bus_table = get("BUS_TABLE_NAME");

        let backend = match get("BUS_STORE") {
            Some(name) => name.parse().map_err(|_| DbError::Config {
                message: format!("Unknown BUS_STORE: {name}. Use 'dynamodb' or 'memory'."),
            })?,
            None if bus_table.is_some() => StoreBackend::DynamoDb,
            None => StoreBackend::Memory,
        };

        if backend == StoreBackend::DynamoDb && bus_table.is_none() {
            return Err(DbError::Config {
                message: "BUS_TABLE_NAME must be set to use the dynamodb store".to_string(),
            });
        }

        Ok(Self {
            backend,
            bus_table,
            votes_table: get("VOTES_TABLE_NAME").unwrap_or_else(|| DEFAULT_VOTES_TABLE.to_string()),
            endpoint: get("DYNAMODB_ENDPOINT"),
            region: get("AWS_REGION")
                .or_else(|| get("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            seed_file: get("SEED_FILE").map(PathBuf::from),
        })
    }
}
