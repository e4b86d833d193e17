//! Repository connection utilities.

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::dynamo::DynamoRepository;
use crate::memory::MemoryRepository;
use crate::{BusRepository, DbError};

/// Opens the repository selected by `config`.
///
/// The memory store is seeded from `config.seed_file` when one is set.
///
/// # Errors
///
/// Returns an error if the `DynamoDB` client can't be configured or the
/// seed file can't be loaded.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn BusRepository>, DbError> {
    match config.backend {
        StoreBackend::DynamoDb => {
            let repo = DynamoRepository::connect(config).await?;
            log::info!(
                "Using dynamodb store (buses: {}, votes: {}, region: {})",
                config.bus_table.as_deref().unwrap_or_default(),
                config.votes_table,
                config.region,
            );
            Ok(Arc::new(repo))
        }
        StoreBackend::Memory => {
            let repo = match &config.seed_file {
                Some(path) => MemoryRepository::from_seed_file(path)?,
                None => MemoryRepository::new(),
            };
            log::warn!("Using in-memory store; data will not survive a restart");
            Ok(Arc::new(repo))
        }
    }
}

/// Opens the repository configured by the process environment.
///
/// # Errors
///
/// See [`connect`] and [`StoreConfig::from_env`].
pub async fn connect_from_env() -> Result<Arc<dyn BusRepository>, DbError> {
    connect(&StoreConfig::from_env()?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_connects_empty() {
        let config = StoreConfig::from_lookup(|_| None).unwrap();
        let repo = connect(&config).await.unwrap();
        assert_eq!(repo.backend(), "memory");
        assert!(repo.scan_all(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_seed_file_is_an_error() {
        let config = StoreConfig::from_lookup(|key| {
            (key == "SEED_FILE").then(|| "/nonexistent/buses.json".to_string())
        })
        .unwrap();
        assert!(matches!(connect(&config).await, Err(DbError::Io(_))));
    }
}
