use crate::registry::ReputationRegistry;
use crate::sled_store::SledRegistryStore;
use anyhow::{Context, Result};
use repute_types::{Address, RatingPreset};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A demonstration rating applied by the bootstrap routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRating {
    pub address: Address,
    pub preset: RatingPreset,
}

/// Configuration shared by the registry service and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory for the Sled database. When absent the registry lives in memory only.
    pub storage_path: Option<PathBuf>,

    /// Address the HTTP service binds to.
    pub listen_addr: SocketAddr,

    /// Log filter (e.g. "info", "repute_registry=debug"). `RUST_LOG` takes precedence.
    pub log_level: Option<String>,

    /// Identity the bootstrap routine registers and rates as.
    pub operator_address: Option<Address>,

    /// Ratings applied by the bootstrap routine, in order.
    pub seed: Vec<SeedRating>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            log_level: None,
            operator_address: None,
            seed: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading registry config from: {:?}", path);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry config file at {:?}", path))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse registry config at {:?}", path))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Opens the registry described by this config, Sled-backed when a storage path is set.
    pub async fn open_registry(&self) -> Result<ReputationRegistry> {
        match &self.storage_path {
            Some(path) => {
                let store = SledRegistryStore::open(path)
                    .with_context(|| format!("Failed to open registry store at {:?}", path))?;
                ReputationRegistry::open(Arc::new(store))
                    .await
                    .context("Failed to restore registry state")
            }
            None => Ok(ReputationRegistry::new()),
        }
    }
}
