//! ConfigStore - runtime filter configuration
//!
//! ## Responsibilities
//!
//! - Hold the active `FilterConfig`
//! - Hand out cheap snapshots for per-message evaluation
//! - Persist updates from the control plane
//!
//! All configuration reads and writes go through here; no other module
//! stores filter settings locally.

mod repository;

pub use repository::ConfigRepository;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::filter::FilterConfig;

/// ConfigStore instance
pub struct ConfigStore {
    repository: ConfigRepository,
    /// In-memory cache for frequent reads
    cache: RwLock<FilterConfig>,
}

impl ConfigStore {
    /// Create the store, loading persisted config
    pub async fn new(repository: ConfigRepository) -> Result<Self> {
        let config = repository.load().await?;
        Ok(Self {
            repository,
            cache: RwLock::new(config),
        })
    }

    /// Current config snapshot; the filter evaluator runs lock-free over it
    pub async fn snapshot(&self) -> FilterConfig {
        self.cache.read().await.clone()
    }

    /// Replace the config and persist it
    pub async fn update(&self, config: FilterConfig) -> Result<()> {
        self.repository.save(&config).await?;
        let mut cache = self.cache.write().await;
        *cache = config;
        tracing::info!("Filter config updated");
        Ok(())
    }
}
