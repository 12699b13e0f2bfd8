//! File persistence for the runtime filter configuration

use std::path::PathBuf;

use crate::error::Result;
use crate::filter::FilterConfig;

/// Loads and saves the filter config document
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    path: PathBuf,
}

impl ConfigRepository {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the config; a missing file yields defaults
    pub async fn load(&self) -> Result<FilterConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let config: FilterConfig = serde_json::from_slice(&bytes)?;
                tracing::info!(path = %self.path.display(), "Filter config loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No filter config file, using defaults");
                Ok(FilterConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the config
    pub async fn save(&self, config: &FilterConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(config)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "Filter config saved");
        Ok(())
    }
}
