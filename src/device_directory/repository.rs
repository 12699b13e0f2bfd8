//! File persistence for registered devices
//!
//! Devices are stored as a single JSON document. Writes go to a temp file
//! first and are renamed into place, so a crash mid-write never corrupts
//! the registry.

use std::path::PathBuf;

use crate::device_directory::Device;
use crate::error::Result;

/// Loads and saves the device registry document
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    path: PathBuf,
}

impl DeviceRepository {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load all devices; a missing file yields an empty registry
    pub async fn load(&self) -> Result<Vec<Device>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let devices: Vec<Device> = serde_json::from_slice(&bytes)?;
                tracing::info!(
                    path = %self.path.display(),
                    count = devices.len(),
                    "Device registry loaded"
                );
                Ok(devices)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No device registry file, starting empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist all devices
    pub async fn save(&self, devices: &[Device]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(devices)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(
            path = %self.path.display(),
            count = devices.len(),
            "Device registry saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_directory::DeviceTemplates;
    use chrono::Utc;

    #[tokio::test]
    async fn test_load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DeviceRepository::new(dir.path().join("devices.json"));
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DeviceRepository::new(dir.path().join("devices.json"));

        let devices = vec![Device {
            device_id: "d1".to_string(),
            push_token: "ExponentPushToken[abc]".to_string(),
            templates: DeviceTemplates::default(),
            registered_at: Utc::now(),
            updated_at: Utc::now(),
        }];
        repo.save(&devices).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].device_id, "d1");
        assert_eq!(loaded[0].push_token, "ExponentPushToken[abc]");
    }
}
