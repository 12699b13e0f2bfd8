//! Device Directory
//!
//! Registry of mobile devices that receive notifications: push token plus
//! per-device title/body templates. Mutations persist through the JSON file
//! repository; the in-memory map is authoritative at runtime.

mod repository;

pub use repository::DeviceRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Per-device notification templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTemplates {
    pub title_template: String,
    pub body_template: String,
}

impl Default for DeviceTemplates {
    fn default() -> Self {
        Self {
            title_template: "{label} detected on {camera}".to_string(),
            body_template: "Motion in {zones} at {time}".to_string(),
        }
    }
}

/// A registered device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub push_token: String,
    #[serde(default)]
    pub templates: DeviceTemplates,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub push_token: String,
    pub templates: Option<DeviceTemplates>,
}

/// Device registry with JSON file persistence
pub struct DeviceDirectory {
    devices: RwLock<HashMap<String, Device>>,
    repository: DeviceRepository,
}

impl DeviceDirectory {
    /// Create the directory, loading persisted devices
    pub async fn new(repository: DeviceRepository) -> Result<Self> {
        let loaded = repository.load().await?;
        let devices = loaded
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        Ok(Self {
            devices: RwLock::new(devices),
            repository,
        })
    }

    /// Register a device; an existing token is updated in place (upsert)
    pub async fn register(&self, request: RegisterDeviceRequest) -> Result<Device> {
        if request.push_token.trim().is_empty() {
            return Err(Error::Validation("push_token must not be empty".to_string()));
        }

        let now = Utc::now();
        let mut devices = self.devices.write().await;

        let device = if let Some(existing) = devices
            .values_mut()
            .find(|d| d.push_token == request.push_token)
        {
            if let Some(templates) = request.templates {
                existing.templates = templates;
            }
            existing.updated_at = now;
            existing.clone()
        } else {
            let device = Device {
                device_id: Uuid::new_v4().to_string(),
                push_token: request.push_token,
                templates: request.templates.unwrap_or_default(),
                registered_at: now,
                updated_at: now,
            };
            devices.insert(device.device_id.clone(), device.clone());
            tracing::info!(device_id = %device.device_id, "Device registered");
            device
        };

        self.persist(&devices).await?;
        Ok(device)
    }

    /// Remove a device by id
    pub async fn remove(&self, device_id: &str) -> Result<()> {
        let mut devices = self.devices.write().await;
        if devices.remove(device_id).is_none() {
            return Err(Error::NotFound(format!("device {}", device_id)));
        }
        tracing::info!(device_id = %device_id, "Device removed");
        self.persist(&devices).await
    }

    /// Update a device's templates
    pub async fn update_templates(
        &self,
        device_id: &str,
        templates: DeviceTemplates,
    ) -> Result<Device> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| Error::NotFound(format!("device {}", device_id)))?;
        device.templates = templates;
        device.updated_at = Utc::now();
        let updated = device.clone();
        self.persist(&devices).await?;
        Ok(updated)
    }

    /// All registered devices
    pub async fn list_all(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Lookup one device
    pub async fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// Number of registered devices
    pub async fn count(&self) -> usize {
        self.devices.read().await.len()
    }

    async fn persist(&self, devices: &HashMap<String, Device>) -> Result<()> {
        let all: Vec<Device> = devices.values().cloned().collect();
        self.repository.save(&all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn directory() -> (DeviceDirectory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repo = DeviceRepository::new(dir.path().join("devices.json"));
        (DeviceDirectory::new(repo).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let (directory, _guard) = directory().await;
        let device = directory
            .register(RegisterDeviceRequest {
                push_token: "ExponentPushToken[abc]".to_string(),
                templates: None,
            })
            .await
            .unwrap();

        assert_eq!(device.templates, DeviceTemplates::default());
        assert_eq!(directory.count().await, 1);
        assert_eq!(directory.list_all().await[0].device_id, device.device_id);
    }

    #[tokio::test]
    async fn test_register_same_token_upserts() {
        let (directory, _guard) = directory().await;
        let first = directory
            .register(RegisterDeviceRequest {
                push_token: "tok".to_string(),
                templates: None,
            })
            .await
            .unwrap();
        let second = directory
            .register(RegisterDeviceRequest {
                push_token: "tok".to_string(),
                templates: Some(DeviceTemplates {
                    title_template: "custom".to_string(),
                    body_template: "body".to_string(),
                }),
            })
            .await
            .unwrap();

        assert_eq!(first.device_id, second.device_id);
        assert_eq!(directory.count().await, 1);
        assert_eq!(second.templates.title_template, "custom");
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let (directory, _guard) = directory().await;
        let result = directory
            .register(RegisterDeviceRequest {
                push_token: "  ".to_string(),
                templates: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remove_and_not_found() {
        let (directory, _guard) = directory().await;
        let device = directory
            .register(RegisterDeviceRequest {
                push_token: "tok".to_string(),
                templates: None,
            })
            .await
            .unwrap();

        directory.remove(&device.device_id).await.unwrap();
        assert_eq!(directory.count().await, 0);
        assert!(directory.remove(&device.device_id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_templates() {
        let (directory, _guard) = directory().await;
        let device = directory
            .register(RegisterDeviceRequest {
                push_token: "tok".to_string(),
                templates: None,
            })
            .await
            .unwrap();

        let updated = directory
            .update_templates(
                &device.device_id,
                DeviceTemplates {
                    title_template: "t".to_string(),
                    body_template: "b".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.templates.title_template, "t");
    }

    #[tokio::test]
    async fn test_persistence_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        {
            let directory = DeviceDirectory::new(DeviceRepository::new(path.clone()))
                .await
                .unwrap();
            directory
                .register(RegisterDeviceRequest {
                    push_token: "tok".to_string(),
                    templates: None,
                })
                .await
                .unwrap();
        }

        let reloaded = DeviceDirectory::new(DeviceRepository::new(path)).await.unwrap();
        assert_eq!(reloaded.count().await, 1);
    }
}
