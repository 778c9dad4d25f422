//! In-process device store

use crate::core::{Device, DeviceUpdate, Error, Result};
use crate::store::DeviceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Add or replace a device row
    pub async fn insert(&self, device: Device) {
        self.devices.write().await.insert(device.id.clone(), device);
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Device>> {
        let devices = self.devices.read().await;
        let mut owned: Vec<Device> = devices.values().filter(|d| d.owner == owner).cloned().collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn get(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.devices.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: &DeviceUpdate) -> Result<()> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("device {}", id)))?;
        patch.apply_to(device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let store = MemoryDeviceStore::with_devices([
            Device::new("a", "u1", "TV"),
            Device::new("b", "u2", "Fridge"),
            Device::new("c", "u1", "Lamp"),
        ]);

        let owned = store.list_by_owner("u1").await.unwrap();
        let ids: Vec<_> = owned.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a") && ids.contains(&"c"));
        assert!(store.list_by_owner("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let store = MemoryDeviceStore::new();
        store.insert(Device::new("a", "u1", "TV").powered_on()).await;

        let patch = DeviceUpdate {
            power_status: Some(false),
            daily_usage: Some(2.5),
            ..DeviceUpdate::touched()
        };
        store.update("a", &patch).await.unwrap();

        let device = store.get("a").await.unwrap().unwrap();
        assert!(!device.power_status);
        assert_eq!(device.daily_usage, 2.5);
    }

    #[tokio::test]
    async fn test_update_missing_device() {
        let store = MemoryDeviceStore::new();
        let result = store.update("ghost", &DeviceUpdate::touched()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
    }
}
