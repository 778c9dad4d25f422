//! Device record storage
//!
//! The simulator and the device controls only talk to storage through the
//! [`DeviceStore`] trait:
//! - SQLite: local file, the default backend
//! - REST: hosted `devices` table behind a PostgREST-style API
//! - Memory: tests and the demo binary
//!
//! Writes are plain patches with no version check; concurrent writers to the
//! same row resolve as last-writer-wins.

mod memory;
mod rest;
mod sqlite;

pub use memory::MemoryDeviceStore;
pub use rest::RestDeviceStore;
pub use sqlite::SqliteDeviceStore;

use crate::core::{Config, Device, DeviceUpdate, Result, StoreBackend};
use async_trait::async_trait;
use std::sync::Arc;

/// Read/update access to the `devices` collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All devices controlled by `owner`
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Device>>;

    /// A single device, if it exists
    async fn get(&self, id: &str) -> Result<Option<Device>>;

    /// Apply a partial update to one device
    async fn update(&self, id: &str, patch: &DeviceUpdate) -> Result<()>;
}

/// Identity of the authenticated account
pub trait SessionProvider: Send + Sync {
    /// Owner id of the current session, `None` when signed out
    fn current_owner(&self) -> Option<String>;
}

/// Session with a fixed owner
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    owner: Option<String>,
}

impl StaticSession {
    pub fn new(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            owner: (!owner.trim().is_empty()).then_some(owner),
        }
    }

    pub fn signed_out() -> Self {
        Self { owner: None }
    }
}

impl SessionProvider for StaticSession {
    fn current_owner(&self) -> Option<String> {
        self.owner.clone()
    }
}

/// Build the store selected in the configuration
pub fn open_configured(config: &Config) -> Result<Arc<dyn DeviceStore>> {
    let store: Arc<dyn DeviceStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = config.store.resolve_sqlite_path()?;
            log::info!("Using SQLite device store at {}", path.display());
            Arc::new(SqliteDeviceStore::open(&path)?)
        }
        StoreBackend::Rest => {
            log::info!("Using REST device store at {}", config.store.rest_url);
            Arc::new(RestDeviceStore::new(&config.store)?)
        }
        StoreBackend::Memory => {
            log::warn!("Using in-memory device store; changes are not persisted");
            Arc::new(MemoryDeviceStore::new())
        }
    };
    Ok(store)
}
