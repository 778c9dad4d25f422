//! SQLite-backed device store
//!
//! Keeps the `devices` table in a local file. Timestamps are stored as unix
//! milliseconds.

use crate::core::{Device, DeviceUpdate, Error, Result};
use crate::store::DeviceStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const DEVICE_COLUMNS: &str = "id, user_id, name, device_type, power_status, current_consumption,
     daily_usage, monthly_usage, daily_limit, weekly_limit, monthly_limit, created_at, updated_at";

/// Device store over a single SQLite connection
pub struct SqliteDeviceStore {
    conn: Mutex<Connection>,
}

impl SqliteDeviceStore {
    /// Open (or create) the database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("SQLite connection lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                device_type TEXT,
                power_status INTEGER NOT NULL DEFAULT 0,
                current_consumption REAL,
                daily_usage REAL,
                monthly_usage REAL,
                daily_limit REAL,
                weekly_limit REAL,
                monthly_limit REAL,
                created_at INTEGER,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id);
            "#,
        )?;

        Ok(())
    }

    /// Insert or replace a device row
    pub fn insert(&self, device: &Device) -> Result<()> {
        self.lock()?.execute(
            &format!("INSERT OR REPLACE INTO devices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)", DEVICE_COLUMNS),
            params![
                device.id,
                device.owner,
                device.name,
                device.device_type,
                device.power_status,
                device.current_consumption,
                device.daily_usage,
                device.monthly_usage,
                device.daily_limit,
                device.weekly_limit,
                device.monthly_limit,
                device.created_at.map(|t| t.timestamp_millis()),
                device.updated_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    /// Get total device count
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        Ok(count)
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Option<Device>> {
        let device = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS),
                params![id],
                device_from_row,
            )
            .optional()?;
        Ok(device)
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    let created_at: Option<i64> = row.get(11)?;
    let updated_at: i64 = row.get(12)?;

    Ok(Device {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        device_type: row.get(3)?,
        power_status: row.get(4)?,
        current_consumption: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        daily_usage: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        monthly_usage: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        daily_limit: row.get(8)?,
        weekly_limit: row.get(9)?,
        monthly_limit: row.get(10)?,
        created_at: created_at.map(millis_to_datetime),
        updated_at: millis_to_datetime(updated_at),
    })
}

#[async_trait]
impl DeviceStore for SqliteDeviceStore {
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Device>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM devices WHERE user_id = ?1 ORDER BY created_at ASC, id ASC",
            DEVICE_COLUMNS
        ))?;

        let devices = stmt
            .query_map(params![owner], device_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(devices)
    }

    async fn get(&self, id: &str) -> Result<Option<Device>> {
        let conn = self.lock()?;
        Self::get_locked(&conn, id)
    }

    async fn update(&self, id: &str, patch: &DeviceUpdate) -> Result<()> {
        let conn = self.lock()?;
        let mut device = Self::get_locked(&conn, id)?
            .ok_or_else(|| Error::NotFound(format!("device {}", id)))?;
        patch.apply_to(&mut device);

        conn.execute(
            "UPDATE devices SET name = ?1, power_status = ?2, current_consumption = ?3,
                 daily_usage = ?4, monthly_usage = ?5, daily_limit = ?6, weekly_limit = ?7,
                 monthly_limit = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                device.name,
                device.power_status,
                device.current_consumption,
                device.daily_usage,
                device.monthly_usage,
                device.daily_limit,
                device.weekly_limit,
                device.monthly_limit,
                device.updated_at.timestamp_millis(),
                id,
            ],
        )?;

        Ok(())
    }
}
