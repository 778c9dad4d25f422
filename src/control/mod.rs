//! Manual device actions: power toggle, cost limits, rename

use crate::core::{Device, DeviceUpdate, Error, LimitPeriod, LimitReset, Result};
use crate::pricing::{DeviceCostSummary, TariffCalculator};
use crate::store::{DeviceStore, SessionProvider};
use std::sync::Arc;

/// Owner-checked actions on single devices
pub struct DeviceController {
    store: Arc<dyn DeviceStore>,
    session: Arc<dyn SessionProvider>,
    tariff: TariffCalculator,
}

impl DeviceController {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        session: Arc<dyn SessionProvider>,
        tariff: TariffCalculator,
    ) -> Self {
        Self { store, session, tariff }
    }

    /// Fetch a device the current session is allowed to control
    async fn owned_device(&self, device_id: &str) -> Result<Device> {
        let owner = self.session.current_owner().ok_or(Error::NotAuthenticated)?;

        let device = self
            .store
            .get(device_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("device {}", device_id)))?;

        if device.owner != owner {
            return Err(Error::PermissionDenied(format!(
                "device {} belongs to another account",
                device_id
            )));
        }

        Ok(device)
    }

    /// Flip the power state; returns the new state
    pub async fn toggle_power(&self, device_id: &str) -> Result<bool> {
        let device = self.owned_device(device_id).await?;
        let powered = !device.power_status;

        let mut patch = DeviceUpdate::touched();
        patch.power_status = Some(powered);
        if !powered {
            patch.current_consumption = Some(0.0);
        }
        self.store.update(device_id, &patch).await?;

        log::info!("Device {} turned {}", device.name, if powered { "on" } else { "off" });
        Ok(powered)
    }

    /// Set a positive cost ceiling for one period
    pub async fn set_limit(&self, device_id: &str, period: LimitPeriod, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidInput(
                "cost limit must be a positive number".to_string(),
            ));
        }

        self.owned_device(device_id).await?;

        let mut patch = DeviceUpdate::touched();
        patch.set_limit(period, Some(amount));
        self.store.update(device_id, &patch).await?;

        log::info!(
            "{} limit for device {} set to {} {}",
            period,
            device_id,
            amount,
            self.tariff.currency()
        );
        Ok(())
    }

    /// Clear one or all cost ceilings
    pub async fn reset_limits(&self, device_id: &str, reset: LimitReset) -> Result<()> {
        self.owned_device(device_id).await?;

        let mut patch = DeviceUpdate::touched();
        match reset {
            LimitReset::Period(period) => patch.set_limit(period, None),
            LimitReset::All => {
                for period in LimitPeriod::ORDER {
                    patch.set_limit(period, None);
                }
            }
        }
        self.store.update(device_id, &patch).await?;
        Ok(())
    }

    pub async fn rename(&self, device_id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("device name must not be empty".to_string()));
        }

        self.owned_device(device_id).await?;

        let mut patch = DeviceUpdate::touched();
        patch.name = Some(name.to_string());
        self.store.update(device_id, &patch).await
    }

    /// Tariff rate and period costs for a device
    pub async fn summary(&self, device_id: &str) -> Result<DeviceCostSummary> {
        let device = self.owned_device(device_id).await?;
        Ok(self.tariff.summarize(&device))
    }
}
