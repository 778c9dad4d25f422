//! Device record and patch types shared across the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A device row as stored in the remote `devices` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    /// Controlling account
    #[serde(rename = "user_id")]
    pub owner: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Raw type tag; unknown tags fall back to name-based classification
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub power_status: bool,
    /// Instantaneous draw in kW (display gauge, not accumulated)
    #[serde(default, deserialize_with = "null_as_zero")]
    pub current_consumption: f64,
    /// Accumulated kWh since the last daily reset
    #[serde(default, deserialize_with = "null_as_zero")]
    pub daily_usage: f64,
    /// Accumulated kWh since the last monthly reset
    #[serde(default, deserialize_with = "null_as_zero")]
    pub monthly_usage: f64,
    #[serde(default)]
    pub daily_limit: Option<f64>,
    #[serde(default)]
    pub weekly_limit: Option<f64>,
    #[serde(default)]
    pub monthly_limit: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Device {
    /// Fresh device with zeroed accumulators, powered off
    pub fn new(id: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner: owner.into(),
            name: name.into(),
            device_type: None,
            power_status: false,
            current_consumption: 0.0,
            daily_usage: 0.0,
            monthly_usage: 0.0,
            daily_limit: None,
            weekly_limit: None,
            monthly_limit: None,
            created_at: Some(now),
            updated_at: now,
        }
    }

    pub fn with_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn powered_on(mut self) -> Self {
        self.power_status = true;
        self
    }

    pub fn with_usage(mut self, daily_kwh: f64, monthly_kwh: f64) -> Self {
        self.daily_usage = daily_kwh;
        self.monthly_usage = monthly_kwh;
        self
    }

    pub fn with_limit(mut self, period: LimitPeriod, amount: f64) -> Self {
        *self.limit_slot(period) = Some(amount);
        self
    }

    /// The configured ceiling for a period, if it is a usable positive amount
    pub fn limit(&self, period: LimitPeriod) -> Option<f64> {
        let raw = match period {
            LimitPeriod::Daily => self.daily_limit,
            LimitPeriod::Weekly => self.weekly_limit,
            LimitPeriod::Monthly => self.monthly_limit,
        };
        raw.filter(|amount| amount.is_finite() && *amount > 0.0)
    }

    fn limit_slot(&mut self, period: LimitPeriod) -> &mut Option<f64> {
        match period {
            LimitPeriod::Daily => &mut self.daily_limit,
            LimitPeriod::Weekly => &mut self.weekly_limit,
            LimitPeriod::Monthly => &mut self.monthly_limit,
        }
    }
}

/// Consumption class a device is simulated as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Heater,
    Fridge,
    Tv,
    Light,
    Computer,
    AirConditioner,
    Washer,
    WaterHeater,
    Fan,
    Kitchen,
    Default,
}

impl DeviceType {
    pub const ALL: [DeviceType; 11] = [
        DeviceType::Heater,
        DeviceType::Fridge,
        DeviceType::Tv,
        DeviceType::Light,
        DeviceType::Computer,
        DeviceType::AirConditioner,
        DeviceType::Washer,
        DeviceType::WaterHeater,
        DeviceType::Fan,
        DeviceType::Kitchen,
        DeviceType::Default,
    ];

    /// Parse a stored type tag. Separators and case are ignored.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();

        let device_type = match normalized.as_str() {
            "heater" => DeviceType::Heater,
            "fridge" | "refrigerator" => DeviceType::Fridge,
            "tv" | "television" => DeviceType::Tv,
            "light" | "lamp" => DeviceType::Light,
            "computer" | "pc" => DeviceType::Computer,
            "air conditioner" | "ac" => DeviceType::AirConditioner,
            "washer" | "washing machine" => DeviceType::Washer,
            "water heater" => DeviceType::WaterHeater,
            "fan" => DeviceType::Fan,
            "kitchen" => DeviceType::Kitchen,
            "default" => DeviceType::Default,
            _ => return None,
        };
        Some(device_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Heater => "heater",
            DeviceType::Fridge => "fridge",
            DeviceType::Tv => "tv",
            DeviceType::Light => "light",
            DeviceType::Computer => "computer",
            DeviceType::AirConditioner => "air_conditioner",
            DeviceType::Washer => "washer",
            DeviceType::WaterHeater => "water_heater",
            DeviceType::Fan => "fan",
            DeviceType::Kitchen => "kitchen",
            DeviceType::Default => "default",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost ceiling period. `ORDER` is also the shutoff precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl LimitPeriod {
    pub const ORDER: [LimitPeriod; 3] = [LimitPeriod::Daily, LimitPeriod::Weekly, LimitPeriod::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitPeriod::Daily => "daily",
            LimitPeriod::Weekly => "weekly",
            LimitPeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limits a reset clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReset {
    Period(LimitPeriod),
    All,
}

/// Partial update of a device row.
///
/// Limit fields are tri-state: `None` leaves the column alone, `Some(None)`
/// clears it, `Some(Some(x))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_consumption: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_limit: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceUpdate {
    /// Patch that only refreshes `updated_at`
    pub fn touched() -> Self {
        Self {
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn set_limit(&mut self, period: LimitPeriod, value: Option<f64>) {
        match period {
            LimitPeriod::Daily => self.daily_limit = Some(value),
            LimitPeriod::Weekly => self.weekly_limit = Some(value),
            LimitPeriod::Monthly => self.monthly_limit = Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this patch to a local copy of the row
    pub fn apply_to(&self, device: &mut Device) {
        if let Some(name) = &self.name {
            device.name = name.clone();
        }
        if let Some(power_status) = self.power_status {
            device.power_status = power_status;
        }
        if let Some(current) = self.current_consumption {
            device.current_consumption = current;
        }
        if let Some(daily) = self.daily_usage {
            device.daily_usage = daily;
        }
        if let Some(monthly) = self.monthly_usage {
            device.monthly_usage = monthly;
        }
        if let Some(limit) = self.daily_limit {
            device.daily_limit = limit;
        }
        if let Some(limit) = self.weekly_limit {
            device.weekly_limit = limit;
        }
        if let Some(limit) = self.monthly_limit {
            device.monthly_limit = limit;
        }
        if let Some(updated_at) = self.updated_at {
            device.updated_at = updated_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_tags() {
        assert_eq!(DeviceType::from_tag("Air-Conditioner"), Some(DeviceType::AirConditioner));
        assert_eq!(DeviceType::from_tag("washing machine"), Some(DeviceType::Washer));
        assert_eq!(DeviceType::from_tag("water_heater"), Some(DeviceType::WaterHeater));
        assert_eq!(DeviceType::from_tag("refrigerator"), Some(DeviceType::Fridge));
        assert_eq!(DeviceType::from_tag("toaster"), None);

        for device_type in DeviceType::ALL {
            assert_eq!(DeviceType::from_tag(device_type.as_str()), Some(device_type));
        }
    }

    #[test]
    fn test_non_positive_limits_are_unset() {
        let mut device = Device::new("d1", "u1", "Lamp");
        device.daily_limit = Some(0.0);
        device.weekly_limit = Some(-3.0);
        device.monthly_limit = Some(f64::NAN);
        for period in LimitPeriod::ORDER {
            assert_eq!(device.limit(period), None);
        }

        let device = device.with_limit(LimitPeriod::Weekly, 12.5);
        assert_eq!(device.limit(LimitPeriod::Weekly), Some(12.5));
    }

    #[test]
    fn test_null_usage_deserializes_to_zero() {
        let json = r#"{
            "id": "d1",
            "user_id": "u1",
            "name": "Office PC",
            "device_type": null,
            "power_status": true,
            "current_consumption": null,
            "daily_usage": null,
            "monthly_usage": 4.25,
            "daily_limit": null,
            "weekly_limit": 30.0,
            "monthly_limit": null,
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;

        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.owner, "u1");
        assert_eq!(device.daily_usage, 0.0);
        assert_eq!(device.current_consumption, 0.0);
        assert!((device.monthly_usage - 4.25).abs() < 1e-9);
        assert_eq!(device.weekly_limit, Some(30.0));
        assert_eq!(device.created_at, None);
    }

    #[test]
    fn test_null_name_and_power_status_use_defaults() {
        let json = r#"[
            {"id": "d1", "user_id": "u1", "name": null, "power_status": null, "updated_at": "2024-03-01T10:00:00Z"},
            {"id": "d2", "user_id": "u1", "name": "Fan", "power_status": true, "updated_at": "2024-03-01T10:00:00Z"}
        ]"#;

        let devices: Vec<Device> = serde_json::from_str(json).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "");
        assert!(!devices[0].power_status);
        assert_eq!(devices[1].name, "Fan");
        assert!(devices[1].power_status);
    }

    #[test]
    fn test_update_serializes_cleared_limit_as_null() {
        let mut patch = DeviceUpdate {
            power_status: Some(false),
            ..Default::default()
        };
        patch.set_limit(LimitPeriod::Daily, None);

        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["power_status"], serde_json::json!(false));
        assert!(value["daily_limit"].is_null());
        assert!(value.get("daily_limit").is_some());
        assert!(value.get("monthly_limit").is_none());
        assert!(value.get("daily_usage").is_none());
    }

    #[test]
    fn test_apply_patch() {
        let mut device = Device::new("d1", "u1", "Heater")
            .with_limit(LimitPeriod::Monthly, 50.0)
            .powered_on();

        let mut patch = DeviceUpdate::touched();
        patch.power_status = Some(false);
        patch.daily_usage = Some(1.5);
        patch.set_limit(LimitPeriod::Monthly, None);
        patch.apply_to(&mut device);

        assert!(!device.power_status);
        assert_eq!(device.daily_usage, 1.5);
        assert_eq!(device.monthly_limit, None);
        assert!(DeviceUpdate::default().is_empty());
        assert!(!patch.is_empty());
    }
}
