//! Configuration management

use crate::core::{DeviceType, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        let app_config_dir = config_dir.join("plugsave");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir)?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    /// Load configuration from disk, writing defaults on first run
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration document without touching disk
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.tariff.validate()?;
        self.simulation.validate()?;
        if self.store.backend == StoreBackend::Rest && self.store.rest_url.trim().is_empty() {
            return Err(Error::Config("store.rest_url is required for the rest backend".to_string()));
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Authenticated account the simulator runs for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Owner id; empty means no active session
    #[serde(default)]
    pub owner_id: String,
}

/// Which device store backs the simulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
    Rest,
}

/// Device store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite file; defaults to the per-user data directory
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Base URL of the hosted backend (without `/rest/v1`)
    #[serde(default)]
    pub rest_url: String,
    /// Public API key sent as `apikey`
    #[serde(default)]
    pub api_key: String,
    /// User access token; falls back to the API key when absent
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String { "devices".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: None,
            rest_url: String::new(),
            api_key: String::new(),
            access_token: None,
            table: default_table(),
        }
    }
}

impl StoreConfig {
    /// Resolve the SQLite path, creating the data directory if needed
    pub fn resolve_sqlite_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.sqlite_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;

        let app_dir = data_dir.join("plugsave");
        fs::create_dir_all(&app_dir)?;

        Ok(app_dir.join("devices.db"))
    }
}

/// One band of the progressive tariff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    /// Upper bound of the band in kWh; `None` is unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_kwh: Option<f64>,
    /// Marginal rate in currency per kWh
    pub rate: f64,
}

impl Tier {
    pub const fn bounded(max_kwh: f64, rate: f64) -> Self {
        Self { max_kwh: Some(max_kwh), rate }
    }

    pub const fn unbounded(rate: f64) -> Self {
        Self { max_kwh: None, rate }
    }

    /// Upper bound as a number (infinity when unbounded)
    pub fn ceiling(&self) -> f64 {
        self.max_kwh.unwrap_or(f64::INFINITY)
    }
}

/// Residential progressive tariff (SAR per kWh)
pub const DEFAULT_TIERS: [Tier; 4] = [
    Tier::bounded(2000.0, 0.18),
    Tier::bounded(4000.0, 0.24),
    Tier::bounded(6000.0, 0.30),
    Tier::unbounded(0.32),
];

/// Tariff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// Tiers in ascending order of `max_kwh`
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,
}

fn default_currency() -> String { "SAR".to_string() }
fn default_currency_symbol() -> String { "SAR".to_string() }
fn default_tiers() -> Vec<Tier> { DEFAULT_TIERS.to_vec() }

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            currency_symbol: default_currency_symbol(),
            tiers: default_tiers(),
        }
    }
}

impl TariffConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(Error::Config("tariff.tiers must not be empty".to_string()));
        }

        let mut previous = 0.0;
        for (index, tier) in self.tiers.iter().enumerate() {
            if !tier.rate.is_finite() || tier.rate <= 0.0 {
                return Err(Error::Config(format!("tariff tier {} has a non-positive rate", index + 1)));
            }
            match tier.max_kwh {
                Some(max) if !max.is_finite() || max <= previous => {
                    return Err(Error::Config(format!(
                        "tariff tier {} bound {} must exceed {}",
                        index + 1,
                        max,
                        previous
                    )));
                }
                Some(max) => previous = max,
                None if index + 1 != self.tiers.len() => {
                    return Err(Error::Config("only the last tariff tier may be unbounded".to_string()));
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// Hourly draw range of a device class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassRange {
    pub class: DeviceType,
    pub min_kw: f64,
    pub max_kw: f64,
}

impl ClassRange {
    const fn new(class: DeviceType, min_kw: f64, max_kw: f64) -> Self {
        Self { class, min_kw, max_kw }
    }
}

/// Name keywords that select a class; rules are tried in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub class: DeviceType,
}

impl KeywordRule {
    fn new(keywords: &[&str], class: DeviceType) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            class,
        }
    }
}

/// Consumption simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tick cadence in milliseconds
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Delay before the first tick after start-up
    #[serde(default = "default_startup_delay")]
    pub startup_delay_ms: u64,
    /// Speeds up steady-state increments so they are visible on screen
    #[serde(default = "default_visibility_multiplier")]
    pub visibility_multiplier: f64,
    /// Same, for the reduced increment of brand-new devices
    #[serde(default = "default_bootstrap_multiplier")]
    pub bootstrap_multiplier: f64,
    /// Lower end of the bootstrap fraction of the class minimum
    #[serde(default = "default_bootstrap_min_fraction")]
    pub bootstrap_min_fraction: f64,
    /// Random spread added on top of `bootstrap_min_fraction`
    #[serde(default = "default_bootstrap_fraction_spread")]
    pub bootstrap_fraction_spread: f64,
    /// Relative jitter applied to steady-state draw (0.2 = ±20%)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Devices with both accumulators below this are treated as new
    #[serde(default = "default_new_device_epsilon")]
    pub new_device_epsilon: f64,
    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_classes")]
    pub classes: Vec<ClassRange>,
    #[serde(default = "default_keyword_rules")]
    pub keyword_rules: Vec<KeywordRule>,
}

fn default_true() -> bool { true }
fn default_interval() -> u64 { 2000 }
fn default_startup_delay() -> u64 { 2000 }
fn default_visibility_multiplier() -> f64 { 500.0 }
fn default_bootstrap_multiplier() -> f64 { 50.0 }
fn default_bootstrap_min_fraction() -> f64 { 0.15 }
fn default_bootstrap_fraction_spread() -> f64 { 0.05 }
fn default_jitter() -> f64 { 0.2 }
fn default_new_device_epsilon() -> f64 { 0.01 }

fn default_classes() -> Vec<ClassRange> {
    vec![
        ClassRange::new(DeviceType::Default, 0.05, 0.2),
        ClassRange::new(DeviceType::Tv, 0.1, 0.3),
        ClassRange::new(DeviceType::Fridge, 0.05, 0.15),
        ClassRange::new(DeviceType::AirConditioner, 0.8, 1.5),
        ClassRange::new(DeviceType::Computer, 0.1, 0.4),
        ClassRange::new(DeviceType::Light, 0.01, 0.06),
        ClassRange::new(DeviceType::Washer, 0.4, 0.8),
        ClassRange::new(DeviceType::Heater, 1.0, 2.0),
        ClassRange::new(DeviceType::WaterHeater, 1.0, 1.5),
        ClassRange::new(DeviceType::Fan, 0.03, 0.07),
        ClassRange::new(DeviceType::Kitchen, 0.2, 0.5),
    ]
}

fn default_keyword_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(&["heater", "boiler"], DeviceType::Heater),
        KeywordRule::new(&["fridge", "refrigerator"], DeviceType::Fridge),
        KeywordRule::new(&["tv", "television"], DeviceType::Tv),
        KeywordRule::new(&["light", "lamp"], DeviceType::Light),
        KeywordRule::new(&["pc", "computer"], DeviceType::Computer),
    ]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval(),
            startup_delay_ms: default_startup_delay(),
            visibility_multiplier: default_visibility_multiplier(),
            bootstrap_multiplier: default_bootstrap_multiplier(),
            bootstrap_min_fraction: default_bootstrap_min_fraction(),
            bootstrap_fraction_spread: default_bootstrap_fraction_spread(),
            jitter: default_jitter(),
            new_device_epsilon: default_new_device_epsilon(),
            seed: None,
            classes: default_classes(),
            keyword_rules: default_keyword_rules(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config("simulation.interval_ms must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::Config("simulation.jitter must be in [0, 1)".to_string()));
        }

        let non_negative = [
            ("visibility_multiplier", self.visibility_multiplier),
            ("bootstrap_multiplier", self.bootstrap_multiplier),
            ("bootstrap_min_fraction", self.bootstrap_min_fraction),
            ("bootstrap_fraction_spread", self.bootstrap_fraction_spread),
            ("new_device_epsilon", self.new_device_epsilon),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("simulation.{} must be a non-negative number", name)));
            }
        }

        for range in &self.classes {
            if !(range.min_kw >= 0.0 && range.min_kw <= range.max_kw && range.max_kw.is_finite()) {
                return Err(Error::Config(format!(
                    "class {} has an invalid range {}..{}",
                    range.class, range.min_kw, range.max_kw
                )));
            }
        }
        Ok(())
    }
}
