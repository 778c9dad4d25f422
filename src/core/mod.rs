//! Core module - Configuration, errors, and the device record types

mod config;
mod error;
mod types;

pub use config::{
    ClassRange, Config, GeneralConfig, KeywordRule, SessionConfig, SimulationConfig, StoreBackend,
    StoreConfig, TariffConfig, Tier, DEFAULT_TIERS,
};
pub use error::{Error, Result};
pub use types::{Device, DeviceType, DeviceUpdate, LimitPeriod, LimitReset};
