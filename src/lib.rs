//! Plug&Save library
//!
//! Tiered tariff pricing, device stores, and the consumption simulator
//! shared by the daemon and the demo binary.

pub mod control;
pub mod core;
pub mod pricing;
pub mod simulation;
pub mod store;
