//! Plug&Save - Demo CLI
//!
//! Runs a handful of simulation cycles over an in-memory fleet and prints
//! usage, tariff rate, and period costs after each one.

use plugsave_lib::control::DeviceController;
use plugsave_lib::core::{Config, Device, LimitPeriod};
use plugsave_lib::simulation::{ConsumptionSimulator, DeviceOutcome, IncrementGenerator, TickOutcome};
use plugsave_lib::store::{DeviceStore, MemoryDeviceStore, StaticSession};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const OWNER: &str = "demo-user";
const CYCLES: usize = 10;
const SEED: u64 = 42;

fn demo_fleet() -> Vec<Device> {
    vec![
        Device::new("heater", OWNER, "Living Room Heater")
            .with_type("heater")
            .powered_on()
            .with_usage(3.0, 1990.0),
        Device::new("fridge", OWNER, "Kitchen Fridge").powered_on(),
        Device::new("pc", OWNER, "Office PC").powered_on().with_usage(4.9, 310.0),
        Device::new("lamp", OWNER, "Bedroom Lamp").with_usage(0.4, 12.0),
    ]
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("==============================================");
    println!("   Plug&Save - Demo CLI");
    println!("==============================================\n");

    // 1. Device store
    println!("[1/3] Seeding in-memory device store...");
    let store = Arc::new(MemoryDeviceStore::with_devices(demo_fleet()));
    let session = Arc::new(StaticSession::new(OWNER));
    println!("      Devices: {}\n", store.len().await);

    // 2. Simulator and controller
    println!("[2/3] Initializing simulator (seed {})...", SEED);
    let mut config = Config::default();
    config.simulation.enabled = true;
    let generator = IncrementGenerator::with_rng(&config.simulation, StdRng::seed_from_u64(SEED));
    let simulator = ConsumptionSimulator::with_generator(store.clone(), session.clone(), &config, generator);
    let tariff = simulator.tariff().clone();
    let controller = DeviceController::new(store.clone(), session, tariff.clone());

    controller.set_limit("pc", LimitPeriod::Daily, 0.9).await?;
    println!("      Interval: {} ms", simulator.status().interval_ms);
    println!("      Office PC daily limit: 0.90 {}\n", tariff.currency());

    // 3. Cycles
    println!("[3/3] Running {} cycles...\n", CYCLES);
    println!("-------------------------------------------------------------------------");
    println!("  Cycle | Device              | On  | Daily kWh | Monthly kWh | Rate | Monthly cost");
    println!("-------------------------------------------------------------------------");

    for cycle in 1..=CYCLES {
        let report = match simulator.force_update().await {
            TickOutcome::Completed(report) => report,
            TickOutcome::Skipped(reason) => {
                println!("  {:>5} | skipped: {:?}", cycle, reason);
                continue;
            }
        };

        for device in store.list_by_owner(OWNER).await? {
            let summary = tariff.summarize(&device);
            println!(
                "  {:>5} | {:<19} | {:<3} | {:>9.3} | {:>11.3} | {:.2} | {:>8.2} {}",
                cycle,
                device.name,
                if device.power_status { "on" } else { "off" },
                device.daily_usage,
                device.monthly_usage,
                summary.rate,
                summary.costs.monthly,
                tariff.currency()
            );

            if let Some(DeviceOutcome::ShutOff { period, limit, cost, .. }) = report.outcome_for(&device.id) {
                println!(
                    "        -> switched off: {} cost {:.3} reached limit {:.2}",
                    period, cost, limit
                );
            }
        }
        println!("-------------------------------------------------------------------------");
    }

    // Summary
    let devices = store.list_by_owner(OWNER).await?;
    let fleet = tariff.summarize_fleet(&devices);

    println!("\n=== Fleet Summary ===\n");
    println!("  Devices:        {} ({} on)", fleet.total_devices, fleet.active_devices);
    println!("  Monthly usage:  {:.3} kWh", fleet.total_monthly_kwh);
    println!("  Monthly cost:   {:.2} {}", fleet.total_monthly_cost, fleet.currency);
    println!("  Marginal rate:  {:.2} {}/kWh", tariff.rate_for_usage(fleet.total_monthly_kwh), fleet.currency);

    println!("\n  Tier breakdown:");
    for charge in tariff.tier_breakdown(fleet.total_monthly_kwh) {
        println!(
            "    Tier {}: {:>9.3} kWh @ {:.2} = {:>8.2}",
            charge.tier, charge.kwh, charge.rate, charge.cost
        );
    }
    println!();

    Ok(())
}
