//! Pricing engine for tiered electricity cost calculation
//!
//! Usage is billed progressively: each band of cumulative monthly kWh is
//! charged at its own marginal rate. The default schedule is:
//! - up to 2000 kWh: 0.18
//! - up to 4000 kWh: 0.24
//! - up to 6000 kWh: 0.30
//! - above: 0.32

use crate::core::{Device, TariffConfig, Tier, DEFAULT_TIERS};
use serde::{Deserialize, Serialize};

/// Marginal rate for `usage_kwh` under the default schedule
pub fn rate_for_usage(usage_kwh: f64) -> f64 {
    rate_in(&DEFAULT_TIERS, usage_kwh)
}

/// Total cost of `usage_kwh` under the default schedule
pub fn cost_for_usage(usage_kwh: f64) -> f64 {
    cost_in(&DEFAULT_TIERS, usage_kwh)
}

// Zero, negative and NaN usage all resolve to the first tier's rate.
fn rate_in(tiers: &[Tier], usage_kwh: f64) -> f64 {
    let Some(first) = tiers.first() else {
        return 0.0;
    };

    if usage_kwh.is_nan() || usage_kwh <= 0.0 {
        return first.rate;
    }

    for tier in tiers {
        if usage_kwh <= tier.ceiling() {
            return tier.rate;
        }
    }

    // Schedule without an unbounded tier: keep billing at the top rate
    tiers.last().map(|t| t.rate).unwrap_or(first.rate)
}

fn cost_in(tiers: &[Tier], usage_kwh: f64) -> f64 {
    breakdown_in(tiers, usage_kwh).iter().map(|c| c.cost).sum()
}

fn breakdown_in(tiers: &[Tier], usage_kwh: f64) -> Vec<TierCharge> {
    let mut charges = Vec::new();
    if usage_kwh.is_nan() || usage_kwh <= 0.0 {
        return charges;
    }

    let mut remaining = usage_kwh;
    let mut previous_ceiling = 0.0;

    for (index, tier) in tiers.iter().enumerate() {
        let is_last = index + 1 == tiers.len();
        let band = if is_last { f64::INFINITY } else { tier.ceiling() - previous_ceiling };
        let billed = remaining.min(band);

        if billed > 0.0 {
            charges.push(TierCharge {
                tier: index + 1,
                kwh: billed,
                rate: tier.rate,
                cost: billed * tier.rate,
            });
            remaining -= billed;
        }
        previous_ceiling = tier.ceiling();

        if remaining <= 0.0 {
            break;
        }
    }

    charges
}

/// Portion of a usage figure billed within one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCharge {
    /// 1-based tier number
    pub tier: usize,
    pub kwh: f64,
    pub rate: f64,
    pub cost: f64,
}

/// Costs of a device's usage over the three limit periods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodCosts {
    pub daily: f64,
    /// Approximated as seven times the daily usage
    pub weekly: f64,
    pub monthly: f64,
}

/// Tariff view of a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCostSummary {
    pub device_id: String,
    /// Marginal rate at the current monthly usage
    pub rate: f64,
    pub costs: PeriodCosts,
    pub currency: String,
}

/// Totals across all devices of an owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_devices: usize,
    pub active_devices: usize,
    pub total_monthly_kwh: f64,
    pub total_monthly_cost: f64,
    pub currency: String,
}

/// Tariff calculator over a configurable tier schedule
#[derive(Debug, Clone)]
pub struct TariffCalculator {
    tiers: Vec<Tier>,
    currency: String,
}

impl Default for TariffCalculator {
    fn default() -> Self {
        Self::new(&TariffConfig::default())
    }
}

impl TariffCalculator {
    /// Create a calculator with the given configuration
    pub fn new(config: &TariffConfig) -> Self {
        Self {
            tiers: config.tiers.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Replace the tier schedule
    pub fn update_config(&mut self, config: &TariffConfig) {
        self.tiers = config.tiers.clone();
        self.currency = config.currency.clone();
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Marginal rate of the first tier whose bound covers `usage_kwh`
    pub fn rate_for_usage(&self, usage_kwh: f64) -> f64 {
        rate_in(&self.tiers, usage_kwh)
    }

    /// Progressive cost of `usage_kwh`; zero for non-positive or NaN usage
    pub fn cost_for_usage(&self, usage_kwh: f64) -> f64 {
        cost_in(&self.tiers, usage_kwh)
    }

    /// Per-tier charges making up `cost_for_usage`
    pub fn tier_breakdown(&self, usage_kwh: f64) -> Vec<TierCharge> {
        breakdown_in(&self.tiers, usage_kwh)
    }

    /// Daily, weekly (daily x 7) and monthly costs for the given accumulators
    pub fn period_costs(&self, daily_kwh: f64, monthly_kwh: f64) -> PeriodCosts {
        PeriodCosts {
            daily: self.cost_for_usage(daily_kwh),
            weekly: self.cost_for_usage(daily_kwh * 7.0),
            monthly: self.cost_for_usage(monthly_kwh),
        }
    }

    pub fn summarize(&self, device: &Device) -> DeviceCostSummary {
        DeviceCostSummary {
            device_id: device.id.clone(),
            rate: self.rate_for_usage(device.monthly_usage),
            costs: self.period_costs(device.daily_usage, device.monthly_usage),
            currency: self.currency.clone(),
        }
    }

    pub fn summarize_fleet(&self, devices: &[Device]) -> FleetSummary {
        let total_monthly_kwh: f64 = devices
            .iter()
            .map(|d| d.monthly_usage)
            .filter(|kwh| kwh.is_finite() && *kwh > 0.0)
            .sum();

        FleetSummary {
            total_devices: devices.len(),
            active_devices: devices.iter().filter(|d| d.power_status).count(),
            total_monthly_kwh,
            total_monthly_cost: self.cost_for_usage(total_monthly_kwh),
            currency: self.currency.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_rate_defaults_to_first_tier() {
        assert_eq!(rate_for_usage(0.0), 0.18);
        assert_eq!(rate_for_usage(-5.0), 0.18);
        assert_eq!(rate_for_usage(f64::NAN), 0.18);
    }

    #[test]
    fn test_rate_tier_boundaries() {
        assert_eq!(rate_for_usage(1.0), 0.18);
        assert_eq!(rate_for_usage(2000.0), 0.18);
        assert_eq!(rate_for_usage(2000.5), 0.24);
        assert_eq!(rate_for_usage(4000.0), 0.24);
        assert_eq!(rate_for_usage(5999.0), 0.30);
        assert_eq!(rate_for_usage(6000.1), 0.32);
        assert_eq!(rate_for_usage(1.0e9), 0.32);
    }

    #[test]
    fn test_rate_is_non_decreasing() {
        let mut previous = rate_for_usage(0.0);
        let mut usage = 0.0;
        while usage < 9000.0 {
            let rate = rate_for_usage(usage);
            assert!(rate >= previous, "rate dropped at {} kWh", usage);
            previous = rate;
            usage += 17.5;
        }
    }

    #[test]
    fn test_cost_reference_values() {
        assert!(approx(cost_for_usage(2000.0), 360.0));
        assert!(approx(cost_for_usage(2500.0), 480.0));
        assert!(approx(cost_for_usage(6000.0), 1440.0));
        assert!(approx(cost_for_usage(7000.0), 1760.0));
    }

    #[test]
    fn test_cost_is_zero_for_invalid_usage() {
        assert_eq!(cost_for_usage(0.0), 0.0);
        assert_eq!(cost_for_usage(-10.0), 0.0);
        assert_eq!(cost_for_usage(f64::NAN), 0.0);
    }

    #[test]
    fn test_cost_matches_sum_of_slices() {
        // Billing 1 kWh slices at the rate of each slice's upper end
        // reproduces the progressive cost exactly on whole kWh.
        for usage in [1u32, 750, 2000, 2001, 3999, 4321, 6000, 6500] {
            let sliced: f64 = (1..=usage).map(|kwh| rate_for_usage(kwh as f64)).sum();
            let cost = cost_for_usage(usage as f64);
            assert!((sliced - cost).abs() < 1e-6, "{} kWh: {} vs {}", usage, sliced, cost);
        }
    }

    #[test]
    fn test_breakdown_sums_to_cost() {
        let calculator = TariffCalculator::default();
        let charges = calculator.tier_breakdown(4500.0);

        assert_eq!(charges.len(), 3);
        assert!(approx(charges[0].kwh, 2000.0));
        assert!(approx(charges[1].kwh, 2000.0));
        assert!(approx(charges[2].kwh, 500.0));
        assert_eq!(charges[2].rate, 0.30);

        let total: f64 = charges.iter().map(|c| c.cost).sum();
        assert!(approx(total, calculator.cost_for_usage(4500.0)));
        assert!(calculator.tier_breakdown(0.0).is_empty());
    }

    #[test]
    fn test_schedule_without_unbounded_tier() {
        let config = TariffConfig {
            tiers: vec![Tier::bounded(100.0, 0.10), Tier::bounded(200.0, 0.20)],
            ..Default::default()
        };
        let calculator = TariffCalculator::new(&config);

        assert_eq!(calculator.rate_for_usage(500.0), 0.20);
        // 100 @ 0.10 + 400 @ 0.20
        assert!(approx(calculator.cost_for_usage(500.0), 90.0));
    }

    #[test]
    fn test_period_costs_use_weekly_approximation() {
        let calculator = TariffCalculator::default();
        let costs = calculator.period_costs(400.0, 2500.0);

        assert!(approx(costs.daily, 72.0));
        // 2800 kWh: 2000 @ 0.18 + 800 @ 0.24
        assert!(approx(costs.weekly, 552.0));
        assert!(approx(costs.monthly, 480.0));
    }

    #[test]
    fn test_summaries() {
        let calculator = TariffCalculator::default();
        let devices = vec![
            Device::new("a", "u1", "Heater").powered_on().with_usage(10.0, 1500.0),
            Device::new("b", "u1", "Lamp").with_usage(1.0, 1000.0),
        ];

        let summary = calculator.summarize(&devices[0]);
        assert_eq!(summary.device_id, "a");
        assert_eq!(summary.rate, 0.18);
        assert!(approx(summary.costs.monthly, 270.0));
        assert_eq!(summary.currency, "SAR");

        let fleet = calculator.summarize_fleet(&devices);
        assert_eq!(fleet.total_devices, 2);
        assert_eq!(fleet.active_devices, 1);
        assert!(approx(fleet.total_monthly_kwh, 2500.0));
        assert!(approx(fleet.total_monthly_cost, 480.0));
    }
}
