//! Per-tick energy increments
//!
//! Increments are deliberately faster than real time (scaled by a visibility
//! multiplier) so the dashboard moves on human timescales.

use crate::core::{Device, SimulationConfig};
use crate::simulation::classifier::DrawRange;
use rand::{rngs::StdRng, Rng, SeedableRng};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Smallest increment that survives rounding to 3 decimals
pub const INCREMENT_STEP: f64 = 0.001;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Random increment source. Seed it for reproducible runs.
#[derive(Debug, Clone)]
pub struct IncrementGenerator {
    rng: StdRng,
    visibility_multiplier: f64,
    bootstrap_multiplier: f64,
    bootstrap_min_fraction: f64,
    bootstrap_fraction_spread: f64,
    jitter: f64,
    new_device_epsilon: f64,
}

impl IncrementGenerator {
    pub fn new(config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            rng,
            visibility_multiplier: config.visibility_multiplier,
            bootstrap_multiplier: config.bootstrap_multiplier,
            bootstrap_min_fraction: config.bootstrap_min_fraction,
            bootstrap_fraction_spread: config.bootstrap_fraction_spread,
            jitter: config.jitter,
            new_device_epsilon: config.new_device_epsilon,
        }
    }

    /// A device with negligible history on both accumulators
    pub fn is_new(&self, device: &Device) -> bool {
        device.daily_usage < self.new_device_epsilon && device.monthly_usage < self.new_device_epsilon
    }

    /// Energy (kWh) to add for one tick of `interval_ms`, rounded to 3 decimals
    pub fn next_increment(&mut self, range: DrawRange, is_new: bool, interval_ms: u64) -> f64 {
        let interval_share = interval_ms as f64 / MS_PER_HOUR;

        if is_new {
            let fraction = self.bootstrap_min_fraction + self.rng.random::<f64>() * self.bootstrap_fraction_spread;
            let increment = range.min_kw * fraction * interval_share * self.bootstrap_multiplier;
            return round_to(increment, 3).max(INCREMENT_STEP);
        }

        let hourly_kw = range.min_kw + self.rng.random::<f64>() * (range.max_kw - range.min_kw);
        let jitter = 1.0 - self.jitter + self.rng.random::<f64>() * 2.0 * self.jitter;
        let increment = hourly_kw * jitter * interval_share * self.visibility_multiplier;
        // Stays above the bootstrap floor so established devices keep accumulating
        round_to(increment, 3).max(2.0 * INCREMENT_STEP)
    }

    /// Instantaneous draw (kW) shown on the gauge, rounded to 2 decimals.
    /// New devices sit 20-40% into their range, established ones 40-80%.
    pub fn current_draw(&mut self, range: DrawRange, is_new: bool) -> f64 {
        let (base, spread) = if is_new { (0.2, 0.2) } else { (0.4, 0.4) };
        let position = base + self.rng.random::<f64>() * spread;
        round_to(range.min_kw + (range.max_kw - range.min_kw) * position, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_RANGE: DrawRange = DrawRange { min_kw: 0.05, max_kw: 0.2 };
    const HEATER_RANGE: DrawRange = DrawRange { min_kw: 1.0, max_kw: 2.0 };
    const LAMP_RANGE: DrawRange = DrawRange { min_kw: 0.01, max_kw: 0.06 };

    fn generator(seed: u64) -> IncrementGenerator {
        IncrementGenerator::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(seed))
    }

    fn is_rounded(value: f64, decimals: i32) -> bool {
        (round_to(value, decimals) - value).abs() < 1e-12
    }

    #[test]
    fn test_steady_increment_within_bounds() {
        let config = SimulationConfig::default();
        let share = 2000.0 / MS_PER_HOUR * config.visibility_multiplier;
        let lower = HEATER_RANGE.min_kw * (1.0 - config.jitter) * share;
        let upper = HEATER_RANGE.max_kw * (1.0 + config.jitter) * share;

        let mut gen = generator(1);
        for _ in 0..500 {
            let inc = gen.next_increment(HEATER_RANGE, false, 2000);
            assert!(inc >= lower - 0.0005 && inc <= upper + 0.0005, "{} outside {}..{}", inc, lower, upper);
            assert!(is_rounded(inc, 3));
        }
    }

    #[test]
    fn test_bootstrap_smaller_than_steady() {
        for range in [DEFAULT_RANGE, HEATER_RANGE, LAMP_RANGE] {
            let mut gen = generator(99);
            let max_bootstrap = (0..200)
                .map(|_| gen.next_increment(range, true, 2000))
                .fold(f64::MIN, f64::max);
            let min_steady = (0..200)
                .map(|_| gen.next_increment(range, false, 2000))
                .fold(f64::MAX, f64::min);
            assert!(max_bootstrap < min_steady, "{:?}: {} >= {}", range, max_bootstrap, min_steady);
        }
    }

    #[test]
    fn test_short_interval_keeps_steady_above_bootstrap() {
        for interval_ms in [1000, 250, 10] {
            let mut gen = generator(17);
            let max_bootstrap = (0..50)
                .map(|_| gen.next_increment(LAMP_RANGE, true, interval_ms))
                .fold(f64::MIN, f64::max);
            let min_steady = (0..500)
                .map(|_| gen.next_increment(LAMP_RANGE, false, interval_ms))
                .fold(f64::MAX, f64::min);
            assert!(min_steady > 0.0, "{}ms: steady increment vanished", interval_ms);
            assert!(max_bootstrap < min_steady, "{}ms: {} >= {}", interval_ms, max_bootstrap, min_steady);
        }
    }

    #[test]
    fn test_bootstrap_never_rounds_to_zero() {
        let mut gen = generator(5);
        for _ in 0..100 {
            assert!(gen.next_increment(LAMP_RANGE, true, 2000) >= INCREMENT_STEP);
        }
    }

    #[test]
    fn test_increment_scales_with_interval() {
        let mut short = generator(11);
        let mut long = generator(11);
        let a = short.next_increment(HEATER_RANGE, false, 2000);
        let b = long.next_increment(HEATER_RANGE, false, 4000);
        assert!((b - 2.0 * a).abs() <= 0.002, "{} vs {}", a, b);
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = generator(42);
        let mut b = generator(42);
        for _ in 0..20 {
            assert_eq!(a.next_increment(DEFAULT_RANGE, false, 5000), b.next_increment(DEFAULT_RANGE, false, 5000));
        }
    }

    #[test]
    fn test_current_draw_bands() {
        let mut gen = generator(3);
        for _ in 0..200 {
            let fresh = gen.current_draw(HEATER_RANGE, true);
            assert!((1.2 - 0.005..=1.4 + 0.005).contains(&fresh), "{}", fresh);
            let settled = gen.current_draw(HEATER_RANGE, false);
            assert!((1.4 - 0.005..=1.8 + 0.005).contains(&settled), "{}", settled);
            assert!(is_rounded(settled, 2));
        }
    }

    #[test]
    fn test_new_device_detection() {
        let gen = generator(0);
        assert!(gen.is_new(&Device::new("d", "u", "x")));
        assert!(gen.is_new(&Device::new("d", "u", "x").with_usage(0.005, 0.009)));
        assert!(!gen.is_new(&Device::new("d", "u", "x").with_usage(0.005, 0.5)));
    }
}
