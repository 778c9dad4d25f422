//! Cost ceiling evaluation

use crate::core::{Device, LimitPeriod};
use crate::pricing::PeriodCosts;

/// A ceiling met by a candidate cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub period: LimitPeriod,
    pub limit: f64,
    pub cost: f64,
}

fn cost_for(costs: &PeriodCosts, period: LimitPeriod) -> f64 {
    match period {
        LimitPeriod::Daily => costs.daily,
        LimitPeriod::Weekly => costs.weekly,
        LimitPeriod::Monthly => costs.monthly,
    }
}

/// First ceiling met, checked daily, weekly, then monthly regardless of size
pub fn first_breached(device: &Device, costs: &PeriodCosts) -> Option<Breach> {
    LimitPeriod::ORDER.into_iter().find_map(|period| {
        let limit = device.limit(period)?;
        let cost = cost_for(costs, period);
        (cost >= limit).then_some(Breach { period, limit, cost })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(daily: f64, weekly: f64, monthly: f64) -> PeriodCosts {
        PeriodCosts { daily, weekly, monthly }
    }

    #[test]
    fn test_no_limits_never_breach() {
        let device = Device::new("d", "u", "Heater");
        assert_eq!(first_breached(&device, &costs(1e6, 1e6, 1e6)), None);
    }

    #[test]
    fn test_meeting_the_limit_counts() {
        let device = Device::new("d", "u", "Heater").with_limit(LimitPeriod::Monthly, 50.0);
        let breach = first_breached(&device, &costs(1.0, 7.0, 50.0)).unwrap();
        assert_eq!(breach.period, LimitPeriod::Monthly);
        assert_eq!(breach.limit, 50.0);

        assert_eq!(first_breached(&device, &costs(1.0, 7.0, 49.99)), None);
    }

    #[test]
    fn test_daily_checked_before_larger_breaches() {
        let device = Device::new("d", "u", "Heater")
            .with_limit(LimitPeriod::Daily, 10.0)
            .with_limit(LimitPeriod::Monthly, 1.0);
        let breach = first_breached(&device, &costs(10.5, 73.5, 900.0)).unwrap();
        assert_eq!(breach.period, LimitPeriod::Daily);
    }

    #[test]
    fn test_weekly_uses_weekly_cost() {
        let device = Device::new("d", "u", "Heater")
            .with_limit(LimitPeriod::Daily, 10.0)
            .with_limit(LimitPeriod::Weekly, 60.0);
        let breach = first_breached(&device, &costs(9.0, 63.0, 63.0)).unwrap();
        assert_eq!(breach.period, LimitPeriod::Weekly);
        assert_eq!(breach.cost, 63.0);
    }

    #[test]
    fn test_zero_limit_is_ignored() {
        let mut device = Device::new("d", "u", "Heater");
        device.daily_limit = Some(0.0);
        assert_eq!(first_breached(&device, &costs(5.0, 35.0, 5.0)), None);
    }
}
