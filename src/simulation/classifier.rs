//! Device classification
//!
//! A device's consumption class comes from its explicit type tag when the
//! tag is known, otherwise from keywords in its display name.

use crate::core::{ClassRange, DeviceType, KeywordRule, SimulationConfig};
use std::collections::HashMap;

/// Hourly draw bounds in kW
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRange {
    pub min_kw: f64,
    pub max_kw: f64,
}

const FALLBACK_RANGE: DrawRange = DrawRange { min_kw: 0.05, max_kw: 0.2 };

/// Data-driven classifier: ordered keyword rules plus a class range table
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    rules: Vec<KeywordRule>,
    ranges: HashMap<DeviceType, DrawRange>,
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new(&SimulationConfig::default())
    }
}

impl DeviceClassifier {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::from_parts(config.keyword_rules.clone(), &config.classes)
    }

    pub fn from_parts(rules: Vec<KeywordRule>, classes: &[ClassRange]) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule {
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                class: rule.class,
            })
            .collect();

        let ranges = classes
            .iter()
            .map(|c| (c.class, DrawRange { min_kw: c.min_kw, max_kw: c.max_kw }))
            .collect();

        Self { rules, ranges }
    }

    /// Resolve a device's class. First matching rule wins.
    pub fn classify(&self, name: &str, explicit_type: Option<&str>) -> DeviceType {
        if let Some(device_type) = explicit_type.and_then(DeviceType::from_tag) {
            return device_type;
        }

        let name = name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| !k.is_empty() && name.contains(k.as_str())))
            .map(|rule| rule.class)
            .unwrap_or(DeviceType::Default)
    }

    /// Draw range for a class; unknown classes use the default class range
    pub fn range_for(&self, class: DeviceType) -> DrawRange {
        self.ranges
            .get(&class)
            .or_else(|| self.ranges.get(&DeviceType::Default))
            .copied()
            .unwrap_or(FALLBACK_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_type_wins() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.classify("Living room lamp", Some("heater")), DeviceType::Heater);
        assert_eq!(
            classifier.classify("Whatever", Some("air conditioner")),
            DeviceType::AirConditioner
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_name() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.classify("Kitchen Fridge", Some("gizmo")), DeviceType::Fridge);
        assert_eq!(classifier.classify("Kitchen Fridge", Some("")), DeviceType::Fridge);
    }

    #[test]
    fn test_name_keywords() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.classify("Bathroom BOILER", None), DeviceType::Heater);
        assert_eq!(classifier.classify("Samsung Television", None), DeviceType::Tv);
        assert_eq!(classifier.classify("Desk lamp", None), DeviceType::Light);
        assert_eq!(classifier.classify("Gaming PC", None), DeviceType::Computer);
        assert_eq!(classifier.classify("Router", None), DeviceType::Default);
    }

    #[test]
    fn test_rule_order_decides_ties() {
        let classifier = DeviceClassifier::default();
        // heater is listed before light
        assert_eq!(classifier.classify("Heater light", None), DeviceType::Heater);
        // fridge before tv
        assert_eq!(classifier.classify("fridge tv combo", None), DeviceType::Fridge);
    }

    #[test]
    fn test_custom_rules() {
        let rules = vec![KeywordRule {
            keywords: vec!["AC".to_string()],
            class: DeviceType::AirConditioner,
        }];
        let classes = [ClassRange { class: DeviceType::AirConditioner, min_kw: 0.8, max_kw: 1.5 }];
        let classifier = DeviceClassifier::from_parts(rules, &classes);

        assert_eq!(classifier.classify("Bedroom ac", None), DeviceType::AirConditioner);
        assert_eq!(classifier.range_for(DeviceType::AirConditioner).max_kw, 1.5);
        // no default class configured
        assert_eq!(classifier.range_for(DeviceType::Fan), FALLBACK_RANGE);
    }

    #[test]
    fn test_default_ranges() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.range_for(DeviceType::Default), DrawRange { min_kw: 0.05, max_kw: 0.2 });
        assert_eq!(classifier.range_for(DeviceType::Heater), DrawRange { min_kw: 1.0, max_kw: 2.0 });
        assert_eq!(
            classifier.range_for(DeviceType::AirConditioner),
            DrawRange { min_kw: 0.8, max_kw: 1.5 }
        );
    }
}
