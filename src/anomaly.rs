//! Anomaly detection against the pest flag and per-sensor thresholds.

use crate::models::Reading;
use crate::normalize::ResolvedReading;
use crate::thresholds::ThresholdTable;

// ---

pub const PEST_REASON: &str = "Pest indicators present";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub reason: Option<String>,
}

impl AnomalyVerdict {
    fn normal() -> Self {
        Self::default()
    }

    fn anomaly(reason: String) -> Self {
        Self {
            is_anomaly: true,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: ThresholdTable,
}

impl AnomalyDetector {
    // ---
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    /// Classify a reading.
    ///
    /// A pest indicator short-circuits every other check. Otherwise the
    /// normalized value is compared against the sensor type's inclusive
    /// range; types without a threshold are never anomalous.
    pub fn detect(&self, reading: &Reading, resolved: &ResolvedReading) -> AnomalyVerdict {
        // ---
        if reading.has_pests() {
            return AnomalyVerdict::anomaly(PEST_REASON.to_string());
        }

        let Some(threshold) = self.thresholds.lookup(&resolved.sensor_type) else {
            return AnomalyVerdict::normal();
        };

        let value = resolved.normalized();
        if value < threshold.min {
            AnomalyVerdict::anomaly(format!(
                "Value {} is below minimum threshold {}",
                value, threshold.min
            ))
        } else if value > threshold.max {
            AnomalyVerdict::anomaly(format!(
                "Value {} is above maximum threshold {}",
                value, threshold.max
            ))
        } else {
            AnomalyVerdict::normal()
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use uuid::Uuid;

    fn check(reading: Reading) -> AnomalyVerdict {
        let resolved = reading.resolve();
        AnomalyDetector::default().detect(&reading, &resolved)
    }

    fn temperature(value: f64) -> Reading {
        Reading::new(Uuid::nil()).sensor("Temperature", value, "Celsius")
    }

    fn next_up(v: f64) -> f64 {
        if v == 0.0 {
            f64::from_bits(1)
        } else if v > 0.0 {
            f64::from_bits(v.to_bits() + 1)
        } else {
            f64::from_bits(v.to_bits() - 1)
        }
    }

    fn next_down(v: f64) -> f64 {
        -next_up(-v)
    }

    #[test]
    fn test_inclusive_range_boundaries() {
        // ---
        assert!(!check(temperature(0.0)).is_anomaly);
        assert!(!check(temperature(50.0)).is_anomaly);

        let below = check(temperature(next_down(0.0)));
        assert!(below.is_anomaly);
        assert!(below.reason.unwrap().contains("below minimum threshold 0"));

        let above = check(temperature(next_up(50.0)));
        assert!(above.is_anomaly);
        assert!(above.reason.unwrap().contains("above maximum threshold 50"));
    }

    #[test]
    fn test_reason_embeds_unrounded_value() {
        // ---
        let verdict = check(Reading::new(Uuid::nil()).sensor("pH", 3.25, ""));
        assert_eq!(
            verdict.reason.as_deref(),
            Some("Value 3.25 is below minimum threshold 4")
        );

        let verdict = check(temperature(50.5));
        assert_eq!(
            verdict.reason.as_deref(),
            Some("Value 50.5 is above maximum threshold 50")
        );
    }

    #[test]
    fn test_fahrenheit_is_normalized_before_comparison() {
        // ---
        // 130°F is ~54.4°C, above the 50°C maximum
        let hot = Reading::new(Uuid::nil()).sensor("Temperature", 130.0, "Fahrenheit");
        assert!(check(hot).is_anomaly);

        // 60°F is ~15.6°C, inside the range
        let mild = Reading::new(Uuid::nil()).sensor("Temperature", 60.0, "Fahrenheit");
        assert!(!check(mild).is_anomaly);
    }

    #[test]
    fn test_pests_always_anomalous() {
        // ---
        for value in [-100.0, 0.0, 25.0, 1e9] {
            let verdict = check(temperature(value).pests(true));
            assert!(verdict.is_anomaly);
            assert_eq!(verdict.reason.as_deref(), Some(PEST_REASON));
        }

        let unknown = Reading::new(Uuid::nil()).sensor("Wind", 3.0, "m/s").pests(true);
        assert!(check(unknown).is_anomaly);
    }

    #[test]
    fn test_pests_false_is_not_an_anomaly() {
        // ---
        assert!(!check(temperature(20.0).pests(false)).is_anomaly);
    }

    #[test]
    fn test_unknown_sensor_type_never_anomalous() {
        // ---
        let verdict = check(Reading::new(Uuid::nil()).sensor("Wind", -999.0, "m/s"));
        assert_eq!(verdict, AnomalyVerdict::default());

        // Threshold keys are case-sensitive
        assert!(!check(Reading::new(Uuid::nil()).sensor("temperature", 500.0, "Celsius")).is_anomaly);
    }
}
