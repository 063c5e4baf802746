//! Acceptable value ranges per sensor type.

use std::collections::HashMap;

use serde::Serialize;

// ---

/// Inclusive `[min, max]` range in the sensor type's canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub min: f64,
    pub max: f64,
}

/// Fixed table of thresholds keyed by exact (case-sensitive) sensor type.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    entries: HashMap<&'static str, Threshold>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        // ---
        let entries = [
            ("Temperature", Threshold { min: 0.0, max: 50.0 }),
            ("Humidity", Threshold { min: 0.0, max: 100.0 }),
            ("SoilMoisture", Threshold { min: 0.0, max: 100.0 }),
            ("pH", Threshold { min: 4.0, max: 9.0 }),
        ]
        .into_iter()
        .collect();

        Self { entries }
    }
}

impl ThresholdTable {
    // ---
    /// `None` means the sensor type has no range to violate.
    pub fn lookup(&self, sensor_type: &str) -> Option<Threshold> {
        self.entries.get(sensor_type).copied()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_known_thresholds() {
        // ---
        let table = ThresholdTable::default();

        assert_eq!(
            table.lookup("Temperature"),
            Some(Threshold { min: 0.0, max: 50.0 })
        );
        assert_eq!(table.lookup("pH"), Some(Threshold { min: 4.0, max: 9.0 }));
        assert_eq!(
            table.lookup("SoilMoisture"),
            Some(Threshold { min: 0.0, max: 100.0 })
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        // ---
        let table = ThresholdTable::default();

        assert!(table.lookup("temperature").is_none());
        assert!(table.lookup("PH").is_none());
        assert!(table.lookup("AirTemperature").is_none());
        assert!(table.lookup("Telemetry").is_none());
    }
}
