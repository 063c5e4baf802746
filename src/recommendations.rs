//! Advisory text derived from a normalized reading.

/// Recommendations for a sensor type and normalized value.
///
/// Sensor type matching is case-insensitive; bounds are strict, so a value
/// sitting exactly on a bound produces no advice.
pub fn recommendations(sensor_type: &str, value: f64) -> Vec<String> {
    // ---
    let advice = match sensor_type.to_ascii_lowercase().as_str() {
        "temperature" if value > 35.0 => {
            Some("High temperature detected. Consider irrigation or shading.")
        }
        "temperature" if value < 10.0 => {
            Some("Low temperature detected. Consider protective measures.")
        }
        "humidity" if value < 30.0 => Some("Low humidity detected. Consider increasing irrigation."),
        "humidity" if value > 80.0 => Some("High humidity detected. Monitor for fungal diseases."),
        "soilmoisture" if value < 30.0 => Some("Low soil moisture. Irrigation recommended."),
        "soilmoisture" if value > 80.0 => Some("High soil moisture. Risk of root rot."),
        _ => None,
    };

    advice.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_soil_moisture_advice() {
        // ---
        let low = recommendations("SoilMoisture", 25.0);
        assert_eq!(low.len(), 1);
        assert!(low[0].contains("Irrigation recommended"));

        assert!(recommendations("SoilMoisture", 50.0).is_empty());
        assert!(recommendations("soilmoisture", 85.0)[0].contains("root rot"));
    }

    #[test]
    fn test_temperature_advice() {
        // ---
        assert!(recommendations("Temperature", 36.0)[0].contains("High temperature"));
        assert!(recommendations("TEMPERATURE", 5.0)[0].contains("Low temperature"));
        assert!(recommendations("Temperature", 20.0).is_empty());
    }

    #[test]
    fn test_humidity_advice() {
        // ---
        assert!(recommendations("Humidity", 10.0)[0].contains("Low humidity"));
        assert!(recommendations("humidity", 90.0)[0].contains("fungal"));
    }

    #[test]
    fn test_bounds_are_strict() {
        // ---
        assert!(recommendations("Temperature", 35.0).is_empty());
        assert!(recommendations("Temperature", 10.0).is_empty());
        assert!(recommendations("Humidity", 30.0).is_empty());
        assert!(recommendations("Humidity", 80.0).is_empty());
        assert!(recommendations("SoilMoisture", 30.0).is_empty());
        assert!(recommendations("SoilMoisture", 80.0).is_empty());
    }

    #[test]
    fn test_other_sensor_types_have_no_advice() {
        // ---
        assert!(recommendations("pH", 1.0).is_empty());
        assert!(recommendations("AirTemperature", 60.0).is_empty());
        assert!(recommendations("Telemetry", 0.0).is_empty());
    }
}
