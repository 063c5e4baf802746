//! Data models for the field telemetry pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::insights::Insights;

// ---

/// Sensor type assigned to the legacy `soilMoisture` field.
pub const SOIL_MOISTURE: &str = "SoilMoisture";

/// Sensor type assigned to the legacy `airTemperature` field.
pub const AIR_TEMPERATURE: &str = "AirTemperature";

/// Sensor type assigned to the legacy `precipitation` field.
pub const PRECIPITATION: &str = "Precipitation";

/// Sensor type used when nothing on the reading identifies one.
pub const FALLBACK_SENSOR_TYPE: &str = "Telemetry";

/// Raw sensor reading as it arrives from the queue or the ingestion API.
///
/// Either `sensor_type`/`value`/`unit` are set explicitly, or the reading
/// carries the legacy scalar fields and the sensor type is inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub field_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_timestamp: Option<DateTime<Utc>>,
    /// Older producers send `timestamp`; `readingTimestamp` wins when both
    /// are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_rich_in_pests: Option<bool>,
}

impl Reading {
    // ---
    /// Empty reading for a field; fill it in with the builder methods.
    pub fn new(field_id: Uuid) -> Self {
        // ---
        Self {
            field_id,
            sensor_type: None,
            value: None,
            unit: None,
            reading_timestamp: None,
            timestamp: None,
            created_at: Utc::now(),
            soil_moisture: None,
            air_temperature: None,
            precipitation: None,
            is_rich_in_pests: None,
        }
    }

    pub fn sensor(mut self, sensor_type: &str, value: f64, unit: &str) -> Self {
        self.sensor_type = Some(sensor_type.to_string());
        self.value = Some(value);
        self.unit = Some(unit.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.reading_timestamp = Some(timestamp);
        self
    }

    pub fn soil_moisture(mut self, value: f64) -> Self {
        self.soil_moisture = Some(value);
        self
    }

    pub fn air_temperature(mut self, value: f64) -> Self {
        self.air_temperature = Some(value);
        self
    }

    pub fn precipitation(mut self, value: f64) -> Self {
        self.precipitation = Some(value);
        self
    }

    pub fn pests(mut self, present: bool) -> Self {
        self.is_rich_in_pests = Some(present);
        self
    }

    /// Observation time, falling back to when the reading was created.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.reading_timestamp
            .or(self.timestamp)
            .unwrap_or(self.created_at)
    }

    /// True only when the pest indicator is explicitly set.
    pub fn has_pests(&self) -> bool {
        self.is_rich_in_pests == Some(true)
    }
}

/// One entry of a field's history: a single sensor type, value and unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    // ---
    pub field_id: Uuid,
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of running one reading through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReading {
    // ---
    pub original_reading: Reading,
    pub normalized_value: f64,
    pub is_anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_reason: Option<String>,
    pub insights: Insights,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_explicit_reading() {
        // ---
        let json = r#"{
            "fieldId": "6f1c2a3e-4b5d-4e6f-8a9b-0c1d2e3f4a5b",
            "sensorType": "Temperature",
            "value": 60.0,
            "unit": "Fahrenheit",
            "timestamp": "2025-06-01T12:00:00Z",
            "firmware": "ignored"
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.sensor_type.as_deref(), Some("Temperature"));
        assert_eq!(reading.value, Some(60.0));
        assert_eq!(reading.unit.as_deref(), Some("Fahrenheit"));
        assert_eq!(
            reading.observed_at(),
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        );
        assert!(!reading.has_pests());
    }

    #[test]
    fn test_deserialize_legacy_reading() {
        // ---
        let json = r#"{
            "fieldId": "6f1c2a3e-4b5d-4e6f-8a9b-0c1d2e3f4a5b",
            "soilMoisture": 42.5,
            "precipitation": 3.0,
            "isRichInPests": true
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();

        assert!(reading.sensor_type.is_none());
        assert_eq!(reading.soil_moisture, Some(42.5));
        assert_eq!(reading.precipitation, Some(3.0));
        assert!(reading.air_temperature.is_none());
        assert!(reading.has_pests());
        // No reading timestamp, so the creation time stands in
        assert_eq!(reading.observed_at(), reading.created_at);
    }

    #[test]
    fn test_both_timestamp_keys_accepted() {
        // ---
        let json = r#"{
            "fieldId": "6f1c2a3e-4b5d-4e6f-8a9b-0c1d2e3f4a5b",
            "soilMoisture": 20,
            "timestamp": "2025-06-01T12:00:00Z",
            "readingTimestamp": "2025-06-01T13:30:00Z"
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(
            reading.observed_at(),
            Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_field_id_is_rejected() {
        // ---
        let json = r#"{ "sensorType": "Humidity", "value": 10 }"#;
        assert!(serde_json::from_str::<Reading>(json).is_err());
    }
}
