//! Reading normalizer.
//!
//! Classifies a [`Reading`] once into a [`ReadingSource`] (explicit sensor
//! fields vs. legacy scalar fields), resolves the canonical
//! `(sensor_type, value, unit)` triple, expands the reading into stored
//! [`SensorSample`]s, and converts values into the canonical unit.

use crate::models::{
    Reading, SensorSample, AIR_TEMPERATURE, FALLBACK_SENSOR_TYPE, PRECIPITATION, SOIL_MOISTURE,
};

// ---

/// Canonical view of a reading used by detection, insights and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReading {
    // ---
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
}

/// Legacy scalar fields carried by readings without a sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LegacyFields {
    // ---
    pub soil_moisture: Option<f64>,
    pub air_temperature: Option<f64>,
    pub precipitation: Option<f64>,
}

impl LegacyFields {
    // ---
    /// First non-null legacy value, in soil moisture, air temperature,
    /// precipitation order.
    fn first_value(&self) -> Option<f64> {
        self.soil_moisture
            .or(self.air_temperature)
            .or(self.precipitation)
    }

    fn inferred_type(&self) -> &'static str {
        // ---
        if self.soil_moisture.is_some() {
            SOIL_MOISTURE
        } else if self.air_temperature.is_some() {
            AIR_TEMPERATURE
        } else {
            FALLBACK_SENSOR_TYPE
        }
    }
}

/// How a reading identifies its sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingSource {
    /// `sensorType` was supplied; value and unit are already resolved.
    Explicit(ResolvedReading),
    /// No `sensorType`; everything is inferred from the legacy fields, with
    /// any explicit value/unit taking precedence for the canonical triple.
    Legacy {
        fields: LegacyFields,
        value: Option<f64>,
        unit: Option<String>,
    },
}

impl ReadingSource {
    // ---
    /// Canonical `(sensor_type, value, unit)` triple.
    pub fn resolve(&self) -> ResolvedReading {
        // ---
        match self {
            ReadingSource::Explicit(resolved) => resolved.clone(),
            ReadingSource::Legacy {
                fields,
                value,
                unit,
            } => {
                let sensor_type = fields.inferred_type();
                ResolvedReading {
                    sensor_type: sensor_type.to_string(),
                    value: value.or_else(|| fields.first_value()).unwrap_or(0.0),
                    unit: unit
                        .clone()
                        .unwrap_or_else(|| default_unit(sensor_type).to_string()),
                }
            }
        }
    }
}

impl Reading {
    // ---
    /// Classify this reading. A blank `sensorType` counts as absent.
    pub fn source(&self) -> ReadingSource {
        // ---
        let fields = LegacyFields {
            soil_moisture: self.soil_moisture,
            air_temperature: self.air_temperature,
            precipitation: self.precipitation,
        };

        match self.sensor_type.as_deref().map(str::trim) {
            Some(sensor_type) if !sensor_type.is_empty() => {
                ReadingSource::Explicit(ResolvedReading {
                    sensor_type: sensor_type.to_string(),
                    value: self.value.or_else(|| fields.first_value()).unwrap_or(0.0),
                    unit: self
                        .unit
                        .clone()
                        .unwrap_or_else(|| default_unit(sensor_type).to_string()),
                })
            }
            _ => ReadingSource::Legacy {
                fields,
                value: self.value,
                unit: self.unit.clone(),
            },
        }
    }

    /// Shorthand for `self.source().resolve()`.
    pub fn resolve(&self) -> ResolvedReading {
        self.source().resolve()
    }

    /// History entries for this reading.
    ///
    /// An explicit reading yields one sample. A legacy reading yields one
    /// sample per non-null legacy field, each with its fixed unit and the
    /// reading's shared timestamp.
    pub fn samples(&self) -> Vec<SensorSample> {
        // ---
        let timestamp = self.observed_at();
        let sample = |sensor_type: &str, value: f64, unit: &str| SensorSample {
            field_id: self.field_id,
            sensor_type: sensor_type.to_string(),
            value,
            unit: unit.to_string(),
            timestamp,
        };

        match self.source() {
            ReadingSource::Explicit(resolved) => {
                vec![sample(&resolved.sensor_type, resolved.value, &resolved.unit)]
            }
            ReadingSource::Legacy { fields, .. } => [
                (SOIL_MOISTURE, fields.soil_moisture),
                (AIR_TEMPERATURE, fields.air_temperature),
                (PRECIPITATION, fields.precipitation),
            ]
            .into_iter()
            .filter_map(|(sensor_type, value)| {
                value.map(|v| sample(sensor_type, v, default_unit(sensor_type)))
            })
            .collect(),
        }
    }
}

/// Fixed unit for the sensor types that have one.
pub fn default_unit(sensor_type: &str) -> &'static str {
    // ---
    match sensor_type {
        SOIL_MOISTURE => "Percent",
        AIR_TEMPERATURE => "Celsius",
        PRECIPITATION => "mm",
        _ => "",
    }
}

/// Convert a value into the canonical unit for its sensor type.
///
/// Fahrenheit temperatures become Celsius; every other combination passes
/// through unchanged. Never fails.
pub fn normalize(sensor_type: &str, value: f64, unit: &str) -> f64 {
    // ---
    let sensor_type = sensor_type.to_ascii_lowercase();
    match sensor_type.as_str() {
        "temperature" if unit.eq_ignore_ascii_case("Fahrenheit") => (value - 32.0) * 5.0 / 9.0,
        "temperature" if unit.eq_ignore_ascii_case("Celsius") => value,
        "humidity" | "soilmoisture" if unit.eq_ignore_ascii_case("Percent") => value,
        _ => value,
    }
}

impl ResolvedReading {
    // ---
    pub fn normalized(&self) -> f64 {
        normalize(&self.sensor_type, self.value, &self.unit)
    }
}
