//! Trend and summary statistics over a field's history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SensorSample;
use crate::store::TimeSeriesStore;

// ---

/// Number of samples in each trend window.
const TREND_WINDOW: usize = 10;

/// Change rate (percent) beyond which a trend is no longer stable.
const STABLE_BAND_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    /// Classify a percentage change; the ±5% boundary itself is stable.
    pub fn classify(change_rate: f64) -> Self {
        // ---
        if change_rate > STABLE_BAND_PERCENT {
            Trend::Increasing
        } else if change_rate < -STABLE_BAND_PERCENT {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub change_rate: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatistics {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Read-only analytics over the shared [`TimeSeriesStore`].
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    store: Arc<TimeSeriesStore>,
}

impl AnalyticsEngine {
    // ---
    pub fn new(store: Arc<TimeSeriesStore>) -> Self {
        Self { store }
    }

    /// Compare the average of the latest samples against an older window.
    ///
    /// `recent` is the last 10 samples by timestamp; `older` is up to 10
    /// samples starting 20 from the end. With fewer than 20 samples the two
    /// windows overlap. Returns `None` with fewer than 2 samples, or when the
    /// older average is zero and no change rate can be computed.
    pub fn trend(&self, field_id: Uuid, sensor_type: &str) -> Option<TrendAnalysis> {
        // ---
        let mut samples = self.store.query(field_id, sensor_type);
        if samples.len() < 2 {
            return None;
        }
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let count = samples.len();
        let recent = &samples[count.saturating_sub(TREND_WINDOW)..];
        let older_start = count.saturating_sub(2 * TREND_WINDOW);
        let older = &samples[older_start..(older_start + TREND_WINDOW).min(count)];

        let recent_avg = average(recent)?;
        let older_avg = average(older)?;
        if older_avg == 0.0 {
            tracing::debug!(%field_id, sensor_type, "older window averages zero; no trend");
            return None;
        }

        let change_rate = (recent_avg - older_avg) / older_avg * 100.0;
        if !change_rate.is_finite() {
            tracing::debug!(%field_id, sensor_type, "change rate not finite; no trend");
            return None;
        }

        let trend = Trend::classify(change_rate);
        tracing::info!(
            "Trend analysis for field {}, sensor {}: {:?} ({:.2}%)",
            field_id,
            sensor_type,
            trend,
            change_rate
        );

        Some(TrendAnalysis {
            trend,
            change_rate,
            description: format!(
                "Average {} changed by {:.2}% over recent readings",
                sensor_type, change_rate
            ),
        })
    }

    /// Average, min, max and count of the raw stored values.
    pub fn statistics(&self, field_id: Uuid, sensor_type: &str) -> Option<SensorStatistics> {
        // ---
        let samples = self.store.query(field_id, sensor_type);
        let average = average(&samples)?;

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.value), hi.max(s.value))
            });

        let stats = SensorStatistics {
            average,
            min,
            max,
            count: samples.len(),
        };
        tracing::info!(
            "Statistics for field {}, sensor {}: avg={}, min={}, max={}, count={}",
            field_id,
            sensor_type,
            stats.average,
            stats.min,
            stats.max,
            stats.count
        );
        Some(stats)
    }
}

fn average(samples: &[SensorSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64)
}
