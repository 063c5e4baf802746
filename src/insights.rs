//! Insight bundle: trend, statistics and recommendations for a reading.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::{AnalyticsEngine, SensorStatistics, TrendAnalysis};
use crate::normalize::ResolvedReading;
use crate::recommendations::recommendations;

// ---

/// Named insights for a processed reading. Serializes as a JSON object
/// whose unavailable entries are omitted rather than `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SensorStatistics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl Insights {
    /// Number of insights present.
    pub fn len(&self) -> usize {
        usize::from(self.trend.is_some())
            + usize::from(self.statistics.is_some())
            + usize::from(!self.recommendations.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct InsightGenerator {
    analytics: AnalyticsEngine,
}

impl InsightGenerator {
    // ---
    pub fn new(analytics: AnalyticsEngine) -> Self {
        Self { analytics }
    }

    pub fn analytics(&self) -> &AnalyticsEngine {
        &self.analytics
    }

    /// Assemble insights for a reading already resolved to its canonical
    /// triple.
    pub fn generate(&self, field_id: Uuid, resolved: &ResolvedReading) -> Insights {
        // ---
        let sensor_type = resolved.sensor_type.as_str();
        Insights {
            trend: self.analytics.trend(field_id, sensor_type),
            statistics: self.analytics.statistics(field_id, sensor_type),
            recommendations: recommendations(sensor_type, resolved.normalized()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Reading;
    use crate::store::TimeSeriesStore;
    use std::sync::Arc;

    fn generator() -> (InsightGenerator, Arc<TimeSeriesStore>) {
        let store = Arc::new(TimeSeriesStore::new());
        let analytics = AnalyticsEngine::new(Arc::clone(&store));
        (InsightGenerator::new(analytics), store)
    }

    #[test]
    fn test_empty_history_omits_trend_and_statistics() {
        // ---
        let (generator, _store) = generator();
        let reading = Reading::new(Uuid::new_v4()).sensor("Humidity", 50.0, "Percent");

        let insights = generator.generate(reading.field_id, &reading.resolve());

        assert!(insights.is_empty());
        assert_eq!(serde_json::to_value(&insights).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_full_bundle() {
        // ---
        let (generator, store) = generator();
        let field_id = Uuid::new_v4();
        for value in [20.0, 22.0, 24.0] {
            let reading = Reading::new(field_id).sensor("SoilMoisture", value, "Percent");
            store.append(field_id, &reading);
        }

        let latest = Reading::new(field_id).sensor("SoilMoisture", 24.0, "Percent");
        let insights = generator.generate(field_id, &latest.resolve());

        assert!(insights.trend.is_some());
        assert_eq!(insights.statistics.as_ref().unwrap().count, 3);
        assert_eq!(insights.recommendations.len(), 1);
        assert_eq!(insights.len(), 3);

        let json = serde_json::to_value(&insights).unwrap();
        assert!(json.get("trend").is_some());
        assert!(json.get("statistics").is_some());
        assert!(json["recommendations"].is_array());
    }

    #[test]
    fn test_fahrenheit_normalized_before_recommending() {
        // ---
        // 100°F is ~37.8°C, above the heat advisory bound
        let (generator, _store) = generator();
        let reading = Reading::new(Uuid::new_v4()).sensor("Temperature", 100.0, "Fahrenheit");

        let insights = generator.generate(reading.field_id, &reading.resolve());
        assert!(insights.recommendations[0].contains("High temperature"));
    }
}
