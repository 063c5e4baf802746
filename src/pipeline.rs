//! Processing pipeline: normalize, detect, store, enrich.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::analytics::AnalyticsEngine;
use crate::anomaly::AnomalyDetector;
use crate::insights::InsightGenerator;
use crate::models::{ProcessedReading, Reading};
use crate::store::TimeSeriesStore;

// ---

/// Outcome of one reading in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BatchItem {
    Processed(ProcessedReading),
    Failed { index: usize, error: String },
}

/// Per-item results of a batch, in input order.
///
/// Failures are isolated: a reading that fails is reported as
/// [`BatchItem::Failed`] while the rest of the batch still completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub processed: usize,
    pub failed: usize,
    pub anomalies: usize,
}

#[derive(Debug, Clone)]
pub struct ProcessingPipeline {
    detector: Arc<AnomalyDetector>,
    store: Arc<TimeSeriesStore>,
    insights: InsightGenerator,
}

impl ProcessingPipeline {
    // ---
    /// Pipeline over `store` with the default threshold table.
    pub fn new(store: Arc<TimeSeriesStore>) -> Self {
        Self::with_detector(store, AnomalyDetector::default())
    }

    pub fn with_detector(store: Arc<TimeSeriesStore>, detector: AnomalyDetector) -> Self {
        // ---
        let analytics = AnalyticsEngine::new(Arc::clone(&store));
        Self {
            detector: Arc::new(detector),
            store,
            insights: InsightGenerator::new(analytics),
        }
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub fn analytics(&self) -> &AnalyticsEngine {
        self.insights.analytics()
    }

    /// Run a single reading through the pipeline.
    ///
    /// The original reading (not the normalized value) is stored before
    /// insights are built, so statistics include the reading itself.
    pub fn process_reading(&self, reading: Reading) -> ProcessedReading {
        // ---
        let resolved = reading.resolve();
        info!(
            "Processing reading: {} = {} {} for field {}",
            resolved.sensor_type, resolved.value, resolved.unit, reading.field_id
        );

        let normalized_value = resolved.normalized();
        let verdict = self.detector.detect(&reading, &resolved);

        self.store.append(reading.field_id, &reading);

        let insights = self.insights.generate(reading.field_id, &resolved);
        info!(
            "Processed reading: anomaly={}, insights={}",
            verdict.is_anomaly,
            insights.len()
        );

        ProcessedReading {
            original_reading: reading,
            normalized_value,
            is_anomaly: verdict.is_anomaly,
            anomaly_reason: verdict.reason,
            insights,
            processed_at: Utc::now(),
        }
    }

    /// Process every reading on its own task and collect per-item results.
    pub async fn process_batch(&self, readings: Vec<Reading>) -> BatchReport {
        // ---
        info!("Processing batch of {} readings", readings.len());

        let handles: Vec<_> = readings
            .into_iter()
            .map(|reading| {
                let pipeline = self.clone();
                tokio::spawn(async move { pipeline.process_reading(reading) })
            })
            .collect();

        let mut items = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(processed) => items.push(BatchItem::Processed(processed)),
                Err(err) => {
                    error!("Batch item {} failed: {}", index, err);
                    items.push(BatchItem::Failed {
                        index,
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = BatchReport::from_items(items);
        info!(
            "Batch processing completed: {} processed, {} failed, {} anomalies detected",
            report.processed, report.failed, report.anomalies
        );
        report
    }
}

impl BatchReport {
    fn from_items(items: Vec<BatchItem>) -> Self {
        // ---
        let mut processed = 0;
        let mut failed = 0;
        let mut anomalies = 0;
        for item in &items {
            match item {
                BatchItem::Processed(p) => {
                    processed += 1;
                    anomalies += usize::from(p.is_anomaly);
                }
                BatchItem::Failed { .. } => failed += 1,
            }
        }
        Self {
            items,
            processed,
            failed,
            anomalies,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn pipeline() -> ProcessingPipeline {
        ProcessingPipeline::new(Arc::new(TimeSeriesStore::new()))
    }

    #[test]
    fn test_fahrenheit_scenario_on_fresh_field() {
        // ---
        let pipeline = pipeline();
        let field_id = Uuid::new_v4();
        let reading = Reading::new(field_id).sensor("Temperature", 60.0, "Fahrenheit");

        let processed = pipeline.process_reading(reading.clone());

        assert!((processed.normalized_value - 15.56).abs() < 0.01);
        assert!(!processed.is_anomaly);
        assert!(processed.anomaly_reason.is_none());
        assert!(processed.insights.trend.is_none());
        // The reading itself is already in history
        assert_eq!(processed.insights.statistics.as_ref().unwrap().count, 1);
        assert!(processed.insights.recommendations.is_empty());
        assert_eq!(processed.original_reading, reading);
    }

    #[test]
    fn test_store_receives_original_value() {
        // ---
        let pipeline = pipeline();
        let field_id = Uuid::new_v4();

        pipeline.process_reading(Reading::new(field_id).sensor("Temperature", 212.0, "Fahrenheit"));

        let stored = pipeline.store().query(field_id, "Temperature");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 212.0);
        assert_eq!(stored[0].unit, "Fahrenheit");
    }

    #[test]
    fn test_trend_appears_after_second_reading() {
        // ---
        let pipeline = pipeline();
        let field_id = Uuid::new_v4();
        let base = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();

        let first = Reading::new(field_id)
            .sensor("Humidity", 40.0, "Percent")
            .at(base);
        let second = Reading::new(field_id)
            .sensor("Humidity", 60.0, "Percent")
            .at(base + Duration::hours(1));

        assert!(pipeline.process_reading(first).insights.trend.is_none());
        let processed = pipeline.process_reading(second);
        let trend = processed.insights.trend.unwrap();
        assert_eq!(trend.change_rate, 0.0);
    }

    #[test]
    fn test_legacy_reading_flow() {
        // ---
        let pipeline = pipeline();
        let field_id = Uuid::new_v4();
        let reading = Reading::new(field_id).soil_moisture(20.0).air_temperature(31.0);

        let processed = pipeline.process_reading(reading);

        assert_eq!(processed.normalized_value, 20.0);
        assert!(!processed.is_anomaly);
        assert!(processed.insights.recommendations[0].contains("Irrigation"));
        assert_eq!(pipeline.store().len(field_id), 2);
    }

    #[test]
    fn test_pest_anomaly_reported() {
        // ---
        let pipeline = pipeline();
        let reading = Reading::new(Uuid::new_v4())
            .sensor("Humidity", 50.0, "Percent")
            .pests(true);

        let processed = pipeline.process_reading(reading);
        assert!(processed.is_anomaly);
        assert_eq!(
            processed.anomaly_reason.as_deref(),
            Some("Pest indicators present")
        );
    }

    #[tokio::test]
    async fn test_batch_reports_every_item_in_order() {
        // ---
        let pipeline = pipeline();
        let field_id = Uuid::new_v4();
        let readings = vec![
            Reading::new(field_id).sensor("Temperature", 20.0, "Celsius"),
            Reading::new(field_id).sensor("Temperature", 80.0, "Celsius"),
            Reading::new(field_id).sensor("pH", 7.0, ""),
        ];

        let report = pipeline.process_batch(readings.clone()).await;

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.processed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.anomalies, 1);
        for (item, reading) in report.items.iter().zip(&readings) {
            match item {
                BatchItem::Processed(p) => assert_eq!(&p.original_reading, reading),
                BatchItem::Failed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(pipeline.store().len(field_id), 3);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        // ---
        let report = pipeline().process_batch(Vec::new()).await;
        assert!(report.items.is_empty());
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn test_report_counts_failures() {
        // ---
        let report = BatchReport::from_items(vec![BatchItem::Failed {
            index: 0,
            error: "task panicked".into(),
        }]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "failed");
        assert_eq!(json["items"][0]["index"], 0);
    }
}
