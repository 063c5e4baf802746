//! Field telemetry processing engine and reliable queue relay.
//!
//! Readings flow through the [`ProcessingPipeline`]: they are normalized,
//! checked for anomalies, recorded in the bounded per-field
//! [`TimeSeriesStore`], and enriched with trend, statistics and
//! recommendations. The [`MessageRelay`] feeds readings from a durable queue
//! into a [`ReadingSink`], acking on success and requeueing on failure.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules reach each other through the re-exports below.

pub mod alerts;
pub mod analytics;
pub mod anomaly;
pub mod config;
pub mod insights;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod queue;
pub mod recommendations;
pub mod relay;
pub mod routes;
pub mod sink;
pub mod store;
pub mod thresholds;

pub use analytics::{AnalyticsEngine, SensorStatistics, Trend, TrendAnalysis};
pub use anomaly::{AnomalyDetector, AnomalyVerdict};
pub use config::{Config, ForwardMode};
pub use insights::{InsightGenerator, Insights};
pub use models::{ProcessedReading, Reading, SensorSample};
pub use normalize::{normalize, ReadingSource, ResolvedReading};
pub use pipeline::{BatchItem, BatchReport, ProcessingPipeline};
pub use relay::{MessageRelay, RelaySettings, RelayState, Settlement};
pub use sink::{HttpSink, PipelineSink, ReadingSink, SinkError};
pub use store::TimeSeriesStore;
pub use thresholds::{Threshold, ThresholdTable};
