use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::{BatchReport, ProcessedReading, ProcessingPipeline, Reading};

// ---

pub fn router() -> Router<ProcessingPipeline> {
    // ---
    Router::new()
        .route("/api/ingestion/single", post(single))
        .route("/api/ingestion/batch", post(batch))
}

/// `POST /api/ingestion/single` – process one reading.
///
/// Bodies that are not a valid reading are rejected by the `Json` extractor
/// with a 4xx, which the relay treats as a failed forward.
async fn single(
    State(pipeline): State<ProcessingPipeline>,
    Json(reading): Json<Reading>,
) -> Json<ProcessedReading> {
    // ---
    info!("POST /api/ingestion/single - field {}", reading.field_id);
    Json(pipeline.process_reading(reading))
}

/// `POST /api/ingestion/batch` – process many readings, one result each.
async fn batch(
    State(pipeline): State<ProcessingPipeline>,
    Json(readings): Json<Vec<Reading>>,
) -> Json<BatchReport> {
    // ---
    info!("POST /api/ingestion/batch - {} readings", readings.len());
    Json(pipeline.process_batch(readings).await)
}
