use axum::Router;

use crate::ProcessingPipeline;

mod analytics;
mod health;
mod ingestion;

// ---

pub fn router(pipeline: ProcessingPipeline) -> Router {
    // ---
    Router::new()
        .merge(ingestion::router())
        .merge(analytics::router())
        .merge(health::router())
        .with_state(pipeline)
}
