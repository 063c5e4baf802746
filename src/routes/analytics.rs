use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use crate::ProcessingPipeline;

// ---

pub fn router() -> Router<ProcessingPipeline> {
    // ---
    Router::new()
        .route("/api/analytics/{field_id}/{sensor_type}/trend", get(trend))
        .route(
            "/api/analytics/{field_id}/{sensor_type}/statistics",
            get(statistics),
        )
}

async fn trend(
    Path((field_id, sensor_type)): Path<(Uuid, String)>,
    State(pipeline): State<ProcessingPipeline>,
) -> Response {
    // ---
    debug!("GET trend - field {} sensor {}", field_id, sensor_type);
    match pipeline.analytics().trend(field_id, &sensor_type) {
        Some(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        None => not_enough_data(),
    }
}

async fn statistics(
    Path((field_id, sensor_type)): Path<(Uuid, String)>,
    State(pipeline): State<ProcessingPipeline>,
) -> Response {
    // ---
    debug!("GET statistics - field {} sensor {}", field_id, sensor_type);
    match pipeline.analytics().statistics(field_id, &sensor_type) {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => not_enough_data(),
    }
}

fn not_enough_data() -> Response {
    (StatusCode::NOT_FOUND, Json("Not enough data")).into_response()
}
