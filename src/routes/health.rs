// src/routes/health.rs
//! API health check endpoint for the Fieldflow service.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running. It is a sibling
//! module in the `routes` directory and follows the Explicit Module Boundary
//! Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ProcessingPipeline;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    /// Fields with in-memory history.
    fields: usize,
}

/// Handle `GET /health`.
///
/// Reports liveness plus the number of fields currently tracked. It does not
/// touch the queue or any downstream API.
async fn health(State(pipeline): State<ProcessingPipeline>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        fields: pipeline.store().field_count(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<ProcessingPipeline> {
    Router::new().route("/health", get(health))
}
