//! Scheduling and publish batch handlers.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use reelpilot_core::PublishReport;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduleSlot {
    pub item_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub slots: Vec<ScheduleSlot>,
}

/// Spread the selected completed items over the next 24 hours.
pub async fn apply_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let session = state.session();
    let slots = session
        .apply_smart_schedule(session.now())
        .await
        .map_err(api_error)?;
    Ok(Json(ScheduleResponse {
        slots: slots
            .into_iter()
            .map(|(item_id, at)| ScheduleSlot { item_id, at })
            .collect(),
    }))
}

/// Publish the selected completed items and wait for the batch report.
pub async fn publish(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PublishReport>, ApiError> {
    state.session().publish().await.map(Json).map_err(api_error)
}
