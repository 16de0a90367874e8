//! Production batch handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use reelpilot_core::DurationBucket;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Request body for starting production
#[derive(Debug, Default, Deserialize)]
pub struct StartProductionBody {
    /// Clip length for the batch; keeps the session's current value if absent
    #[serde(default)]
    pub duration: Option<DurationBucket>,
}

#[derive(Debug, Serialize)]
pub struct StartProductionResponse {
    pub status: String,
    pub items: usize,
    pub mode: String,
    pub duration: DurationBucket,
}

/// Validate and start a production batch in the background.
///
/// Progress is reported over the WebSocket; the batch-finished message
/// carries the report.
pub async fn start_production(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartProductionBody>,
) -> Result<(StatusCode, Json<StartProductionResponse>), ApiError> {
    let session = state.session().clone();
    if let Some(duration) = body.duration {
        session.set_duration(duration).await;
    }

    let plan = session.prepare_production().await.map_err(api_error)?;
    let response = StartProductionResponse {
        status: "started".to_string(),
        items: plan.items.len(),
        mode: plan.mode.as_str().to_string(),
        duration: plan.duration,
    };
    info!(
        "Production of {} items requested ({} mode)",
        response.items, response.mode
    );

    tokio::spawn(async move {
        if let Err(e) = session.run_production(plan).await {
            error!("Production batch failed to start: {}", e);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}
