//! Credential pool and settings handlers.
//!
//! Secrets are write-only over the API: responses carry a short preview.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reelpilot_core::{CredentialEntry, CredentialKind};

use super::handlers::{api_error, bad_request, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CredentialView {
    pub index: usize,
    pub preview: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct CredentialListResponse {
    pub kind: CredentialKind,
    pub credentials: Vec<CredentialView>,
}

#[derive(Debug, Deserialize)]
pub struct AddCredentialBody {
    /// Captured curl command (generation) or access token (publishing)
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectCredentialBody {
    pub index: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationBody {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub use_simulation: bool,
    pub generation_credentials: usize,
    pub publishing_credentials: usize,
}

fn view(entry: &CredentialEntry, active: Option<usize>) -> CredentialView {
    CredentialView {
        index: entry.position,
        preview: entry.redacted(),
        active: active == Some(entry.position),
    }
}

async fn list_response(state: &AppState, kind: CredentialKind) -> CredentialListResponse {
    let session = state.session();
    let active = session.active_credential(kind).await.map(|e| e.position);
    CredentialListResponse {
        kind,
        credentials: session
            .credentials(kind)
            .await
            .iter()
            .map(|e| view(e, active))
            .collect(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<CredentialKind>,
) -> Json<CredentialListResponse> {
    Json(list_response(&state, kind).await)
}

pub async fn add_credential(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<CredentialKind>,
    Json(body): Json<AddCredentialBody>,
) -> Result<(StatusCode, Json<CredentialView>), ApiError> {
    if body.secret.trim().is_empty() {
        return Err(bad_request("secret must not be empty"));
    }
    let session = state.session();
    let entry = session
        .add_credential(kind, &body.secret)
        .await
        .map_err(api_error)?;
    let active = session.active_credential(kind).await.map(|e| e.position);
    Ok((StatusCode::CREATED, Json(view(&entry, active))))
}

pub async fn remove_credential(
    State(state): State<Arc<AppState>>,
    Path((kind, index)): Path<(CredentialKind, usize)>,
) -> Result<Json<CredentialListResponse>, ApiError> {
    state
        .session()
        .remove_credential(kind, index)
        .await
        .map_err(api_error)?;
    Ok(Json(list_response(&state, kind).await))
}

/// Choose the credential the next production batch uses.
pub async fn select_credential(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<CredentialKind>,
    Json(body): Json<SelectCredentialBody>,
) -> Result<Json<CredentialListResponse>, ApiError> {
    state
        .session()
        .select_credential(kind, body.index)
        .await
        .map_err(api_error)?;
    Ok(Json(list_response(&state, kind).await))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    let settings = state.session().settings().await;
    Json(SettingsResponse {
        use_simulation: settings.use_simulation,
        generation_credentials: settings.generation.len(),
        publishing_credentials: settings.publishing.len(),
    })
}

pub async fn set_simulation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SimulationBody>,
) -> Json<SimulationBody> {
    state.session().set_simulation(body.enabled).await;
    Json(SimulationBody {
        enabled: state.session().use_simulation().await,
    })
}

/// Persist pools and the simulation flag.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state
        .session()
        .save_settings()
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
