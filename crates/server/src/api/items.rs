//! Item and selection API handlers.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use reelpilot_core::{ContentRecord, DurationBucket, WorkItem};

use super::handlers::{api_error, bad_request, ApiError, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for loading a batch
#[derive(Debug, Deserialize)]
pub struct LoadItemsBody {
    pub items: Vec<ContentRecord>,
}

#[derive(Debug, Serialize)]
pub struct LoadItemsResponse {
    pub loaded: usize,
}

/// An item as the API shows it
#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: WorkItem,
    /// Seconds since production started, while the item is in flight
    pub elapsed_secs: Option<i64>,
}

impl ItemView {
    fn new(item: WorkItem, now: DateTime<Utc>) -> Self {
        let elapsed_secs = if item.state.status.is_in_flight() {
            item.state.elapsed_secs(now)
        } else {
            None
        };
        Self { item, elapsed_secs }
    }
}

/// Current batch with the selection
#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<ItemView>,
    pub selection: Vec<String>,
    pub duration: DurationBucket,
}

/// Request body for setting a publish time; `null` clears it
#[derive(Debug, Deserialize)]
pub struct PublishTimeBody {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SelectionBody {
    pub ids: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_items(State(state): State<Arc<AppState>>) -> Json<ItemsResponse> {
    let session = state.session();
    let now = session.now();
    Json(ItemsResponse {
        items: session
            .items()
            .await
            .into_iter()
            .map(|item| ItemView::new(item, now))
            .collect(),
        selection: session.selection().await,
        duration: session.duration().await,
    })
}

/// Replace the batch. Every loaded item starts selected.
pub async fn load_items(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoadItemsBody>,
) -> Result<(StatusCode, Json<LoadItemsResponse>), ApiError> {
    if body.items.is_empty() {
        return Err(bad_request("items must not be empty"));
    }
    let loaded = state.session().load_items(body.items).await;
    Ok((StatusCode::CREATED, Json(LoadItemsResponse { loaded })))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ItemView>, ApiError> {
    let session = state.session();
    session
        .board()
        .get(&id)
        .await
        .map(|item| Json(ItemView::new(item, session.now())))
        .ok_or_else(|| api_error(reelpilot_core::SessionError::NotFound(id)))
}

/// Download the produced video.
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let export = state.session().export_artifact(&id).await.map_err(api_error)?;
    debug!("Serving {} ({} bytes)", export.file_name, export.data.len());
    attachment("video/mp4", &export.file_name, Body::from(export.data))
}

/// Download the text sidecar: title, concept, description, tags and prompt.
pub async fn get_artifact_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let export = state.session().export_artifact(&id).await.map_err(api_error)?;
    attachment(
        "text/plain; charset=utf-8",
        &export.notes_file_name,
        Body::from(export.notes),
    )
}

fn attachment(
    content_type: &'static str,
    file_name: &str,
    body: Body,
) -> Result<Response, ApiError> {
    // Unsafe characters are already replaced, so only non-ASCII bytes remain.
    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", file_name).as_bytes(),
    )
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("invalid file name: {}", e),
            }),
        )
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Replace an item's content. Rejected while the item is in production.
pub async fn edit_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut content): Json<ContentRecord>,
) -> Result<Json<WorkItem>, ApiError> {
    content.id = id;
    state
        .session()
        .edit_content(content)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn set_publish_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PublishTimeBody>,
) -> Result<Json<WorkItem>, ApiError> {
    state
        .session()
        .set_publish_time(&id, body.at)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_selection(State(state): State<Arc<AppState>>) -> Json<SelectionBody> {
    Json(SelectionBody {
        ids: state.session().selection().await,
    })
}

pub async fn set_selection(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectionBody>,
) -> Result<Json<SelectionBody>, ApiError> {
    let session = state.session();
    session.set_selection(&body.ids).await.map_err(api_error)?;
    Ok(Json(SelectionBody {
        ids: session.selection().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelpilot_core::ItemStatus;

    #[test]
    fn test_elapsed_secs_only_while_in_flight() {
        let now = Utc::now();
        let mut item = WorkItem::new(ContentRecord {
            id: "a".to_string(),
            title: "A".to_string(),
            ..Default::default()
        });
        item.state.started_at = Some(now - chrono::Duration::seconds(90));

        item.state.status = ItemStatus::Monitoring;
        let json = serde_json::to_value(ItemView::new(item.clone(), now)).unwrap();
        assert_eq!(json["elapsed_secs"], 90);
        assert_eq!(json["content"]["title"], "A");

        item.state.status = ItemStatus::Completed;
        let json = serde_json::to_value(ItemView::new(item, now)).unwrap();
        assert!(json["elapsed_secs"].is_null());
    }
}
