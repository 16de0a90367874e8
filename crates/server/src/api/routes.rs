use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{credentials, handlers, items, middleware::metrics_middleware, production, publishing, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Batch contents
        .route("/items", get(items::list_items))
        .route("/items", post(items::load_items))
        .route("/items/{id}", get(items::get_item))
        .route("/items/{id}", patch(items::edit_item))
        .route("/items/{id}/publish-time", put(items::set_publish_time))
        .route("/items/{id}/artifact", get(items::get_artifact))
        .route("/items/{id}/artifact/notes", get(items::get_artifact_notes))
        .route("/selection", get(items::get_selection))
        .route("/selection", put(items::set_selection))
        // Batches
        .route("/production", post(production::start_production))
        .route("/schedule", post(publishing::apply_schedule))
        .route("/publish", post(publishing::publish))
        // Credentials and settings
        .route("/credentials/{kind}", get(credentials::list_credentials))
        .route("/credentials/{kind}", post(credentials::add_credential))
        .route("/credentials/{kind}/active", put(credentials::select_credential))
        .route("/credentials/{kind}/{index}", delete(credentials::remove_credential))
        .route("/settings", get(credentials::get_settings))
        .route("/settings/simulation", put(credentials::set_simulation))
        .route("/settings/save", post(credentials::save_settings))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
