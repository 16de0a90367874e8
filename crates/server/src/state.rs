use std::sync::Arc;

use reelpilot_core::{Config, SanitizedConfig, Session};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    session: Arc<Session>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(config: Config, session: Arc<Session>, ws_broadcaster: WsBroadcaster) -> Self {
        Self {
            config,
            session,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
