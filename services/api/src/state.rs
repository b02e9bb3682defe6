//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the scenario catalog
//! and the service clients every session uses.

use crate::{
    config::Config, credential::CredentialProvider, preferences::PreferenceStore, transport::TransportConnector,
    ws::driver::SessionServices,
};
use std::sync::Arc;
use tutoria_core::scenario::ScenarioCatalog;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<ScenarioCatalog>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub connector: Arc<dyn TransportConnector>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl AppState {
    pub fn session_services(&self) -> SessionServices {
        SessionServices {
            credentials: self.credentials.clone(),
            connector: self.connector.clone(),
            preferences: self.preferences.clone(),
            connect_timeout: self.config.connect_timeout,
        }
    }
}
