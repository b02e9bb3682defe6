//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{AgentSummary, ErrorResponse, PreferencesResponse, ScenarioSummary},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_scenarios,
        handlers::get_scenario,
        handlers::get_preferences,
    ),
    components(
        schemas(ScenarioSummary, AgentSummary, PreferencesResponse, ErrorResponse)
    ),
    tags(
        (name = "Tutor-ia API", description = "Scenarios and preferences of the realtime voice tutor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/scenarios", get(handlers::list_scenarios))
        .route("/scenarios/{key}", get(handlers::get_scenario))
        .route("/preferences", get(handlers::get_preferences))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
