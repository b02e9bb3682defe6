//! Axum Handlers for the REST API
//!
//! Read-only views of the scenario catalog and the persisted preferences.
//! `utoipa` doc comments generate the OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{ErrorResponse, PreferencesResponse, ScenarioSummary},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List the lesson scenarios.
#[utoipa::path(
    get,
    path = "/scenarios",
    responses(
        (status = 200, description = "All scenarios, default first", body = [ScenarioSummary])
    )
)]
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<ScenarioSummary>> {
    Json(state.catalog.iter().map(ScenarioSummary::from).collect())
}

/// Get one scenario and its agent roster.
#[utoipa::path(
    get,
    path = "/scenarios/{key}",
    responses(
        (status = 200, description = "Scenario found", body = ScenarioSummary),
        (status = 404, description = "Scenario not found", body = ErrorResponse)
    ),
    params(
        ("key" = String, Path, description = "Scenario key, as used in the `agentConfig` query parameter")
    )
)]
pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ScenarioSummary>, ApiError> {
    state
        .catalog
        .get(&key)
        .map(|scenario| Json(ScenarioSummary::from(scenario)))
        .ok_or_else(|| ApiError::NotFound(format!("Scenario '{}' not found", key)))
}

/// The persisted preference snapshot.
#[utoipa::path(
    get,
    path = "/preferences",
    responses(
        (status = 200, description = "Current preferences", body = PreferencesResponse)
    )
)]
pub async fn get_preferences(State(state): State<Arc<AppState>>) -> Json<PreferencesResponse> {
    Json(PreferencesResponse::from(&state.preferences.load().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        credential::MockCredentialProvider,
        preferences::JsonFilePreferenceStore,
        transport::OpenAiConnector,
    };
    use std::{net::SocketAddr, path::PathBuf, time::Duration};
    use tutoria_core::scenario::ScenarioCatalog;

    async fn state(dir: &tempfile::TempDir) -> Arc<AppState> {
        let config = Config {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            credential_endpoint: "http://localhost:3000/api/session".to_string(),
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            default_model: "gpt-realtime".to_string(),
            connect_timeout: Duration::from_secs(15),
            log_level: tracing::Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
            preferences_path: dir.path().join("prefs.json"),
        };
        let preferences = JsonFilePreferenceStore::open(&config.preferences_path, &config.default_model).await;
        Arc::new(AppState {
            connector: Arc::new(OpenAiConnector::new(config.realtime_url.clone())),
            config: Arc::new(config),
            catalog: Arc::new(ScenarioCatalog::builtin()),
            credentials: Arc::new(MockCredentialProvider::new()),
            preferences: Arc::new(preferences),
        })
    }

    #[tokio::test]
    async fn test_list_scenarios() {
        let dir = tempfile::tempdir().expect("temp dir");
        let Json(scenarios) = list_scenarios(State(state(&dir).await)).await;
        let keys: Vec<&str> = scenarios.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["universityTutor", "universityTutorEvaluation"]);
    }

    #[tokio::test]
    async fn test_get_scenario() {
        let dir = tempfile::tempdir().expect("temp dir");
        let Json(scenario) = get_scenario(State(state(&dir).await), Path("universityTutor".to_string()))
            .await
            .unwrap();
        assert_eq!(scenario.agents[0].name, "tutorFinanzas");
    }

    #[tokio::test]
    async fn test_get_scenario_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = get_scenario(State(state(&dir).await), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::NotFound(message) if message == "Scenario 'nope' not found"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_preferences_uses_configured_default_model() {
        let dir = tempfile::tempdir().expect("temp dir");
        let Json(prefs) = get_preferences(State(state(&dir).await)).await;
        assert_eq!(prefs.model, "gpt-realtime");
        assert_eq!(prefs.right_pane_view, "board");
    }
}
