use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// HTTP endpoint issuing short-lived realtime secrets.
    pub credential_endpoint: String,
    pub realtime_url: String,
    pub default_model: String,
    pub connect_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub preferences_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let credential_endpoint = std::env::var("CREDENTIAL_ENDPOINT")
            .map_err(|_| ConfigError::MissingVar("CREDENTIAL_ENDPOINT".to_string()))?;
        if !credential_endpoint.starts_with("http://") && !credential_endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "CREDENTIAL_ENDPOINT".to_string(),
                format!("'{}' is not an http(s) URL", credential_endpoint),
            ));
        }

        let realtime_url = std::env::var("REALTIME_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| tutoria_core::preferences::DEFAULT_MODEL.to_string());

        let timeout_str = std::env::var("CONNECT_TIMEOUT_SECS").unwrap_or_else(|_| "15".to_string());
        let connect_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "CONNECT_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ));
            }
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let preferences_path = std::env::var("PREFERENCES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./preferences.json"));

        Ok(Self {
            bind_address,
            credential_endpoint,
            realtime_url,
            default_model,
            connect_timeout,
            log_level,
            prompts_path,
            preferences_path,
        })
    }
}
