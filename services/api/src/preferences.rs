//! Preference persistence
//!
//! Preferences are read once at startup and written back on every change.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};
use tutoria_core::preferences::{Preferences, is_supported_model};

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// The current snapshot.
    async fn load(&self) -> Preferences;
    async fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// Stores the snapshot as a pretty-printed JSON file.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    current: RwLock<Preferences>,
}

impl JsonFilePreferenceStore {
    /// Reads the file once. A missing or unreadable file yields defaults,
    /// with `default_model` as the model.
    pub async fn open(path: impl Into<PathBuf>, default_model: &str) -> Self {
        let path = path.into();
        let current = match read_snapshot(&path).await {
            Ok(Some(prefs)) => {
                info!(path = %path.display(), "Loaded preferences");
                prefs
            }
            Ok(None) => defaults(default_model),
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Ignoring unreadable preferences file");
                defaults(default_model)
            }
        };
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn defaults(default_model: &str) -> Preferences {
    let mut prefs = Preferences::default();
    if is_supported_model(default_model) {
        prefs.model = default_model.to_string();
    } else {
        warn!(model = default_model, "Default model is not supported; keeping built-in default");
    }
    prefs
}

async fn read_snapshot(path: &Path) -> Result<Option<Preferences>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("Failed to read preferences file"),
    };
    let prefs = serde_json::from_str(&text).context("Preferences file is not valid JSON")?;
    Ok(Some(prefs))
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn load(&self) -> Preferences {
        self.current.read().await.clone()
    }

    async fn save(&self, preferences: &Preferences) -> Result<()> {
        let mut current = self.current.write().await;
        let text = serde_json::to_string_pretty(preferences)?;
        tokio::fs::write(&self.path, text)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        *current = preferences.clone();
        Ok(())
    }
}
