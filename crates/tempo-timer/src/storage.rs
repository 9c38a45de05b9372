use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

use crate::model::TaskState;

const STATE_FILE: &str = "state.json";

/// Durable store for the one persisted TaskState record.
#[derive(Debug)]
pub struct StateStorage {
    path: PathBuf,
}

impl StateStorage {
    /// Open the store under the platform data directory.
    pub async fn new() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("tempo-timer");

        fs::create_dir_all(&data_dir).await?;

        Ok(Self {
            path: data_dir.join(STATE_FILE),
        })
    }

    /// Open the store against an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted state, if any.
    ///
    /// Timer-in-progress fields are neutralized before the value is handed
    /// out. A corrupted record is recoverable data loss, not a crash: it is
    /// logged and treated as absent.
    pub async fn load(&self) -> Option<TaskState> {
        if !self.path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %self.path.display(), "read persisted state failed: {err}");
                return None;
            }
        };

        match serde_json::from_str::<TaskState>(&content) {
            Ok(state) => Some(state.neutralized()),
            Err(err) => {
                warn!(path = %self.path.display(), "persisted state corrupted; starting fresh: {err}");
                None
            }
        }
    }

    pub async fn load_or_initial(&self) -> TaskState {
        self.load().await.unwrap_or_else(TaskState::initial)
    }

    /// Overwrite the persisted state.
    pub async fn save(&self, state: &TaskState) -> Result<()> {
        let content = serde_json::to_string_pretty(state).context("serialize task state")?;

        // Atomic write: write to temp file then rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .with_context(|| format!("write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("rename into {}", self.path.display()))?;
        Ok(())
    }
}
