use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SettingsError;

/// Persisted string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// File-based storage holding a flat JSON object
pub struct FileStore {
    values: Arc<RwLock<Option<HashMap<String, String>>>>,
    file_path: PathBuf,
}

impl FileStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            values: Arc::new(RwLock::new(None)),
            file_path: file_path.into(),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, SettingsError> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Settings file does not exist, starting fresh");
            return Ok(HashMap::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let values: HashMap<String, String> = serde_json::from_str(&content)?;

        tracing::debug!(count = values.len(), "Loaded settings from storage");

        Ok(values)
    }

    async fn save(&self, values: &HashMap<String, String>) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(values)?;

        // Create parent directory if needed
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write then rename so a reader never sees a half-written file
        let tmp = self.file_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.file_path).await?;

        tracing::debug!(count = values.len(), "Saved settings to storage");

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        {
            let values = self.values.read().await;
            if let Some(values) = values.as_ref() {
                return Ok(values.get(key).cloned());
            }
        }

        let mut values = self.values.write().await;
        if values.is_none() {
            *values = Some(self.load().await?);
        }
        Ok(values.as_ref().and_then(|v| v.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.values.write().await;
        let mut updated = match values.take() {
            Some(v) => v,
            None => self.load().await?,
        };
        updated.insert(key.to_string(), value.to_string());

        // On failure the cache stays empty so the next read comes from disk
        self.save(&updated).await?;
        *values = Some(updated);
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
