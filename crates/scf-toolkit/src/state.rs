use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use scf_common::{DeploymentState, Result, ScfError, StateStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// State kept in process memory; handy for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<RwLock<DeploymentState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: DeploymentState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn snapshot(&self) -> DeploymentState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<DeploymentState> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &DeploymentState) -> Result<()> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}

/// One JSON document per resource instance under a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl AsRef<Path>, instance: &str) -> Self {
        Self {
            path: root.as_ref().join(format!("{instance}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn persistence(action: &str, path: &Path, err: impl std::fmt::Display) -> ScfError {
    ScfError::StatePersistence(format!("Failed to {action} {}: {err}", path.display()))
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<DeploymentState> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| persistence("parse state", &self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state recorded yet");
                Ok(DeploymentState::default())
            }
            Err(e) => Err(persistence("read state", &self.path, e)),
        }
    }

    async fn save(&self, state: &DeploymentState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence("create state directory", parent, e))?;
        }

        // Write atomically
        let temp_path = self.path.with_extension("json.tmp");
        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &self.path).await
        };
        write
            .await
            .map_err(|e| persistence("write state", &self.path, e))?;

        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("remove state", &self.path, e)),
        }
    }
}
