use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use scf_common::{LifecycleRule, ObjectStorage, Result, ScfError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const LIFECYCLE_FILE: &str = ".lifecycle.json";

/// Object storage backed by a local directory: one sub-directory per bucket,
/// objects stored under their key.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        Ok(self.root.join(safe_relative(bucket)?))
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Ok(self.bucket_path(bucket)?.join(safe_relative(key)?))
    }

    /// Lifecycle rules last applied to `bucket`, empty when none were set.
    pub async fn lifecycle(&self, bucket: &str) -> Result<Vec<LifecycleRule>> {
        let path = self.bucket_path(bucket)?.join(LIFECYCLE_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(storage_error("read lifecycle of", bucket, e)),
        }
    }
}

fn storage_error(action: &str, target: &str, err: impl std::fmt::Display) -> ScfError {
    ScfError::Storage(format!("Failed to {action} {target}: {err}"))
}

/// Keys may carry a leading `/`; anything escaping the bucket is rejected.
fn safe_relative(name: &str) -> Result<PathBuf> {
    let relative = Path::new(name.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(ScfError::Storage(format!("Invalid bucket or key name: {name}")));
    }
    Ok(relative.to_path_buf())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, path).await
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn ensure_bucket(&self, bucket: &str, lifecycle: &[LifecycleRule]) -> Result<()> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| storage_error("create bucket", bucket, e))?;

        let rules = serde_json::to_vec_pretty(lifecycle)?;
        write_atomic(&path.join(LIFECYCLE_FILE), &rules)
            .await
            .map_err(|e| storage_error("set lifecycle of", bucket, e))?;

        info!(%bucket, rules = lifecycle.len(), "Bucket ready");
        Ok(())
    }

    async fn upload(&self, bucket: &str, file: &Path, key: &str) -> Result<()> {
        let target = self.object_path(bucket, key)?;
        let bytes = fs::read(file)
            .await
            .map_err(|e| storage_error("read", &file.display().to_string(), e))?;
        write_atomic(&target, &bytes)
            .await
            .map_err(|e| storage_error("upload to", bucket, e))?;

        debug!(%bucket, %key, bytes = bytes.len(), "Uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path());
        let rules = vec![LifecycleRule::expire_all_after("deleteObject", 10)];

        storage.ensure_bucket("code-1250", &rules).await.unwrap();
        storage.ensure_bucket("code-1250", &rules).await.unwrap();

        assert!(dir.path().join("code-1250").is_dir());
        assert_eq!(storage.lifecycle("code-1250").await.unwrap(), rules);
        assert!(storage.lifecycle("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_strips_leading_slash() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("fn1.zip");
        std::fs::write(&artifact, b"zip bytes").unwrap();

        let storage = LocalObjectStorage::new(dir.path().join("cos"));
        storage
            .upload("code-1250", &artifact, "/Serverless-Devs-Tool-abc-1.zip")
            .await
            .unwrap();

        let stored = storage
            .object_path("code-1250", "/Serverless-Devs-Tool-abc-1.zip")
            .unwrap();
        assert_eq!(stored, dir.path().join("cos/code-1250/Serverless-Devs-Tool-abc-1.zip"));
        assert_eq!(std::fs::read(stored).unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path());
        let err = storage
            .upload("bucket", Path::new("missing.zip"), "../outside.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ScfError::Storage(_)));
        assert_eq!(err.code(), "UPLOAD_SCF_CODE");
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path());
        let err = storage
            .upload("bucket", &dir.path().join("nope.zip"), "code.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ScfError::Storage(_)));
    }
}
