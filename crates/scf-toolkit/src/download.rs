use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use scf_common::{Result, ScfError, TemplateDownloader};
use tokio::fs;
use tracing::info;

/// Fetches template archives over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpTemplateDownloader {
    client: Client,
}

impl HttpTemplateDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateDownloader for HttpTemplateDownloader {
    async fn download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<PathBuf> {
        let failed = |reason: String| ScfError::TemplateDownload {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

        fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let path = dest_dir.join(filename);
        let temp_path = path.with_extension("download");
        fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| failed(e.to_string()))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| failed(e.to_string()))?;

        info!(%url, bytes = bytes.len(), path = %path.display(), "Downloaded template");
        Ok(path)
    }
}
