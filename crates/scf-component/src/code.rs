//! Code artifact resolution: explicit reference, packaged local source, or
//! the hosted default template.

use std::path::PathBuf;
use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;
use scf_common::{
    CodeLocation, CodeSource, ObjectStorage, PackRequest, Packager, Result, ScfError,
    TemplateDownloader,
};
use tracing::{debug, info, instrument};

use crate::config::ComponentConfig;

const TEMPLATE_ARCHIVE: &str = "template.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCode {
    pub code: CodeLocation,
    /// Set only when the hosted template was downloaded and uploaded.
    pub use_default: bool,
}

#[derive(Clone)]
pub struct CodeResolver {
    config: Arc<ComponentConfig>,
    storage: Arc<dyn ObjectStorage>,
    packager: Arc<dyn Packager>,
    downloader: Arc<dyn TemplateDownloader>,
}

impl CodeResolver {
    pub fn new(
        config: Arc<ComponentConfig>,
        storage: Arc<dyn ObjectStorage>,
        packager: Arc<dyn Packager>,
        downloader: Arc<dyn TemplateDownloader>,
    ) -> Self {
        Self {
            config,
            storage,
            packager,
            downloader,
        }
    }

    /// Resolves where the provider should fetch the function code from,
    /// uploading an artifact first when needed.
    ///
    /// The returned bucket is the base name; storage calls use
    /// `<base>-<app_id>`.
    #[instrument(skip(self, source))]
    pub async fn resolve(
        &self,
        source: Option<&CodeSource>,
        function_name: &str,
        app_id: &str,
        region: &str,
    ) -> Result<ResolvedCode> {
        let source = source.cloned().unwrap_or_default();

        if let (Some(bucket), Some(object)) = (&source.bucket, &source.object) {
            debug!(%bucket, %object, "Using explicit code location");
            return Ok(ResolvedCode {
                code: CodeLocation {
                    bucket: bucket.clone(),
                    object: object.clone(),
                },
                use_default: false,
            });
        }
        if let (Some(bucket), None, None) = (&source.bucket, &source.object, &source.src) {
            return Err(ScfError::MissingCodeSource {
                bucket: bucket.clone(),
            });
        }

        let base = source
            .bucket
            .clone()
            .unwrap_or_else(|| self.config.default_bucket(region));
        let storage_bucket = format!("{base}-{app_id}");

        if source.bucket.is_none() {
            info!(bucket = %storage_bucket, "Ensuring default code bucket");
            self.storage
                .ensure_bucket(&storage_bucket, &self.config.code_lifecycle())
                .await?;
        }

        if let Some(object) = source.object {
            return Ok(ResolvedCode {
                code: CodeLocation {
                    bucket: base,
                    object,
                },
                use_default: false,
            });
        }

        let object = object_key();
        let (artifact, use_default) = match source.src.as_deref() {
            Some(src) => (self.prepare_local(src, &source, function_name).await?, false),
            None => (self.download_template().await?, true),
        };

        info!(bucket = %storage_bucket, %object, artifact = %artifact.display(), "Uploading code package");
        self.storage
            .upload(&storage_bucket, &artifact, &object)
            .await?;

        Ok(ResolvedCode {
            code: CodeLocation {
                bucket: base,
                object,
            },
            use_default,
        })
    }

    async fn prepare_local(
        &self,
        src: &str,
        source: &CodeSource,
        function_name: &str,
    ) -> Result<PathBuf> {
        let output_name = format!("{function_name}.zip");
        let output = self.config.cache_dir.join(&output_name);

        if self.config.is_prebuilt_archive(src) {
            let failed = |e: std::io::Error| {
                ScfError::Packaging(format!(
                    "Failed to copy pre-built archive {src} to {}: {e}",
                    output.display()
                ))
            };
            let prebuilt = tokio::fs::canonicalize(src).await.map_err(failed)?;
            tokio::fs::create_dir_all(&self.config.cache_dir)
                .await
                .map_err(failed)?;
            let target = tokio::fs::canonicalize(&self.config.cache_dir)
                .await
                .map_err(failed)?
                .join(&output_name);
            if prebuilt != target {
                tokio::fs::copy(&prebuilt, &target).await.map_err(failed)?;
            }
            debug!(source = %src, "Using pre-built archive as is");
            return Ok(output);
        }

        info!(source = %src, "Packaging code");
        let summary = self
            .packager
            .pack(&PackRequest {
                source: PathBuf::from(src),
                include: source.include.clone(),
                exclude: source.exclude.clone(),
                output_dir: self.config.cache_dir.clone(),
                output_name,
            })
            .await?;
        if summary.count == 0 {
            return Err(ScfError::EmptyArchive {
                path: PathBuf::from(src),
            });
        }
        Ok(summary.path)
    }

    async fn download_template(&self) -> Result<PathBuf> {
        let url = &self.config.template_url;
        info!(%url, "Downloading default template");
        self.downloader
            .download(url, &self.config.cache_dir, TEMPLATE_ARCHIVE)
            .await
            .map_err(|e| match e {
                ScfError::TemplateDownload { .. } => e,
                other => ScfError::TemplateDownload {
                    url: url.clone(),
                    reason: other.to_string(),
                },
            })
    }
}

/// `/Serverless-Devs-Tool-<random>-<unix seconds>.zip`
fn object_key() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!(
        "/Serverless-Devs-Tool-{}-{}.zip",
        suffix.to_lowercase(),
        chrono::Utc::now().timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use async_trait::async_trait;
    use scf_common::{LifecycleRule, PackSummary};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingStorage {
        buckets: Mutex<Vec<(String, Vec<LifecycleRule>)>>,
        uploads: Mutex<Vec<(String, PathBuf, String)>>,
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn ensure_bucket(&self, bucket: &str, lifecycle: &[LifecycleRule]) -> Result<()> {
            self.buckets
                .lock()
                .await
                .push((bucket.to_string(), lifecycle.to_vec()));
            Ok(())
        }

        async fn upload(&self, bucket: &str, file: &Path, key: &str) -> Result<()> {
            self.uploads
                .lock()
                .await
                .push((bucket.to_string(), file.to_path_buf(), key.to_string()));
            Ok(())
        }
    }

    struct FixedPackager {
        count: usize,
        requests: Mutex<Vec<PackRequest>>,
    }

    #[async_trait]
    impl Packager for FixedPackager {
        async fn pack(&self, request: &PackRequest) -> Result<PackSummary> {
            self.requests.lock().await.push(request.clone());
            Ok(PackSummary {
                count: self.count,
                path: request.output_path(),
            })
        }
    }

    struct StubDownloader {
        fail: bool,
    }

    #[async_trait]
    impl TemplateDownloader for StubDownloader {
        async fn download(&self, _url: &str, dest_dir: &Path, filename: &str) -> Result<PathBuf> {
            if self.fail {
                return Err(ScfError::Io(std::io::Error::other("connection reset")));
            }
            Ok(dest_dir.join(filename))
        }
    }

    struct Fixture {
        resolver: CodeResolver,
        storage: Arc<RecordingStorage>,
        packager: Arc<FixedPackager>,
    }

    fn fixture(config: ComponentConfig, packed: usize, download_fails: bool) -> Fixture {
        let storage = Arc::new(RecordingStorage::default());
        let packager = Arc::new(FixedPackager {
            count: packed,
            requests: Mutex::new(Vec::new()),
        });
        let resolver = CodeResolver::new(
            Arc::new(config),
            storage.clone(),
            packager.clone(),
            Arc::new(StubDownloader {
                fail: download_fails,
            }),
        );
        Fixture {
            resolver,
            storage,
            packager,
        }
    }

    #[tokio::test]
    async fn test_explicit_location_skips_storage() {
        let f = fixture(ComponentConfig::default(), 1, false);
        let source = CodeSource {
            bucket: Some("my-bucket".to_string()),
            object: Some("code.zip".to_string()),
            ..Default::default()
        };
        let resolved = f
            .resolver
            .resolve(Some(&source), "fn1", "1250000000", "ap-guangzhou")
            .await
            .unwrap();
        assert_eq!(resolved.code.bucket, "my-bucket");
        assert_eq!(resolved.code.object, "code.zip");
        assert!(!resolved.use_default);
        assert!(f.storage.buckets.lock().await.is_empty());
        assert!(f.storage.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_source_uses_template() {
        let f = fixture(ComponentConfig::default(), 1, false);
        let resolved = f
            .resolver
            .resolve(None, "fn1", "1250000000", "ap-guangzhou")
            .await
            .unwrap();
        assert!(resolved.use_default);
        assert_eq!(resolved.code.bucket, "s-scf-ap-guangzhou-code");
        assert!(resolved.code.object.starts_with("/Serverless-Devs-Tool-"));
        assert!(resolved.code.object.ends_with(".zip"));

        let buckets = f.storage.buckets.lock().await;
        assert_eq!(buckets[0].0, "s-scf-ap-guangzhou-code-1250000000");
        assert_eq!(buckets[0].1[0].expiration_days, 10);

        let uploads = f.storage.uploads.lock().await;
        assert_eq!(uploads[0].0, "s-scf-ap-guangzhou-code-1250000000");
        assert!(uploads[0].1.ends_with("template.zip"));
        assert_eq!(uploads[0].2, resolved.code.object);
    }

    #[tokio::test]
    async fn test_local_source_is_packed_and_uploaded() {
        let f = fixture(ComponentConfig::default(), 3, false);
        let source = CodeSource {
            src: Some("./src".to_string()),
            exclude: vec!["*.md".to_string()],
            ..Default::default()
        };
        let resolved = f
            .resolver
            .resolve(Some(&source), "fn1", "1", "ap-guangzhou")
            .await
            .unwrap();
        assert!(!resolved.use_default);

        let requests = f.packager.requests.lock().await;
        assert_eq!(requests[0].source, PathBuf::from("./src"));
        assert_eq!(requests[0].exclude, vec!["*.md".to_string()]);
        assert_eq!(requests[0].output_name, "fn1.zip");
        assert!(f.storage.uploads.lock().await[0].1.ends_with("fn1.zip"));
    }

    #[tokio::test]
    async fn test_empty_archive_fails() {
        let f = fixture(ComponentConfig::default(), 0, false);
        let err = f
            .resolver
            .resolve(Some(&CodeSource::from_path("./empty")), "fn1", "1", "ap-guangzhou")
            .await
            .unwrap_err();
        assert!(matches!(err, ScfError::EmptyArchive { .. }));
        assert!(f.storage.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_prebuilt_archive_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("app.jar");
        std::fs::write(&jar, b"PK\x03\x04jar").unwrap();
        let config = ComponentConfig {
            cache_dir: dir.path().join("cache"),
            ..Default::default()
        };
        let f = fixture(config, 1, false);

        let source = CodeSource::from_path(jar.to_string_lossy());
        f.resolver
            .resolve(Some(&source), "fn1", "1", "ap-guangzhou")
            .await
            .unwrap();

        assert!(f.packager.requests.lock().await.is_empty());
        let copied = dir.path().join("cache").join("fn1.zip");
        assert_eq!(std::fs::read(&copied).unwrap(), b"PK\x03\x04jar");
        assert_eq!(f.storage.uploads.lock().await[0].1, copied);
    }

    #[tokio::test]
    async fn test_missing_prebuilt_archive_is_a_packaging_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("missing.jar");
        let config = ComponentConfig {
            cache_dir: dir.path().join("cache"),
            ..Default::default()
        };
        let f = fixture(config, 1, false);

        let source = CodeSource::from_path(jar.to_string_lossy());
        let err = f
            .resolver
            .resolve(Some(&source), "fn1", "1", "ap-guangzhou")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PACKAGE_SCF_CODE");
        assert!(err.to_string().contains(&*jar.to_string_lossy()), "{err}");
        assert!(f.storage.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_bucket_without_source_or_object_fails() {
        let f = fixture(ComponentConfig::default(), 1, false);
        let source = CodeSource {
            bucket: Some("mine".to_string()),
            ..Default::default()
        };
        let err = f
            .resolver
            .resolve(Some(&source), "fn1", "1", "ap-guangzhou")
            .await
            .unwrap_err();
        assert!(matches!(err, ScfError::MissingCodeSource { ref bucket } if bucket == "mine"));
        assert!(f.storage.buckets.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_bucket_is_not_provisioned() {
        let f = fixture(ComponentConfig::default(), 2, false);
        let source = CodeSource {
            bucket: Some("mine".to_string()),
            src: Some("./src".to_string()),
            ..Default::default()
        };
        let resolved = f
            .resolver
            .resolve(Some(&source), "fn1", "1250", "ap-guangzhou")
            .await
            .unwrap();
        assert_eq!(resolved.code.bucket, "mine");
        assert!(f.storage.buckets.lock().await.is_empty());
        assert_eq!(f.storage.uploads.lock().await[0].0, "mine-1250");
    }

    #[tokio::test]
    async fn test_download_failure_carries_url() {
        let f = fixture(ComponentConfig::default(), 1, true);
        let err = f
            .resolver
            .resolve(None, "fn1", "1", "ap-guangzhou")
            .await
            .unwrap_err();
        match err {
            ScfError::TemplateDownload { url, reason } => {
                assert!(url.ends_with("scf-demo.zip"));
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
