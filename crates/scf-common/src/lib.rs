// Re-export dependencies used in public interfaces of common types

use std::path::{Path, PathBuf};

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{Map, Value};
use thiserror::Error;

mod model;
mod provider;
mod state;

pub use model::{
    ApigwParameters, ApigwTrigger, CodeLocation, CodeSource, EventTrigger, FunctionInputs,
    Trigger, APIGW,
};
pub use provider::{ProviderApi, ProviderLayer, ProviderOutput, ProviderTrigger, SubDomain};
pub use state::DeploymentState;

/// Component name used to build machine-readable error codes.
pub const COMPONENT_NAME: &str = "scf";

#[derive(Error, Debug)]
pub enum ScfError {
    #[error("Unknown trigger type {trigger_type}, must be one of {allowed:?}")]
    UnknownTriggerType {
        trigger_type: String,
        allowed: Vec<String>,
    },

    #[error("API Gateway name must be unique: service `{service_name}` is declared more than once")]
    DuplicateApigwService { service_name: String },

    #[error("traffic must be a number, got {value}")]
    InvalidTraffic { value: String },

    #[error("traffic must be a number between 0 and 1, got {value}")]
    TrafficOutOfRange { value: f64 },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Download default template {url} failed: {reason}")]
    TemplateDownload { url: String, reason: String },

    #[error("Zip file error: no files were packed from {}", path.display())]
    EmptyArchive { path: PathBuf },

    #[error("No code source to package for bucket {bucket}")]
    MissingCodeSource { bucket: String },

    #[error("Packaging Error: {0}")]
    Packaging(String),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Provider Error: {0}")]
    Provider(String),

    #[error("State Persistence Error: {0}")]
    StatePersistence(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScfError {
    /// Stable machine-readable code, e.g. `PARAMETER_SCF_TRAFFIC`.
    pub fn code(&self) -> String {
        let component = COMPONENT_NAME.to_uppercase();
        let kind = match self {
            ScfError::UnknownTriggerType { .. } | ScfError::DuplicateApigwService { .. } => {
                "PARAMETER_{}_APIGW_TRIGGER"
            }
            ScfError::InvalidTraffic { .. } | ScfError::TrafficOutOfRange { .. } => {
                "PARAMETER_{}_TRAFFIC"
            }
            ScfError::InvalidField { .. } => "PARAMETER_{}_FIELD",
            ScfError::TemplateDownload { .. } => "DOWNLOAD_{}_TEMPLATE",
            ScfError::EmptyArchive { .. }
            | ScfError::MissingCodeSource { .. }
            | ScfError::Packaging(_) => "PACKAGE_{}_CODE",
            ScfError::Storage(_) => "UPLOAD_{}_CODE",
            ScfError::Provider(_) => "PROVIDER_{}_API",
            ScfError::StatePersistence(_) => "STATE_{}_SAVE",
            ScfError::Io(_) | ScfError::Serialization(_) => "INTERNAL_{}_ERROR",
        };
        kind.replace("{}", &component)
    }

    /// Validation errors are raised before any network call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScfError::UnknownTriggerType { .. }
                | ScfError::DuplicateApigwService { .. }
                | ScfError::InvalidTraffic { .. }
                | ScfError::TrafficOutOfRange { .. }
                | ScfError::InvalidField { .. }
        )
    }
}

// Define the primary Result type for SCF operations
pub type Result<T> = std::result::Result<T, ScfError>;

/// Lifecycle rule applied to the default code bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub id: String,
    pub enabled: bool,
    /// Key prefix the rule applies to; empty means the whole bucket.
    pub prefix: String,
    pub expiration_days: u32,
    pub abort_incomplete_multipart_days: u32,
}

impl LifecycleRule {
    /// Rule that deletes every object and aborts stale multipart uploads after `days`.
    pub fn expire_all_after(id: impl Into<String>, days: u32) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            prefix: String::new(),
            expiration_days: days,
            abort_incomplete_multipart_days: days,
        }
    }
}

/// Request to archive a local source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRequest {
    pub source: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub output_dir: PathBuf,
    pub output_name: String,
}

impl PackRequest {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSummary {
    /// Number of files written into the archive.
    pub count: usize,
    pub path: PathBuf,
}

/// Cloud function provider client.
#[async_trait]
pub trait FunctionProvider: Send + Sync {
    async fn deploy(&self, inputs: &FunctionInputs) -> Result<ProviderOutput>;

    /// Removing a function that no longer exists must succeed.
    async fn remove(&self, region: &str, function: &ProviderOutput) -> Result<()>;
}

/// Object storage client used for code artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Idempotent: an existing bucket only gets its lifecycle rules refreshed.
    async fn ensure_bucket(&self, bucket: &str, lifecycle: &[LifecycleRule]) -> Result<()>;

    async fn upload(&self, bucket: &str, file: &Path, key: &str) -> Result<()>;
}

#[async_trait]
pub trait Packager: Send + Sync {
    async fn pack(&self, request: &PackRequest) -> Result<PackSummary>;
}

#[async_trait]
pub trait TemplateDownloader: Send + Sync {
    /// Downloads `url` to `dest_dir/filename` and returns the written path.
    async fn download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<PathBuf>;
}

/// Persisted state, scoped to one logical resource instance.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<DeploymentState>;

    async fn save(&self, state: &DeploymentState) -> Result<()>;

    async fn clear(&self) -> Result<()> {
        self.save(&DeploymentState::default()).await
    }
}
