//! Recording collaborators for end-to-end component tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use scf_common::{
    DeploymentState, FunctionInputs, FunctionProvider, LifecycleRule, ObjectStorage, PackRequest,
    PackSummary, Packager, ProviderApi, ProviderOutput, ProviderTrigger, Result, ScfError,
    StateStore, SubDomain, TemplateDownloader, Value,
};
use scf_component::{Collaborators, ComponentConfig, ScfComponent};
use scf_toolkit::MemoryStateStore;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

pub const APP_ID: &str = "1250000000";

/// How the mock provider answers a deploy call.
#[derive(Clone, Debug)]
pub enum ProviderBehavior {
    /// Echo the inputs back the way the real provider reports them.
    Echo,
    /// Echo, then overlay these raw PascalCase fields (null removes a field).
    EchoWith(Value),
    Fail(String),
}

#[derive(Clone)]
pub struct MockProvider {
    pub deploys: Arc<Mutex<Vec<Value>>>,
    pub removals: Arc<Mutex<Vec<(String, ProviderOutput)>>>,
    pub behavior: Arc<RwLock<ProviderBehavior>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            deploys: Arc::new(Mutex::new(Vec::new())),
            removals: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(RwLock::new(ProviderBehavior::Echo)),
        }
    }

    pub async fn set_behavior(&self, behavior: ProviderBehavior) {
        *self.behavior.write().await = behavior;
    }

    pub async fn deploy_count(&self) -> usize {
        self.deploys.lock().await.len()
    }

    pub async fn last_deploy(&self) -> Option<Value> {
        self.deploys.lock().await.last().cloned()
    }

    fn echo(inputs: &Value) -> Value {
        let triggers: Vec<Value> = inputs["events"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|event| event.get("apigw"))
            .map(|apigw| {
                let parameters = &apigw["parameters"];
                let service_name = parameters["serviceName"].as_str().unwrap_or_default();
                let service_id = parameters["serviceId"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| format!("service-{service_name}"));
                let api_list: Vec<ProviderApi> = parameters["endpoints"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|endpoint| ProviderApi {
                        path: endpoint["path"].as_str().unwrap_or("/").to_string(),
                        ..Default::default()
                    })
                    .collect();
                serde_json::to_value(ProviderTrigger {
                    service_id: Some(service_id.clone()),
                    service_name: Some(service_name.to_string()),
                    sub_domain: Some(SubDomain::One(format!("{service_id}.gz.apigw.example.com"))),
                    protocols: parameters.get("protocols").cloned(),
                    environment: parameters["environment"].as_str().map(String::from),
                    api_list,
                    ..Default::default()
                })
                .unwrap()
            })
            .collect();

        json!({
            "FunctionName": inputs["name"],
            "Description": inputs["description"],
            "Region": inputs["region"],
            "Namespace": inputs.get("namespace").cloned().unwrap_or(json!("default")),
            "Runtime": inputs["runtime"],
            "Handler": inputs["handler"],
            "MemorySize": inputs.get("memorySize").cloned().unwrap_or(json!(128)),
            "Triggers": triggers
        })
    }
}

#[async_trait]
impl FunctionProvider for MockProvider {
    async fn deploy(&self, inputs: &FunctionInputs) -> Result<ProviderOutput> {
        let inputs = serde_json::to_value(inputs)?;
        self.deploys.lock().await.push(inputs.clone());

        let mut raw = Self::echo(&inputs);
        match self.behavior.read().await.clone() {
            ProviderBehavior::Echo => {}
            ProviderBehavior::EchoWith(Value::Object(overlay)) => {
                if let Value::Object(raw) = &mut raw {
                    for (key, value) in overlay {
                        if value.is_null() {
                            raw.remove(&key);
                        } else {
                            raw.insert(key, value);
                        }
                    }
                }
            }
            ProviderBehavior::EchoWith(_) => {}
            ProviderBehavior::Fail(message) => return Err(ScfError::Provider(message)),
        }
        Ok(serde_json::from_value(raw)?)
    }

    async fn remove(&self, region: &str, function: &ProviderOutput) -> Result<()> {
        self.removals
            .lock()
            .await
            .push((region.to_string(), function.clone()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockStorage {
    pub buckets: Arc<Mutex<Vec<(String, Vec<LifecycleRule>)>>>,
    pub uploads: Arc<Mutex<Vec<(String, PathBuf, String)>>>,
}

impl MockStorage {
    pub async fn call_count(&self) -> usize {
        self.buckets.lock().await.len() + self.uploads.lock().await.len()
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
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

#[derive(Clone, Default)]
pub struct MockPackager {
    pub requests: Arc<Mutex<Vec<PackRequest>>>,
}

#[async_trait]
impl Packager for MockPackager {
    async fn pack(&self, request: &PackRequest) -> Result<PackSummary> {
        self.requests.lock().await.push(request.clone());
        Ok(PackSummary {
            count: 4,
            path: request.output_path(),
        })
    }
}

#[derive(Clone, Default)]
pub struct MockDownloader {
    pub urls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TemplateDownloader for MockDownloader {
    async fn download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<PathBuf> {
        self.urls.lock().await.push(url.to_string());
        Ok(dest_dir.join(filename))
    }
}

/// State store whose writes always fail.
#[derive(Clone, Default)]
pub struct ReadOnlyStateStore {
    pub state: DeploymentState,
}

#[async_trait]
impl StateStore for ReadOnlyStateStore {
    async fn load(&self) -> Result<DeploymentState> {
        Ok(self.state.clone())
    }

    async fn save(&self, _state: &DeploymentState) -> Result<()> {
        Err(ScfError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only state directory",
        )))
    }
}

pub struct Harness {
    pub component: ScfComponent,
    pub provider: MockProvider,
    pub storage: MockStorage,
    pub packager: MockPackager,
    pub downloader: MockDownloader,
    pub state: MemoryStateStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(DeploymentState::default())
    }

    pub fn with_state(state: DeploymentState) -> Self {
        let provider = MockProvider::new();
        let storage = MockStorage::default();
        let packager = MockPackager::default();
        let downloader = MockDownloader::default();
        let state = MemoryStateStore::with_state(state);

        let component = ScfComponent::new(
            APP_ID,
            ComponentConfig::default(),
            Collaborators {
                provider: Arc::new(provider.clone()),
                storage: Arc::new(storage.clone()),
                packager: Arc::new(packager.clone()),
                downloader: Arc::new(downloader.clone()),
                state: Arc::new(state.clone()),
            },
        );

        Self {
            component,
            provider,
            storage,
            packager,
            downloader,
            state,
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
