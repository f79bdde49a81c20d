use std::path::PathBuf;

use scf_common::LifecycleRule;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Immutable defaults injected into the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    pub default_region: String,
    pub default_runtime: String,
    pub default_description: String,
    pub default_function_name: String,
    pub default_service_name: String,
    pub default_service_description: String,
    /// Hosted archive used when no code source is declared at all.
    pub template_url: String,
    pub trigger_types: Vec<String>,
    /// Extra parameters of the synthesized API Gateway trigger.
    pub default_apigw_parameters: Map<String, Value>,
    /// Local directory that holds packaged and downloaded archives.
    pub cache_dir: PathBuf,
    pub bucket_prefix: String,
    pub lifecycle_days: u32,
    /// Extensions uploaded as-is instead of being re-archived.
    pub prebuilt_extensions: Vec<String>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        let default_apigw_parameters = json!({
            "protocols": ["http", "https"],
            "environment": "release",
            "endpoints": [{ "path": "/", "method": "ANY" }]
        });

        Self {
            default_region: "ap-guangzhou".to_string(),
            default_runtime: "Nodejs10.15".to_string(),
            default_description: "This is a function created by serverless devs".to_string(),
            default_function_name: "ServerlessDevsFunction".to_string(),
            default_service_name: "serverless".to_string(),
            default_service_description: "The service of serverless scf".to_string(),
            template_url:
                "https://serverless-templates-1300862921.cos.ap-beijing.myqcloud.com/scf-demo.zip"
                    .to_string(),
            trigger_types: ["apigw", "cos", "timer", "cmq", "ckafka"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_apigw_parameters: default_apigw_parameters
                .as_object()
                .cloned()
                .unwrap_or_default(),
            cache_dir: PathBuf::from("./.s/cache"),
            bucket_prefix: "s-scf".to_string(),
            lifecycle_days: 10,
            prebuilt_extensions: [".s-zip", ".jar", ".war"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ComponentConfig {
    /// Defaults overridden by `SCF_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(region) = std::env::var("SCF_DEFAULT_REGION") {
            config.default_region = region;
        }
        if let Ok(runtime) = std::env::var("SCF_DEFAULT_RUNTIME") {
            config.default_runtime = runtime;
        }
        if let Ok(url) = std::env::var("SCF_TEMPLATE_URL") {
            config.template_url = url;
        }
        if let Ok(dir) = std::env::var("SCF_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("SCF_BUCKET_PREFIX") {
            config.bucket_prefix = prefix;
        }
        config
    }

    pub fn handler_for(&self, runtime: &str) -> String {
        let runtime = runtime.to_ascii_lowercase();
        if runtime.starts_with("go") {
            "main".to_string()
        } else if runtime.starts_with("java") {
            "example.Hello::mainHandler".to_string()
        } else {
            "index.main_handler".to_string()
        }
    }

    pub fn default_trigger_name(&self, trigger_type: &str) -> String {
        format!("{trigger_type}-serverless-trigger")
    }

    pub fn is_trigger_type_allowed(&self, trigger_type: &str) -> bool {
        self.trigger_types.iter().any(|t| t == trigger_type)
    }

    /// Default code bucket for a region, before the account id suffix.
    pub fn default_bucket(&self, region: &str) -> String {
        format!("{}-{region}-code", self.bucket_prefix)
    }

    pub fn code_lifecycle(&self) -> Vec<LifecycleRule> {
        vec![LifecycleRule::expire_all_after(
            "deleteObject",
            self.lifecycle_days,
        )]
    }

    pub fn is_prebuilt_archive(&self, path: &str) -> bool {
        self.prebuilt_extensions
            .iter()
            .any(|extension| path.ends_with(extension.as_str()))
    }
}
