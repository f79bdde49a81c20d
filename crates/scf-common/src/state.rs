use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ProviderOutput;

/// State persisted between invocations for one deployed function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Last raw provider output, handed back verbatim on removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<ProviderOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
    /// Only meaningful while `traffic` is not 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_traffic_version: Option<String>,
    /// API Gateway service name -> provider-assigned service id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub apigw: BTreeMap<String, String>,
    /// Function name exposed for online debugging tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_arn: Option<String>,
}

impl DeploymentState {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function.as_ref()?.function_name.as_deref()
    }

    pub fn service_id(&self, service_name: &str) -> Option<&str> {
        self.apigw.get(service_name).map(String::as_str)
    }
}
