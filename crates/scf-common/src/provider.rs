use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw deploy response from the function provider.
///
/// Only the fields the component reads are typed; everything else is kept in
/// `extra` so the persisted snapshot can be handed back to `remove` verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<ProviderLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,
    /// `Some(0.0)` is a real value, not "unset".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_traffic_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<ProviderTrigger>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderLayer {
    pub layer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_version: Option<u64>,
}

/// Trigger as reported back by the provider. API Gateway triggers carry the
/// service identity and the published endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_domain: Option<SubDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_list: Vec<ProviderApi>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderTrigger {
    /// `https` when any declared protocol mentions it, `http` otherwise.
    pub fn default_protocol(&self) -> &'static str {
        let mentions_https = match &self.protocols {
            Some(Value::String(protocols)) => protocols.contains("https"),
            Some(Value::Array(protocols)) => protocols
                .iter()
                .any(|p| p.as_str().is_some_and(|p| p.contains("https"))),
            _ => false,
        };
        if mentions_https {
            "https"
        } else {
            "http"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubDomain {
    One(String),
    Many(Vec<String>),
}

impl SubDomain {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let domains: &[String] = match self {
            SubDomain::One(domain) => std::slice::from_ref(domain),
            SubDomain::Many(domains) => domains,
        };
        domains.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderApi {
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
