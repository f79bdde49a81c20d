use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Trigger type with dedicated reconciliation rules.
pub const APIGW: &str = "apigw";

/// Event source binding, serialized as `{ "<type>": { "name": .., "parameters": .. } }`.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Apigw(ApigwTrigger),
    Other(EventTrigger),
}

impl Trigger {
    pub fn trigger_type(&self) -> &str {
        match self {
            Trigger::Apigw(_) => APIGW,
            Trigger::Other(event) => &event.trigger_type,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Trigger::Apigw(apigw) => apigw.name.as_deref(),
            Trigger::Other(event) => event.name.as_deref(),
        }
    }

    pub fn as_apigw(&self) -> Option<&ApigwTrigger> {
        match self {
            Trigger::Apigw(apigw) => Some(apigw),
            Trigger::Other(_) => None,
        }
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Trigger::Apigw(apigw) => map.serialize_entry(APIGW, apigw)?,
            Trigger::Other(event) => map.serialize_entry(&event.trigger_type, event)?,
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApigwTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameters: ApigwParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApigwParameters {
    /// Only set when an existing API Gateway service is being updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// protocols, environment, endpoints, customDomain, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    #[serde(skip)]
    pub trigger_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Code reference as declared by the caller; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSource {
    pub bucket: Option<String>,
    pub object: Option<String>,
    pub src: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl CodeSource {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            src: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Resolved code location handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub bucket: String,
    pub object: String,
}

/// Provider-shaped deploy parameters (lowerCamel keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeLocation>,
    pub events: Vec<Trigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,
    #[serde(skip)]
    pub src: Option<CodeSource>,
    #[serde(skip)]
    pub auto_create_api: bool,
    /// role, namespace, memorySize, timeout, environment, vpcConfig, cfs, ...
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}
