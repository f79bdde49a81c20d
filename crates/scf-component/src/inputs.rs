//! Declarative resource spec -> provider-shaped [`FunctionInputs`].
//!
//! The mapping is a table of `source path -> target key -> transform`
//! entries, applied in order. A field is present when it exists and is not
//! null; later entries overwrite earlier ones that share a target key.

use scf_common::{
    ApigwParameters, ApigwTrigger, CodeSource, EventTrigger, FunctionInputs, Result, ScfError,
    Trigger, APIGW,
};
use serde_json::{Map, Value};

use crate::normalize::{lower_first, normalize_keys, normalize_map, transform_endpoint};

/// Declarative description of one function resource (`PascalCase` keys).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    properties: Value,
}

impl ResourceSpec {
    /// Accepts either the bare properties block or a document that wraps it
    /// under `Properties`.
    pub fn new(document: Value) -> Self {
        let properties = match document {
            Value::Object(mut map) if map.contains_key("Properties") => {
                map.remove("Properties").unwrap_or(Value::Null)
            }
            other => other,
        };
        Self { properties }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let document: Value =
            serde_yaml::from_str(source).map_err(|e| ScfError::InvalidField {
                field: "Properties".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(document))
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(source)?))
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Looks up a nested field; null counts as absent.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.properties, path)
    }
}

fn lookup<'a>(node: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(node, |current, segment| current.get(segment))
        .filter(|value| !value.is_null())
}

type FieldPicks = &'static [(&'static [&'static str], &'static str)];

#[derive(Debug, Clone, Copy)]
enum Transform {
    Verbatim,
    /// `[{Key, Value}]` folded into a mapping, optionally nested under a key.
    Pairs { wrap: Option<&'static str> },
    /// Sub-object mapped field by field.
    Fields(FieldPicks),
    /// Sequence of sub-objects, each mapped field by field.
    EachFields(FieldPicks),
    Normalize,
}

#[derive(Debug, Clone, Copy)]
struct FieldMapping {
    source: &'static [&'static str],
    target: &'static str,
    transform: Transform,
}

const fn field(
    source: &'static [&'static str],
    target: &'static str,
    transform: Transform,
) -> FieldMapping {
    FieldMapping {
        source,
        target,
        transform,
    }
}

const FIELD_TABLE: &[FieldMapping] = &[
    field(&["Function", "Name"], "name", Transform::Verbatim),
    field(&["Function", "Role"], "role", Transform::Verbatim),
    field(&["Namespace", "Name"], "namespace", Transform::Verbatim),
    field(&["Function", "Description"], "description", Transform::Verbatim),
    field(&["Function", "Handler"], "handler", Transform::Verbatim),
    field(&["Function", "Runtime"], "runtime", Transform::Verbatim),
    field(&["Region"], "region", Transform::Verbatim),
    field(&["Function", "MemorySize"], "memorySize", Transform::Verbatim),
    field(&["Function", "Timeout"], "timeout", Transform::Verbatim),
    field(
        &["Function", "Environment"],
        "environment",
        Transform::Pairs {
            wrap: Some("variables"),
        },
    ),
    field(&["Function", "InternetAccess"], "publicAccess", Transform::Verbatim),
    field(
        &["Function", "VPC"],
        "vpcConfig",
        Transform::Fields(&[(&["VpcId"], "vpcId"), (&["SubnetId"], "subnetId")]),
    ),
    field(
        &["Function", "Cfs"],
        "cfs",
        Transform::EachFields(&[
            (&["CfsId"], "cfsId"),
            (&["MountInsId"], "mountInsId"),
            (&["MountDir", "local"], "localMountDir"),
            (&["MountDir", "remote"], "remoteMountDir"),
        ]),
    ),
    field(
        &["Function", "DeadLetter"],
        "deadLetter",
        Transform::Fields(&[
            (&["Type"], "type"),
            (&["Name"], "name"),
            (&["FilterType"], "filterType"),
        ]),
    ),
    field(
        &["Function", "Layers"],
        "layers",
        Transform::EachFields(&[(&["Name"], "name"), (&["Version"], "version")]),
    ),
    field(
        &["Function", "Cls"],
        "cls",
        Transform::Fields(&[(&["LogsetId"], "logsetId"), (&["TopicId"], "topicId")]),
    ),
    field(&["Function", "Eip"], "eip", Transform::Verbatim),
    field(&["Function", "Tags"], "tags", Transform::Pairs { wrap: None }),
    field(&["Function", "CodeUri"], "src", Transform::Normalize),
    field(&["Function", "Traffic"], "traffic", Transform::Verbatim),
    field(&["Function", "LastVersion"], "lastVersion", Transform::Verbatim),
    field(&["Function", "AutoCreateApi"], "autoCreateApi", Transform::Verbatim),
    // a service name wins over a namespace name
    field(&["Service", "Name"], "namespace", Transform::Verbatim),
];

fn apply(mapping: &FieldMapping, value: &Value) -> Result<Value> {
    let field_name = mapping.source.join(".");
    match mapping.transform {
        Transform::Verbatim => Ok(value.clone()),
        Transform::Normalize => Ok(normalize_keys(value)),
        Transform::Pairs { wrap } => {
            let folded = Value::Object(fold_pairs(&field_name, value)?);
            Ok(match wrap {
                Some(key) => {
                    let mut wrapper = Map::new();
                    wrapper.insert(key.to_string(), folded);
                    Value::Object(wrapper)
                }
                None => folded,
            })
        }
        Transform::Fields(picks) => Ok(Value::Object(pick_fields(value, picks))),
        Transform::EachFields(picks) => match value {
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| Value::Object(pick_fields(item, picks)))
                    .collect(),
            )),
            _ => Err(ScfError::InvalidField {
                field: field_name,
                reason: "expected a list".to_string(),
            }),
        },
    }
}

fn fold_pairs(field_name: &str, value: &Value) -> Result<Map<String, Value>> {
    let invalid = |reason: &str| ScfError::InvalidField {
        field: field_name.to_string(),
        reason: reason.to_string(),
    };
    let Value::Array(pairs) = value else {
        return Err(invalid("expected a list of {Key, Value} pairs"));
    };

    let mut folded = Map::new();
    for pair in pairs {
        let key = match pair.get("Key") {
            Some(Value::String(key)) => key.clone(),
            Some(Value::Number(key)) => key.to_string(),
            _ => return Err(invalid("every pair needs a string Key")),
        };
        let value = pair.get("Value").cloned().unwrap_or(Value::Null);
        folded.insert(key, value);
    }
    Ok(folded)
}

fn pick_fields(value: &Value, picks: FieldPicks) -> Map<String, Value> {
    picks
        .iter()
        .filter_map(|(path, target)| {
            lookup(value, path).map(|found| (target.to_string(), found.clone()))
        })
        .collect()
}

/// Builds the provider-shaped inputs. Defaults are not filled in here.
pub fn build_inputs(spec: &ResourceSpec) -> Result<FunctionInputs> {
    let mut properties = Map::new();
    for mapping in FIELD_TABLE {
        if let Some(value) = spec.get(mapping.source) {
            properties.insert(mapping.target.to_string(), apply(mapping, value)?);
        }
    }

    let events = match spec.get(&["Function", "Triggers"]) {
        Some(triggers) => build_events(triggers)?,
        None => Vec::new(),
    };

    Ok(FunctionInputs {
        name: take_string(&mut properties, "name")?,
        region: take_string(&mut properties, "region")?,
        runtime: take_string(&mut properties, "runtime")?,
        handler: take_string(&mut properties, "handler")?,
        description: take_string(&mut properties, "description")?,
        code: None,
        events,
        traffic: take_traffic(&mut properties)?,
        last_version: take_string(&mut properties, "lastVersion")?,
        src: take_code_source(&mut properties)?,
        auto_create_api: take_flag(&mut properties, "autoCreateApi")?,
        properties,
    })
}

fn take_string(properties: &mut Map<String, Value>, key: &str) -> Result<Option<String>> {
    match properties.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(Value::Bool(value)) => Ok(Some(value.to_string())),
        Some(_) => Err(ScfError::InvalidField {
            field: key.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

fn take_flag(properties: &mut Map<String, Value>, key: &str) -> Result<bool> {
    match properties.remove(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(flag),
        Some(other) => Err(ScfError::InvalidField {
            field: key.to_string(),
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

/// Traffic must be a number within `[0, 1]`; zero is a real value.
pub fn validate_traffic(value: &Value) -> Result<f64> {
    let traffic = value.as_f64().ok_or_else(|| ScfError::InvalidTraffic {
        value: value.to_string(),
    })?;
    if !(0.0..=1.0).contains(&traffic) {
        return Err(ScfError::TrafficOutOfRange { value: traffic });
    }
    Ok(traffic)
}

fn take_traffic(properties: &mut Map<String, Value>) -> Result<Option<f64>> {
    match properties.remove("traffic") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => validate_traffic(&value).map(Some),
    }
}

fn take_code_source(properties: &mut Map<String, Value>) -> Result<Option<CodeSource>> {
    let invalid = |reason: &str| ScfError::InvalidField {
        field: "Function.CodeUri".to_string(),
        reason: reason.to_string(),
    };
    match properties.remove("src") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(path)) => Ok(Some(CodeSource::from_path(path))),
        Some(Value::Object(fields)) => {
            let text = |key: &str| -> Result<Option<String>> {
                match fields.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(Value::String(value)) => Ok(Some(value.clone())),
                    Some(_) => Err(invalid(&format!("{key} must be a string"))),
                }
            };
            let patterns = |key: &str| -> Result<Vec<String>> {
                match fields.get(key) {
                    None | Some(Value::Null) => Ok(Vec::new()),
                    Some(Value::String(pattern)) => Ok(vec![pattern.clone()]),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .map(String::from)
                                .ok_or_else(|| invalid(&format!("{key} must list strings")))
                        })
                        .collect(),
                    Some(_) => Err(invalid(&format!("{key} must be a string or a list"))),
                }
            };
            Ok(Some(CodeSource {
                bucket: text("bucket")?,
                object: text("object")?,
                src: text("src")?,
                include: patterns("include")?,
                exclude: patterns("exclude")?,
            }))
        }
        Some(_) => Err(invalid("expected a path or an object")),
    }
}

fn build_events(triggers: &Value) -> Result<Vec<Trigger>> {
    let Value::Array(triggers) = triggers else {
        return Err(ScfError::InvalidField {
            field: "Function.Triggers".to_string(),
            reason: "expected a list".to_string(),
        });
    };
    triggers.iter().map(build_trigger).collect()
}

fn build_trigger(trigger: &Value) -> Result<Trigger> {
    let trigger_type = match lookup(trigger, &["Type"]) {
        Some(Value::String(trigger_type)) => trigger_type.clone(),
        _ => {
            return Err(ScfError::InvalidField {
                field: "Function.Triggers.Type".to_string(),
                reason: "every trigger needs a Type".to_string(),
            })
        }
    };
    let name = lookup(trigger, &["Name"])
        .and_then(Value::as_str)
        .map(String::from);
    let parameters = lookup(trigger, &["Parameters"])
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    if trigger_type == APIGW {
        Ok(Trigger::Apigw(ApigwTrigger {
            name,
            parameters: apigw_parameters(&parameters),
        }))
    } else {
        Ok(Trigger::Other(EventTrigger {
            trigger_type,
            name,
            parameters: normalize_map(&parameters),
        }))
    }
}

/// Maps an API Gateway trigger's `Parameters` block onto the provider shape.
pub fn apigw_parameters(parameters: &Value) -> ApigwParameters {
    let mut service_id = None;
    let mut service_name = None;
    let mut name = None;
    let mut description = None;
    let mut extra = Map::new();

    if let Value::Object(fields) = parameters {
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            let text = || value.as_str().map(String::from);
            // Reserved names are matched in either casing and never reach `extra`.
            match lower_first(key).as_str() {
                "serviceId" => service_id = text().or(service_id),
                "id" => service_id = service_id.or_else(text),
                "serviceName" => service_name = text(),
                "name" => name = text(),
                "description" => description = text(),
                "domains" | "customDomain" => {
                    extra.insert("customDomain".to_string(), normalize_keys(value));
                }
                "aPI" | "api" | "endpoints" => {
                    let endpoints = match value {
                        Value::Array(endpoints) => {
                            endpoints.iter().map(transform_endpoint).collect()
                        }
                        other => vec![transform_endpoint(other)],
                    };
                    extra.insert("endpoints".to_string(), Value::Array(endpoints));
                }
                other => {
                    extra.insert(other.to_string(), normalize_keys(value));
                }
            }
        }
    }

    ApigwParameters {
        service_id,
        service_name: service_name.or(name),
        description,
        extra,
    }
}
