use std::collections::{BTreeMap, BTreeSet};

use scf_common::{
    ApigwParameters, ApigwTrigger, DeploymentState, EventTrigger, Result, ScfError, Trigger, APIGW,
};
use tracing::debug;

use crate::config::ComponentConfig;

/// Trigger list ready for the provider, plus the per-type output index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub events: Vec<Trigger>,
    /// Trigger type -> trigger names. API Gateway entries stay empty here and
    /// are filled with URLs once the provider has answered.
    pub index: BTreeMap<String, Vec<String>>,
    pub has_apigw: bool,
}

/// Attaches service ids recorded by a previous deployment to API Gateway
/// triggers whose name matches a known service. Explicit ids are kept.
pub fn attach_known_service_ids(events: &[Trigger], state: &DeploymentState) -> Vec<Trigger> {
    if state.apigw.is_empty() {
        return events.to_vec();
    }
    events
        .iter()
        .map(|trigger| match trigger {
            Trigger::Apigw(apigw) if apigw.parameters.service_id.is_none() => {
                let known = apigw
                    .name
                    .as_deref()
                    .and_then(|name| state.service_id(name));
                match known {
                    Some(service_id) => Trigger::Apigw(ApigwTrigger {
                        name: apigw.name.clone(),
                        parameters: ApigwParameters {
                            service_id: Some(service_id.to_string()),
                            ..apigw.parameters.clone()
                        },
                    }),
                    None => trigger.clone(),
                }
            }
            _ => trigger.clone(),
        })
        .collect()
}

/// Validates trigger types, enforces unique API Gateway service names and
/// fills in defaults. Fails as a whole on the first invalid trigger.
pub fn reconcile(
    events: &[Trigger],
    auto_create_api: bool,
    state: &DeploymentState,
    config: &ComponentConfig,
) -> Result<Reconciled> {
    let mut reconciled = Reconciled::default();
    let mut service_names = BTreeSet::new();

    for trigger in events {
        let trigger_type = trigger.trigger_type();
        if !config.is_trigger_type_allowed(trigger_type) {
            return Err(ScfError::UnknownTriggerType {
                trigger_type: trigger_type.to_string(),
                allowed: config.trigger_types.clone(),
            });
        }
        reconciled
            .index
            .entry(trigger_type.to_string())
            .or_default();

        match trigger {
            Trigger::Apigw(apigw) => {
                let resolved = resolve_apigw(apigw, state, config);
                let service_name = resolved
                    .parameters
                    .service_name
                    .clone()
                    .unwrap_or_default();
                if !service_names.insert(service_name.clone()) {
                    return Err(ScfError::DuplicateApigwService { service_name });
                }
                reconciled.has_apigw = true;
                reconciled.events.push(Trigger::Apigw(resolved));
            }
            Trigger::Other(event) => {
                let name = event
                    .name
                    .clone()
                    .unwrap_or_else(|| config.default_trigger_name(trigger_type));
                if let Some(names) = reconciled.index.get_mut(trigger_type) {
                    names.push(name.clone());
                }
                reconciled.events.push(Trigger::Other(EventTrigger {
                    name: Some(name),
                    ..event.clone()
                }));
            }
        }
    }

    if !reconciled.has_apigw && auto_create_api {
        debug!("No API Gateway trigger declared, creating the default one");
        let synthesized = ApigwTrigger {
            name: None,
            parameters: ApigwParameters {
                extra: config.default_apigw_parameters.clone(),
                ..Default::default()
            },
        };
        reconciled
            .events
            .push(Trigger::Apigw(resolve_apigw(&synthesized, state, config)));
        reconciled.index.entry(APIGW.to_string()).or_default();
        reconciled.has_apigw = true;
    }

    Ok(reconciled)
}

fn resolve_apigw(
    apigw: &ApigwTrigger,
    state: &DeploymentState,
    config: &ComponentConfig,
) -> ApigwTrigger {
    let parameters = &apigw.parameters;
    let service_name = parameters
        .service_name
        .clone()
        .or_else(|| apigw.name.clone())
        .unwrap_or_else(|| config.default_service_name.clone());
    let service_id = parameters
        .service_id
        .clone()
        .or_else(|| state.service_id(&service_name).map(String::from));

    ApigwTrigger {
        name: Some(
            apigw
                .name
                .clone()
                .unwrap_or_else(|| config.default_trigger_name(APIGW)),
        ),
        parameters: ApigwParameters {
            service_id,
            service_name: Some(service_name),
            description: Some(
                parameters
                    .description
                    .clone()
                    .unwrap_or_else(|| config.default_service_description.clone()),
            ),
            extra: parameters.extra.clone(),
        },
    }
}
