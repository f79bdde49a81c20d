use std::collections::BTreeMap;

use scf_common::{DeploymentState, FunctionInputs, ProviderOutput, Result, APIGW};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::code::ResolvedCode;
use crate::component::{into_persistence, ScfComponent};
use crate::inputs::{build_inputs, ResourceSpec};
use crate::triggers::{attach_known_service_ids, reconcile, Reconciled};

/// Unpublished working copy of a function.
pub const LATEST_VERSION: &str = "$LATEST";

const DEFAULT_ENVIRONMENT: &str = "release";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,
    pub last_version: String,
    pub traffic: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_traffic_version: Option<String>,
    /// Trigger type -> trigger names, or published URLs for `apigw`.
    pub triggers: BTreeMap<String, Vec<String>>,
    /// Present only when the hosted default template was deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<OutputLayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl ScfComponent {
    /// Deploys the function described by `spec` and records the result.
    ///
    /// Every validation runs before the first network call. A provider error
    /// leaves the persisted state untouched.
    #[instrument(skip(self, spec), fields(app_id = %self.app_id))]
    pub async fn deploy(&self, spec: &ResourceSpec) -> Result<DeployOutput> {
        let prior = self.state.load().await.map_err(into_persistence)?;
        let inputs = self.prepare(spec, &prior)?;
        let region = inputs.region.clone().unwrap_or_default();
        let name = inputs.name.clone().unwrap_or_default();

        let reconciled = reconcile(&inputs.events, inputs.auto_create_api, &prior, &self.config)?;

        let resolved = self
            .code
            .resolve(inputs.src.as_ref(), &name, &self.app_id, &region)
            .await?;
        let inputs = FunctionInputs {
            code: Some(resolved.code.clone()),
            events: reconciled.events.clone(),
            ..inputs
        };

        info!(function = %name, %region, "Deploying function");
        let function = self.provider.deploy(&inputs).await?;
        info!(function = %name, "Function deployed");

        let (output, state) = self.summarize(&inputs, function, &prior, reconciled, &resolved);
        if let Err(err) = self.save_state(&state).await {
            warn!(function = %name, error = %err, "Function deployed but its state was not saved");
            return Err(err);
        }
        Ok(output)
    }

    /// Builds provider inputs with defaults applied. No I/O.
    fn prepare(&self, spec: &ResourceSpec, prior: &DeploymentState) -> Result<FunctionInputs> {
        let inputs = build_inputs(spec)?;
        let config = &self.config;

        let runtime = inputs
            .runtime
            .clone()
            .unwrap_or_else(|| config.default_runtime.clone());
        let handler = inputs
            .handler
            .clone()
            .unwrap_or_else(|| config.handler_for(&runtime));

        Ok(FunctionInputs {
            name: inputs
                .name
                .clone()
                .or_else(|| prior.function_name().map(String::from))
                .or_else(|| Some(config.default_function_name.clone())),
            region: inputs
                .region
                .clone()
                .or_else(|| Some(config.default_region.clone())),
            description: inputs
                .description
                .clone()
                .or_else(|| Some(config.default_description.clone())),
            last_version: inputs.last_version.clone().or_else(|| prior.last_version.clone()),
            events: attach_known_service_ids(&inputs.events, prior),
            runtime: Some(runtime),
            handler: Some(handler),
            ..inputs
        })
    }

    fn summarize(
        &self,
        inputs: &FunctionInputs,
        function: ProviderOutput,
        prior: &DeploymentState,
        reconciled: Reconciled,
        resolved: &ResolvedCode,
    ) -> (DeployOutput, DeploymentState) {
        let region = inputs.region.clone().unwrap_or_default();

        let last_version = function
            .last_version
            .clone()
            .or_else(|| prior.last_version.clone())
            .unwrap_or_else(|| LATEST_VERSION.to_string());
        let traffic = function.traffic.or(prior.traffic).unwrap_or(1.0);
        let config_traffic_version = if traffic == 1.0 {
            None
        } else {
            function
                .config_traffic_version
                .clone()
                .or_else(|| prior.config_traffic_version.clone())
        };

        let mut triggers = reconciled.index;
        let mut apigw = prior.apigw.clone();
        if reconciled.has_apigw {
            let urls = triggers.entry(APIGW.to_string()).or_default();
            for trigger in &function.triggers {
                let Some(service_id) = &trigger.service_id else {
                    continue;
                };
                if let Some(service_name) = &trigger.service_name {
                    apigw.insert(service_name.clone(), service_id.clone());
                }
                let protocol = trigger.default_protocol();
                let environment = trigger.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
                for api in &trigger.api_list {
                    for domain in trigger.sub_domain.iter().flat_map(|d| d.iter()) {
                        urls.push(format!("{protocol}://{domain}/{environment}{}", api.path));
                    }
                }
            }
        }

        let output = DeployOutput {
            function_name: function
                .function_name
                .clone()
                .or_else(|| inputs.name.clone())
                .unwrap_or_default(),
            description: function.description.clone(),
            region: function.region.clone().unwrap_or_else(|| region.clone()),
            namespace: function.namespace.clone(),
            runtime: function.runtime.clone(),
            handler: function.handler.clone(),
            memory_size: function.memory_size,
            last_version: last_version.clone(),
            traffic,
            config_traffic_version: config_traffic_version.clone(),
            triggers,
            template_url: resolved
                .use_default
                .then(|| self.config.template_url.clone()),
            layers: function
                .layers
                .iter()
                .map(|layer| OutputLayer {
                    name: layer.layer_name.clone(),
                    version: layer.layer_version,
                })
                .collect(),
        };

        let state = DeploymentState {
            region: Some(region),
            lambda_arn: Some(output.function_name.clone()),
            function: Some(function),
            last_version: Some(last_version),
            traffic: Some(traffic),
            config_traffic_version,
            apigw,
        };
        (output, state)
    }
}
