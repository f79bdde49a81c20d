//! Deploys a declaratively described SCF function and keeps the deployment
//! in sync with persisted state across runs.

pub mod code;
pub mod component;
pub mod config;
pub mod deploy;
pub mod inputs;
pub mod normalize;
mod remove;
pub mod triggers;

pub use code::{CodeResolver, ResolvedCode};
pub use component::{Collaborators, ScfComponent};
pub use config::ComponentConfig;
pub use deploy::{DeployOutput, OutputLayer, LATEST_VERSION};
pub use inputs::{apigw_parameters, build_inputs, ResourceSpec};
pub use normalize::{lower_first, normalize_keys, transform_endpoint};

// Re-export the shared types callers need alongside the component
pub use scf_common::{DeploymentState, Result, ScfError};
