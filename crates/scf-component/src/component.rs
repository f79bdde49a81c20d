use std::sync::Arc;

use scf_common::{
    DeploymentState, FunctionProvider, ObjectStorage, Packager, Result, ScfError, StateStore,
    TemplateDownloader,
};

use crate::code::CodeResolver;
use crate::config::ComponentConfig;

/// External services the component delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn FunctionProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub packager: Arc<dyn Packager>,
    pub downloader: Arc<dyn TemplateDownloader>,
    pub state: Arc<dyn StateStore>,
}

/// Deploys and removes one SCF function resource.
///
/// Each instance is bound to a single account (`app_id`) and a single state
/// store; calls on one instance are expected to run one at a time.
#[derive(Clone)]
pub struct ScfComponent {
    pub(crate) config: Arc<ComponentConfig>,
    pub(crate) app_id: String,
    pub(crate) provider: Arc<dyn FunctionProvider>,
    pub(crate) state: Arc<dyn StateStore>,
    pub(crate) code: CodeResolver,
}

impl ScfComponent {
    pub fn new(
        app_id: impl Into<String>,
        config: ComponentConfig,
        collaborators: Collaborators,
    ) -> Self {
        let config = Arc::new(config);
        let Collaborators {
            provider,
            storage,
            packager,
            downloader,
            state,
        } = collaborators;
        Self {
            code: CodeResolver::new(config.clone(), storage, packager, downloader),
            config,
            app_id: app_id.into(),
            provider,
            state,
        }
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub(crate) async fn save_state(&self, state: &DeploymentState) -> Result<()> {
        self.state.save(state).await.map_err(into_persistence)
    }
}

pub(crate) fn into_persistence(err: ScfError) -> ScfError {
    match err {
        ScfError::StatePersistence(_) => err,
        other => ScfError::StatePersistence(other.to_string()),
    }
}
