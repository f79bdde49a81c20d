use scf_common::Result;
use tracing::{debug, info, instrument};

use crate::component::{into_persistence, ScfComponent};

impl ScfComponent {
    /// Removes the recorded function, if any, then clears the state.
    ///
    /// Nothing recorded is not an error: the provider is not called and the
    /// state is still cleared.
    #[instrument(skip(self), fields(app_id = %self.app_id))]
    pub async fn remove(&self) -> Result<()> {
        let state = self.state.load().await.map_err(into_persistence)?;

        match state
            .function
            .as_ref()
            .filter(|function| function.function_name.is_some())
        {
            Some(function) => {
                let region = state
                    .region
                    .clone()
                    .or_else(|| function.region.clone())
                    .unwrap_or_else(|| self.config.default_region.clone());
                info!(function = ?function.function_name, %region, "Removing function");
                self.provider.remove(&region, function).await?;
                info!("Function removed");
            }
            None => debug!("No function recorded, nothing to remove"),
        }

        self.state.clear().await.map_err(into_persistence)
    }
}
