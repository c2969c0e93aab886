//! Caller-owned tracking session.
//!
//! At most one run is active per session. `ensure_run` starts one lazily;
//! only `end_run` finishes it.

use crate::backend::RegistryClient;
use crate::error::Result;
use crate::model::registry::RunInfo;

/// Holds the active run, if any, for one caller.
#[derive(Debug, Default)]
pub struct TrackingSession {
    active: Option<RunInfo>,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume an existing run.
    pub fn with_run(run: RunInfo) -> Self {
        Self { active: Some(run) }
    }

    pub fn active_run(&self) -> Option<&RunInfo> {
        self.active.as_ref()
    }

    /// Return the active run, starting one in `experiment_name` if there is none.
    pub async fn ensure_run(
        &mut self,
        registry: &dyn RegistryClient,
        experiment_name: &str,
    ) -> Result<&RunInfo> {
        let run = match self.active.take() {
            Some(run) => run,
            None => {
                let experiment = registry.get_or_create_experiment(experiment_name).await?;
                let run = registry.create_run(&experiment.experiment_id).await?;
                log::info!(
                    "Started run {} in experiment '{}'",
                    run.run_id,
                    experiment_name
                );
                run
            }
        };

        Ok(&*self.active.insert(run))
    }

    /// Finish the active run. Returns the finished run, or `None` if idle.
    pub async fn end_run(&mut self, registry: &dyn RegistryClient) -> Result<Option<RunInfo>> {
        let Some(run) = self.active.take() else {
            return Ok(None);
        };

        if let Err(e) = registry.finish_run(&run.run_id).await {
            self.active = Some(run);
            return Err(e.into());
        }

        log::info!("Finished run {}", run.run_id);
        Ok(Some(run))
    }
}
