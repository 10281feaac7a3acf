use std::sync::Arc;

use harvester_core::{ArtifactCache, Config, JobOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<JobOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.orchestrator
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        self.orchestrator.cache()
    }
}
