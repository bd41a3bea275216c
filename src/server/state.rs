use run_orchestrator::{RunOrchestrator, RunStore};

#[derive(Clone)]
pub struct ServerState {
    pub(crate) orchestrator: RunOrchestrator,
}

impl ServerState {
    pub fn new(orchestrator: RunOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub(crate) fn store(&self) -> &RunStore {
        self.orchestrator.store()
    }
}
