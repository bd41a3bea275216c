//! Run orchestration for compiled test plans.
//!
//! A run launches one browser session, executes compiled steps in order and
//! stops at the first failure, capturing a screenshot and DOM snapshot of the
//! failing page. Every run, passed or failed, leaves a single `RunResult.json`
//! next to its trace under `<artifacts_root>/<run_id>/`.

mod actions;
pub mod errors;
pub mod orchestrator;
pub mod result;
pub mod run_id;
pub mod store;

pub use actions::Extracted;
pub use errors::{RunError, StepError};
pub use orchestrator::{RunOptions, RunOrchestrator, RunSettings, DEFAULT_STEP_TIMEOUT, DOM_SNAPSHOT_LIMIT};
pub use result::{RunArtifacts, RunResult, RunStatus, StepResult, StepStatus};
pub use run_id::{is_valid_run_id, new_run_id};
pub use store::{RunPaths, RunStore, RESULT_FILE, TRACE_FILE};
