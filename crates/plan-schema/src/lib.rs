//! Versioned test plan grammar
//!
//! A plan is a JSON document of authored steps (`goto`, `click`, `fill`,
//! `expect`, `login`, `waitFor`, `extractTextList`). This crate decodes and
//! validates plans and compiles them into the primitive steps executed by the
//! run orchestrator.

pub mod compiler;
pub mod errors;
pub mod plan;
mod redact;

pub use compiler::{
    compile_plan, dry_run_lines, CompiledStep, CompiledStepView, ExpectCondition, Payload,
    PayloadValue, StepAction, StepKind, WaitCondition,
};
pub use errors::SchemaValidationError;
pub use plan::{
    ClickStep, ExpectStep, ExtractTextListStep, FillStep, GotoStep, LoginStep, TestPlan, TestStep,
    WaitForStep, PLAN_VERSION,
};
