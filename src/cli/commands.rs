use clap::Subcommand;

use super::compile::CompileArgs;
use super::plan::PlanArgs;
use super::replay::ReplayArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Generate a test plan from a natural-language prompt
    Plan(PlanArgs),

    /// Run a test plan, optionally repairing it after failures
    Run(RunArgs),

    /// Print the summary of a stored run
    Replay(ReplayArgs),

    /// Print the compiled steps of a plan without running it
    Compile(CompileArgs),

    /// Start the HTTP wrapper
    Serve(ServeArgs),
}
