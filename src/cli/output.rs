use run_orchestrator::{RunResult, StepStatus};

pub fn summary_lines(result: &RunResult) -> Vec<String> {
    let mut lines = vec![format!(
        "runId={} status={} durationMs={}",
        result.run_id,
        result.status.as_str(),
        result.duration_ms
    )];
    for step in &result.steps {
        lines.push(format!(
            "{:<6} step={} {} ({}ms)",
            step_label(step.status),
            step.index + 1,
            step.description,
            step.duration_ms
        ));
        if let Some(error) = &step.error {
            lines.push(format!("  error={error}"));
        }
    }
    if !result.outputs.is_empty() {
        let outputs = serde_json::to_string(&result.outputs).unwrap_or_default();
        lines.push(format!("outputs={outputs}"));
    }
    lines.push(format!("artifacts={}", result.artifacts.run_dir.display()));
    lines
}

/// Summary plus trace and failure artifact locations.
pub fn replay_lines(result: &RunResult) -> Vec<String> {
    let mut lines = summary_lines(result);
    lines.push(format!("trace={}", result.artifacts.trace_path.display()));
    if let Some(path) = &result.artifacts.failure_screenshot_path {
        lines.push(format!("failureScreenshot={}", path.display()));
    }
    if let Some(path) = &result.artifacts.failure_dom_path {
        lines.push(format!("failureDom={}", path.display()));
    }
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn step_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "PASSED",
        StepStatus::Failed => "FAILED",
        StepStatus::Skipped => "SKIPPED",
    }
}
