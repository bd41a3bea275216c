use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use plan_schema::TestPlan;
use run_orchestrator::{RunError, RunOptions};
use secret_resolver::EnvFileSecrets;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tracing::{info, warn};

use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRunRequest {
    plan: Value,
    #[serde(default)]
    env_ref: Option<String>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub(super) async fn create_run_handler(
    State(state): State<ServerState>,
    body: Bytes,
) -> Response {
    let request: CreateRunRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {err}")),
    };
    if matches!(request.env_ref.as_deref(), Some(env_ref) if env_ref.is_empty()) {
        return error_response(StatusCode::BAD_REQUEST, "envRef must not be empty");
    }
    let plan = match TestPlan::from_value(request.plan) {
        Ok(plan) => plan,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let mut orchestrator = state.orchestrator.clone();
    if let Some(env_ref) = request.env_ref.as_deref() {
        match EnvFileSecrets::load(FsPath::new(env_ref)) {
            Ok(secrets) => orchestrator = orchestrator.with_secrets(Arc::new(secrets)),
            Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }

    match orchestrator.run(&plan, RunOptions::default()).await {
        Ok(result) => {
            info!(run_id = %result.run_id, status = result.status.as_str(), "run created");
            (
                StatusCode::CREATED,
                Json(json!({
                    "runId": result.run_id,
                    "status": result.status,
                    "resultPath": result.artifacts.result_path,
                    "metadata": request.metadata.unwrap_or_default(),
                })),
            )
                .into_response()
        }
        Err(RunError::Schema(err)) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        Err(err) => {
            warn!(error = %err, "run failed to complete");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub(super) async fn get_run_handler(
    State(state): State<ServerState>,
    Path(run_id): Path<String>,
) -> Response {
    match state.store().load_result(&run_id).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            if !matches!(err, RunError::NotFound(_) | RunError::InvalidRunId(_)) {
                warn!(run_id = %run_id, error = %err, "stored run unreadable");
            }
            error_response(StatusCode::NOT_FOUND, "Run not found")
        }
    }
}

pub(super) async fn artifact_handler(
    State(state): State<ServerState>,
    Path((run_id, name)): Path<(String, String)>,
) -> Response {
    let path = match state.store().artifact_path(&run_id, &name) {
        Ok(path) => path,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid artifact path"),
    };

    match fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type_for(&name).to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Artifact not found"),
    }
}

fn content_type_for(name: &str) -> &'static str {
    match FsPath::new(name).extension().and_then(|ext| ext.to_str()) {
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("html") => "text/html; charset=utf-8",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("RunResult.json"), "application/json");
        assert_eq!(content_type_for("failure-step-2.dom.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("trace.zip"), "application/zip");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }
}
