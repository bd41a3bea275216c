//! Execution trace recording.
//!
//! Sessions append one event per browser operation while tracing is active.
//! Stopping the trace writes a zip archive holding `trace.json`.

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::fs;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AdapterError, AdapterErrorKind};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub action: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceDocument<'a> {
    started_at: DateTime<Utc>,
    stopped_at: DateTime<Utc>,
    events: &'a [TraceEvent],
}

#[derive(Debug)]
struct ActiveTrace {
    started_at: DateTime<Utc>,
    clock: Instant,
    events: Vec<TraceEvent>,
}

#[derive(Debug, Default)]
pub struct TraceRecorder {
    active: Mutex<Option<ActiveTrace>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        *self.active.lock() = Some(ActiveTrace {
            started_at: Utc::now(),
            clock: Instant::now(),
            events: Vec::new(),
        });
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// No-op unless a trace is active.
    pub fn record<T>(&self, action: &str, detail: &str, outcome: &Result<T, AdapterError>) {
        let mut guard = self.active.lock();
        let Some(trace) = guard.as_mut() else {
            return;
        };
        trace.events.push(TraceEvent {
            at: Utc::now(),
            elapsed_ms: trace.clock.elapsed().as_millis() as u64,
            action: action.to_string(),
            detail: detail.to_string(),
            error: outcome.as_ref().err().map(ToString::to_string),
        });
    }

    /// Write the archive and end the trace. Stopping an inactive recorder
    /// still produces an archive with no events.
    pub async fn finish(&self, path: &Path) -> Result<usize, AdapterError> {
        let trace = self.active.lock().take();
        let (started_at, events) = match trace {
            Some(trace) => (trace.started_at, trace.events),
            None => (Utc::now(), Vec::new()),
        };
        let document = TraceDocument {
            started_at,
            stopped_at: Utc::now(),
            events: &events,
        };
        let archive = build_archive(&document)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        fs::write(path, archive).await.map_err(io_error)?;
        debug!(path = %path.display(), events = events.len(), "trace written");
        Ok(events.len())
    }
}

fn build_archive(document: &TraceDocument<'_>) -> Result<Vec<u8>, AdapterError> {
    let json = serde_json::to_vec_pretty(document).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("encoding trace: {err}"))
    })?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("trace.json", options).map_err(zip_error)?;
    writer.write_all(&json).map_err(io_error)?;
    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn io_error(err: std::io::Error) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Io).with_hint(err.to_string())
}

fn zip_error(err: zip::result::ZipError) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Io).with_hint(format!("writing trace archive: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn writes_events_into_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.zip");
        let recorder = TraceRecorder::new();

        recorder.record::<()>("goto", "ignored before start", &Ok(()));
        recorder.start();
        recorder.record::<()>("goto", "https://example.com", &Ok(()));
        recorder.record::<()>(
            "click",
            "#missing",
            &Err(AdapterError::new(AdapterErrorKind::TargetNotFound)),
        );
        let written = recorder.finish(&path).await.unwrap();
        assert_eq!(written, 2);
        assert!(!recorder.is_active());

        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name("trace.json").unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["events"].as_array().unwrap().len(), 2);
        assert_eq!(doc["events"][1]["error"], "target element not found");
    }
}
