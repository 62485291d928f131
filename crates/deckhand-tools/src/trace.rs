use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A structured event in a job's timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceEvent {
    pub job_id: String,
    pub ts: DateTime<Utc>,
    pub stage: String,
    pub event_type: String,
    pub severity: String,
    pub payload: serde_json::Value,
}

impl TraceEvent {
    pub fn new(
        job_id: impl Into<String>,
        stage: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            ts: Utc::now(),
            stage: stage.into(),
            event_type: event_type.into(),
            severity: "info".to_string(),
            payload,
        }
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }
}

/// Audit row for one tool invocation. Carries content hashes rather than
/// the payloads themselves so the record stays small.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolRunRecord {
    pub job_id: String,
    pub tool_name: String,
    pub status: String,
    pub duration_ms: u64,
    pub input_hash: String,
    pub output_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where trace data goes. Sinks are best-effort observers: the runner
/// never lets a sink influence control flow.
pub trait TraceSink: Send + Sync {
    fn record_event(&self, event: TraceEvent);
    fn record_tool_run(&self, record: ToolRunRecord);
}

/// Sink that drops everything.
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn record_event(&self, _event: TraceEvent) {}
    fn record_tool_run(&self, _record: ToolRunRecord) {}
}

/// In-memory sink, used by tests and the CLI's trace dump.
#[derive(Default)]
pub struct MemoryTraceSink {
    events: Mutex<Vec<TraceEvent>>,
    tool_runs: Mutex<Vec<ToolRunRecord>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    pub fn tool_runs(&self) -> Vec<ToolRunRecord> {
        self.tool_runs.lock().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<TraceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record_event(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }

    fn record_tool_run(&self, record: ToolRunRecord) {
        self.tool_runs.lock().push(record);
    }
}

/// Hex sha256 of a JSON value's canonical serialization.
pub fn content_hash(value: &serde_json::Value) -> String {
    let raw = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let digest = Sha256::digest(raw.as_bytes());
    format!("{digest:x}")
}
