use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, warn};

use deckhand_core::tools::{ToolContext, ToolResult};

use crate::registry::ToolRegistry;
use crate::schema::validate_input;
use crate::trace::{content_hash, NoopTraceSink, ToolRunRecord, TraceEvent, TraceSink};

const EVENT_WARNING_LIMIT: usize = 5;

/// Single entry point for tool execution. Every outcome — unknown tool,
/// invalid input, tool error, panic, timeout — is normalized into a
/// `ToolResult`; `run` never returns an error. Each invocation leaves a
/// start/done event pair and a run record in the trace sink.
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    trace: Arc<dyn TraceSink>,
}

impl ToolRunner {
    pub fn new(registry: Arc<ToolRegistry>, trace: Arc<dyn TraceSink>) -> Self {
        Self { registry, trace }
    }

    pub fn without_trace(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, Arc::new(NoopTraceSink))
    }

    pub async fn run(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> ToolResult {
        let Some(tool) = self.registry.get(tool_name) else {
            return ToolResult::failure("Tool not found", format!("Unknown tool: {tool_name}"));
        };

        let started = Instant::now();
        let input_hash = content_hash(&input);
        let job_id = ctx.job_id.clone().unwrap_or_else(|| "n/a".to_string());

        if let Err(message) = validate_input(&input, &tool.input_schema()) {
            self.finish_record(&job_id, tool_name, "failed", started, &input_hash, None, Some(&message));
            return ToolResult::failure("Tool input validation failed", message);
        }

        if let Some(job_id) = &ctx.job_id {
            self.trace.record_event(TraceEvent::new(
                job_id,
                "tool",
                "tool_start",
                serde_json::json!({"tool": tool_name}),
            ));
        }
        debug!(tool = tool_name, "tool invocation started");

        let outcome = tokio::time::timeout(
            ctx.timeout,
            std::panic::AssertUnwindSafe(tool.run(input, ctx)).catch_unwind(),
        )
        .await;

        let result = match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => ToolResult::failure("Tool execution failed", e.to_string()),
            Ok(Err(panic)) => {
                warn!(tool = tool_name, "tool panicked");
                ToolResult::failure(
                    "Tool execution failed",
                    format!("tool panicked: {}", panic_message(&panic)),
                )
            }
            Err(_) => ToolResult::failure(
                "Tool timed out",
                format!("Tool timed out after {}s", ctx.timeout.as_secs()),
            ),
        };

        let status = if result.ok { "ok" } else { "failed" };
        self.finish_record(
            &job_id,
            tool_name,
            status,
            started,
            &input_hash,
            Some(&result.payload),
            result.error.as_deref(),
        );

        if let Some(job_id) = &ctx.job_id {
            let severity = if result.warnings.is_empty() { "info" } else { "warning" };
            let shown_warnings: Vec<&String> =
                result.warnings.iter().take(EVENT_WARNING_LIMIT).collect();
            self.trace.record_event(
                TraceEvent::new(
                    job_id,
                    "tool",
                    "tool_done",
                    serde_json::json!({
                        "tool": tool_name,
                        "ok": result.ok,
                        "summary": result.summary,
                        "metrics": result.metrics,
                        "warnings": shown_warnings,
                    }),
                )
                .with_severity(severity),
            );
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_record(
        &self,
        job_id: &str,
        tool_name: &str,
        status: &str,
        started: Instant,
        input_hash: &str,
        output: Option<&serde_json::Value>,
        error: Option<&str>,
    ) {
        self.trace.record_tool_run(ToolRunRecord {
            job_id: job_id.to_string(),
            tool_name: tool_name.to_string(),
            status: status.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            input_hash: input_hash.to_string(),
            output_hash: content_hash(output.unwrap_or(&serde_json::Value::Null)),
            error: error.map(str::to_string),
        });
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deckhand_core::tools::{PropertyType, Tool, ToolError, ToolSchema};
    use serde_json::json;
    use std::time::Duration;

    use crate::registry::builtin_registry;
    use crate::trace::MemoryTraceSink;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo input back"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
                .property("text", PropertyType::String)
                .require("text")
        }
        async fn run(
            &self,
            input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::success("echoed")
                .with_payload(json!({"text": input["text"]}))
                .with_warning("echo warning 1")
                .with_warning("echo warning 2")
                .with_warning("echo warning 3")
                .with_warning("echo warning 4")
                .with_warning("echo warning 5")
                .with_warning("echo warning 6"))
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &str {
            "panic"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
        }
        async fn run(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            panic!("boom");
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps past any budget"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
        }
        async fn run(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolResult::success("never"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "returns a tool error"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::object()
        }
        async fn run(
            &self,
            _input: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed("backend unavailable".into()))
        }
    }

    fn runner_with(tools: Vec<Arc<dyn Tool>>) -> (ToolRunner, Arc<MemoryTraceSink>) {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let sink = Arc::new(MemoryTraceSink::new());
        (ToolRunner::new(Arc::new(registry), sink.clone()), sink)
    }

    fn job_ctx() -> ToolContext {
        ToolContext {
            job_id: Some("job-1".into()),
            ..ToolContext::default()
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_result() {
        let (runner, sink) = runner_with(vec![]);
        let result = runner.run("nope", json!({}), &job_ctx()).await;
        assert!(!result.ok);
        assert_eq!(result.summary, "Tool not found");
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nope"));
        // No side effects for an unknown tool.
        assert!(sink.events().is_empty());
        assert!(sink.tool_runs().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_fails_before_execution() {
        let (runner, sink) = runner_with(vec![Arc::new(EchoTool)]);
        let result = runner.run("echo", json!({"text": 7}), &job_ctx()).await;
        assert!(!result.ok);
        assert_eq!(result.summary, "Tool input validation failed");
        assert!(result.error.unwrap().contains("expected type 'string'"));
        // Run record written, but no tool_start event.
        assert_eq!(sink.tool_runs().len(), 1);
        assert_eq!(sink.tool_runs()[0].status, "failed");
        assert!(sink.events_of_type("tool_start").is_empty());
    }

    #[tokio::test]
    async fn success_leaves_event_pair_and_record() {
        let (runner, sink) = runner_with(vec![Arc::new(EchoTool)]);
        let result = runner.run("echo", json!({"text": "hi"}), &job_ctx()).await;
        assert!(result.ok);
        assert_eq!(result.payload["text"], "hi");

        assert_eq!(sink.events_of_type("tool_start").len(), 1);
        let done = sink.events_of_type("tool_done");
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].severity, "warning");
        // Warnings shown in the event are capped at 5; the result keeps all 6.
        assert_eq!(done[0].payload["warnings"].as_array().unwrap().len(), 5);
        assert_eq!(result.warnings.len(), 6);

        let runs = sink.tool_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "ok");
        assert_eq!(runs[0].input_hash.len(), 64);
        assert_ne!(runs[0].input_hash, runs[0].output_hash);
    }

    #[tokio::test]
    async fn no_events_without_job_id() {
        let (runner, sink) = runner_with(vec![Arc::new(EchoTool)]);
        let result = runner
            .run("echo", json!({"text": "hi"}), &ToolContext::default())
            .await;
        assert!(result.ok);
        assert!(sink.events().is_empty());
        // Run record is still written.
        assert_eq!(sink.tool_runs().len(), 1);
    }

    #[tokio::test]
    async fn tool_error_becomes_failure_result() {
        let (runner, sink) = runner_with(vec![Arc::new(FailingTool)]);
        let result = runner.run("failing", json!({}), &job_ctx()).await;
        assert!(!result.ok);
        assert_eq!(result.summary, "Tool execution failed");
        assert!(result.error.unwrap().contains("backend unavailable"));
        assert_eq!(sink.tool_runs()[0].status, "failed");
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let (runner, sink) = runner_with(vec![Arc::new(PanicTool)]);
        let result = runner.run("panic", json!({}), &job_ctx()).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("boom"));
        // The done event still fires so the trace stays balanced.
        assert_eq!(sink.events_of_type("tool_done").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_enforced() {
        let (runner, _sink) = runner_with(vec![Arc::new(SlowTool)]);
        let ctx = ToolContext {
            job_id: Some("job-1".into()),
            timeout: Duration::from_secs(2),
            ..ToolContext::default()
        };
        let result = runner.run("slow", json!({}), &ctx).await;
        assert!(!result.ok);
        assert_eq!(result.summary, "Tool timed out");
        assert_eq!(result.error.as_deref(), Some("Tool timed out after 2s"));
    }

    #[tokio::test]
    async fn builtin_tools_run_end_to_end() {
        let runner = ToolRunner::without_trace(Arc::new(builtin_registry()));
        let result = runner
            .run(
                "qa.content_check",
                json!({
                    "slides_payload": [{"slide_index": 0, "slots": {"TITLE": "x"}}],
                    "template_manifest": {"slides": [{"index": 0, "slots": ["TITLE", "BODY"]}]},
                }),
                &ToolContext::default(),
            )
            .await;
        assert!(result.ok);
        assert_eq!(result.issues().len(), 1);
    }
}
