use async_trait::async_trait;

use deckhand_core::issues::{Issue, IssueKind, Severity};
use deckhand_core::tools::{
    MetricValue, PropertyType, Tool, ToolContext, ToolError, ToolResult, ToolSchema,
};
use deckhand_core::units::DeckManifest;

use crate::archetypes::slot_budget;
use crate::content_check::decode_payloads;

const WARNING_RATIO: f64 = 1.05;
const CRITICAL_RATIO: f64 = 1.25;

/// Layout-risk QA: flag slots whose text length exceeds the slot's
/// character budget. Purely geometric; no rendering involved.
pub struct QaVisualCheckTool;

#[async_trait]
impl Tool for QaVisualCheckTool {
    fn name(&self) -> &str {
        "qa.visual_check"
    }

    fn description(&self) -> &str {
        "Flag slots whose text likely overflows its layout box"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object()
            .property("slides_payload", PropertyType::Array)
            .property("template_manifest", PropertyType::Object)
            .require("slides_payload")
            .require("template_manifest")
    }

    async fn run(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let payloads = decode_payloads(&input["slides_payload"]);
        let manifest: DeckManifest =
            serde_json::from_value(input["template_manifest"].clone()).unwrap_or_default();

        let mut issues: Vec<Issue> = Vec::new();
        for payload in &payloads {
            let spec = manifest.slide(payload.slide_index);
            let archetype = spec
                .map(|s| s.archetype.as_str())
                .filter(|a| !a.is_empty())
                .unwrap_or("general");

            for (slot, text) in &payload.slots {
                let binding = spec.and_then(|s| s.binding(slot));
                let budget = slot_budget(archetype, slot, binding);
                if budget == 0 {
                    continue;
                }
                let char_count = text.chars().count();
                let ratio = char_count as f64 / budget.max(1) as f64;
                if ratio <= WARNING_RATIO {
                    continue;
                }
                let severity = if ratio > CRITICAL_RATIO {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                issues.push(Issue {
                    slot: Some(slot.clone()),
                    char_count: Some(char_count),
                    budget: Some(budget),
                    ratio: Some((ratio * 100.0).round() / 100.0),
                    ..Issue::new(payload.slide_index, severity, IssueKind::OverflowRisk)
                });
            }
        }

        let critical_count = issues.iter().filter(|i| i.is_critical()).count();
        let warning_count = issues.len() - critical_count;
        Ok(ToolResult::success(format!(
            "Visual QA found {} potential layout issues",
            issues.len()
        ))
        .with_payload(serde_json::json!({
            "issues": serde_json::to_value(&issues).unwrap_or_default(),
        }))
        .with_metric("issue_count", MetricValue::Int(issues.len() as i64))
        .with_metric("critical_count", MetricValue::Int(critical_count as i64))
        .with_metric("warning_count", MetricValue::Int(warning_count as i64)))
    }
}
