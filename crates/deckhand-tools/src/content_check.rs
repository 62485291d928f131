use async_trait::async_trait;

use deckhand_core::issues::{Issue, IssueKind, Severity};
use deckhand_core::tools::{
    MetricValue, PropertyType, Tool, ToolContext, ToolError, ToolResult, ToolSchema,
};
use deckhand_core::units::{DeckManifest, SlidePayload};

use crate::archetypes::{classify_slot, SlotCategory};

/// Deterministic content QA: every expected slot filled, no unresolved
/// template tokens, citations in "Source:" form. Missing content is the
/// only critical finding.
pub struct QaContentCheckTool;

#[async_trait]
impl Tool for QaContentCheckTool {
    fn name(&self) -> &str {
        "qa.content_check"
    }

    fn description(&self) -> &str {
        "Check generated slides for missing slots, unresolved tokens, and citation format"
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
            let expected = manifest.expected_slots(payload.slide_index);

            let mut missing: Vec<String> = expected
                .iter()
                .filter(|slot| {
                    payload
                        .slot(slot)
                        .map(|text| text.trim().is_empty())
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            missing.sort();

            let unresolved: Vec<String> = payload
                .slots
                .iter()
                .filter(|(_, text)| text.contains("{{") && text.contains("}}"))
                .map(|(slot, _)| slot.clone())
                .collect();

            let bad_citations: Vec<String> = payload
                .slots
                .iter()
                .filter(|(slot, text)| {
                    classify_slot(slot) == SlotCategory::Citation
                        && !text.trim().is_empty()
                        && !text.trim_start().to_ascii_lowercase().starts_with("source:")
                })
                .map(|(slot, _)| slot.clone())
                .collect();

            if missing.is_empty() && unresolved.is_empty() && bad_citations.is_empty() {
                continue;
            }
            let severity = if missing.is_empty() {
                Severity::Warning
            } else {
                Severity::Critical
            };
            issues.push(Issue {
                missing_slots: missing,
                unresolved_tokens: unresolved,
                citation_format: bad_citations,
                ..Issue::new(payload.slide_index, severity, IssueKind::MissingContent)
            });
        }

        let critical_count = issues.iter().filter(|i| i.is_critical()).count();
        let mut result = ToolResult::success(format!("Content check found {} issues", issues.len()))
            .with_payload(serde_json::json!({
                "issues": serde_json::to_value(&issues).unwrap_or_default(),
            }))
            .with_metric("issue_count", MetricValue::Int(issues.len() as i64))
            .with_metric("critical_count", MetricValue::Int(critical_count as i64));
        if critical_count > 0 {
            result = result.with_warning(format!("{critical_count} critical issues"));
        }
        Ok(result)
    }
}

/// Decode payload rows leniently: rows that do not deserialize are skipped
/// rather than failing the check.
pub(crate) fn decode_payloads(value: &serde_json::Value) -> Vec<SlidePayload> {
    value
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value(row.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
