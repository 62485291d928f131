use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use deckhand_core::tools::{
    MetricValue, PropertyType, Tool, ToolContext, ToolError, ToolResult, ToolSchema,
};
use deckhand_core::units::{SlideSpec, SourceChunk};

const DEFAULT_MAX_PER_SLIDE: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "into", "over", "under", "your",
    "their", "about",
];

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]{3,}").unwrap())
}

/// Route research chunks to a slide by keyword overlap between the slide's
/// framing fields and each chunk's title/snippet/excerpt. Falls back to
/// the first N chunks when the slide has no usable keywords, and tops up
/// from unseen sources when scoring underfills.
pub struct ResearchRouteSourcesTool;

#[async_trait]
impl Tool for ResearchRouteSourcesTool {
    fn name(&self) -> &str {
        "research.route_sources"
    }

    fn description(&self) -> &str {
        "Select the research chunks most relevant to one slide"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::object()
            .property("slide_spec", PropertyType::Object)
            .property("research_chunks", PropertyType::Array)
            .property("max_per_slide", PropertyType::Integer)
            .require("slide_spec")
            .require("research_chunks")
    }

    async fn run(
        &self,
        input: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let spec: SlideSpec = serde_json::from_value(input["slide_spec"].clone()).unwrap_or_default();
        let chunks: Vec<SourceChunk> = input["research_chunks"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| serde_json::from_value(row.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let max_per_slide = input["max_per_slide"]
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_PER_SLIDE);

        let keywords = extract_keywords(&[
            spec.narrative_role.as_deref().unwrap_or(""),
            spec.key_message.as_deref().unwrap_or(""),
            &spec.name,
            &spec.archetype,
        ]);

        let selected = if keywords.is_empty() {
            chunks.iter().take(max_per_slide).cloned().collect::<Vec<_>>()
        } else {
            route_by_overlap(&chunks, &keywords, max_per_slide)
        };

        Ok(
            ToolResult::success(format!("Routed {} sources for slide", selected.len()))
                .with_metric("selected_count", MetricValue::Int(selected.len() as i64))
                .with_payload(serde_json::json!({
                    "chunks": serde_json::to_value(&selected).unwrap_or_default(),
                })),
        )
    }
}

pub(crate) fn extract_keywords(parts: &[&str]) -> BTreeSet<String> {
    let joined = parts.join(" ").to_lowercase();
    keyword_regex()
        .find_iter(&joined)
        .map(|m| m.as_str().to_string())
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

fn route_by_overlap(
    chunks: &[SourceChunk],
    keywords: &BTreeSet<String>,
    max_per_slide: usize,
) -> Vec<SourceChunk> {
    let mut scored: Vec<(usize, usize)> = chunks
        .iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let haystack = format!(
                "{} {} {}",
                chunk.title.to_lowercase(),
                chunk.snippet.to_lowercase(),
                chunk.excerpt.to_lowercase()
            );
            let overlap = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
            (overlap, idx)
        })
        .collect();
    // Highest overlap first, original order as the tie-break.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut selected: Vec<SourceChunk> = scored
        .iter()
        .filter(|(overlap, _)| *overlap > 0)
        .take(max_per_slide)
        .map(|(_, idx)| chunks[*idx].clone())
        .collect();

    if selected.len() < max_per_slide {
        let mut seen: BTreeSet<String> =
            selected.iter().map(|c| c.source_id.clone()).collect();
        for chunk in chunks {
            if selected.len() >= max_per_slide {
                break;
            }
            if seen.contains(&chunk.source_id) {
                continue;
            }
            seen.insert(chunk.source_id.clone());
            selected.push(chunk.clone());
        }
    }

    selected
}
