use deckhand_core::provider::GenerationRequest;

pub const SLIDE_SYSTEM_PROMPT: &str = "You write concise, factual slide content. \
Respond with JSON only: an array with one object per slide, each carrying \
\"slide_index\" and a \"slots\" object mapping every listed slot name to its text. \
Keep text within the spirit of each slot: titles short, bodies a few sentences, \
citations starting with \"Source:\". Do not invent slots.";

pub const THESIS_SYSTEM_PROMPT: &str = "You distill presentation briefs. \
Reply with one declarative sentence stating the deck's central thesis. \
No preamble, no quotes, no markdown.";

/// Render the prompt used to derive a thesis when the caller supplies none.
pub fn build_thesis_prompt(brief: &str) -> String {
    format!("Brief:\n{brief}\n\nState the central thesis of this presentation in one sentence.")
}

/// Render the user-facing prompt for a slide generation call.
pub fn build_slide_prompt(req: &GenerationRequest) -> String {
    let mut out = String::new();
    out.push_str("Brief:\n");
    out.push_str(&req.prompt);
    out.push('\n');

    if let Some(thesis) = &req.thesis {
        out.push_str("\nThesis:\n");
        out.push_str(thesis);
        out.push('\n');
    }

    out.push_str("\nSlides to fill:\n");
    for spec in &req.manifest.slides {
        out.push_str(&format!(
            "- slide_index {}: \"{}\" (archetype: {}) slots: [{}]",
            spec.index,
            spec.name,
            if spec.archetype.is_empty() { "general" } else { &spec.archetype },
            spec.slots.join(", ")
        ));
        if let Some(msg) = &spec.key_message {
            out.push_str(&format!(" key message: {msg}"));
        }
        out.push('\n');
    }

    if !req.context_chunks.is_empty() {
        out.push_str("\nResearch material:\n");
        for chunk in &req.context_chunks {
            out.push_str(&format!("[{}] {}\n", chunk.source_id, chunk.title));
            let body = if chunk.excerpt.is_empty() { &chunk.snippet } else { &chunk.excerpt };
            if !body.is_empty() {
                out.push_str(body);
                out.push('\n');
            }
        }
    }

    if let Some(extra) = &req.extra_instructions {
        out.push_str("\nAdditional instructions:\n");
        out.push_str(extra);
        out.push('\n');
    }

    out
}
