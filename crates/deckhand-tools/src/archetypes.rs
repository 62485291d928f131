use deckhand_core::units::SlotBinding;

/// Canonical slot categories. Raw slot names from templates are free-form
/// ("BODY_LEFT", "SOURCE_NOTE"); checks and budgets work on the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotCategory {
    Title,
    Subtitle,
    Body,
    Bullet,
    Citation,
    Table,
    Footer,
    Other,
}

impl SlotCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "TITLE",
            Self::Subtitle => "SUBTITLE",
            Self::Body => "BODY",
            Self::Bullet => "BULLET",
            Self::Citation => "CITATION",
            Self::Table => "TABLE",
            Self::Footer => "FOOTER",
            Self::Other => "OTHER",
        }
    }
}

/// Map a raw slot name to its category. Subtitle is checked before title
/// so "SUBTITLE" does not land in the title bucket.
pub fn classify_slot(slot_name: &str) -> SlotCategory {
    let slot = slot_name.to_ascii_uppercase();
    if slot.contains("SUBTITLE") {
        SlotCategory::Subtitle
    } else if slot.contains("TITLE") {
        SlotCategory::Title
    } else if slot.contains("BULLET") || slot.contains("LIST") {
        SlotCategory::Bullet
    } else if slot.contains("CITATION") || slot.contains("SOURCE") || slot.contains("REFERENCE") {
        SlotCategory::Citation
    } else if slot.contains("TABLE") {
        SlotCategory::Table
    } else if slot.contains("FOOTER") {
        SlotCategory::Footer
    } else if slot.contains("BODY") || slot.contains("CONTENT") || slot.contains("TEXT") {
        SlotCategory::Body
    } else {
        SlotCategory::Other
    }
}

// Budgets are intentionally conservative for dense corporate templates.
fn default_budget(category: SlotCategory) -> usize {
    match category {
        SlotCategory::Title => 90,
        SlotCategory::Subtitle => 120,
        SlotCategory::Body => 420,
        SlotCategory::Bullet => 360,
        SlotCategory::Citation => 180,
        SlotCategory::Table => 280,
        SlotCategory::Footer => 90,
        SlotCategory::Other => 220,
    }
}

fn archetype_override(archetype: &str, category: SlotCategory) -> Option<usize> {
    use SlotCategory::*;
    let budget = match (archetype, category) {
        ("executive_summary", Title) => 80,
        ("executive_summary", Body) => 360,
        ("executive_summary", Citation) => 170,
        ("agenda", Title) => 80,
        ("agenda", Bullet) => 320,
        ("section_break", Title) => 70,
        ("section_break", Subtitle) => 100,
        ("comparison", Title) => 80,
        ("comparison", Body) => 340,
        ("comparison", Bullet) => 320,
        ("timeline", Title) => 80,
        ("timeline", Body) => 280,
        ("timeline", Bullet) => 330,
        ("kpi", Title) => 80,
        ("kpi", Body) => 240,
        ("kpi", Citation) => 170,
        ("table_data", Title) => 80,
        ("table_data", Table) => 260,
        ("table_data", Body) => 260,
        ("quote", Title) => 80,
        ("quote", Body) => 220,
        ("quote", Citation) => 170,
        ("closing", Title) => 80,
        ("closing", Body) => 320,
        ("closing", Bullet) => 280,
        _ => return None,
    };
    Some(budget)
}

/// Writing guidance per archetype, folded into generation prompts.
pub fn archetype_guidance(archetype: &str) -> &'static str {
    match archetype {
        "executive_summary" => {
            "Lead with decision-level framing, concise evidence, and explicit business implication."
        }
        "agenda" => "Use structured, scan-friendly sections with parallel phrasing.",
        "section_break" => {
            "Keep language short and directional. This slide transitions the narrative."
        }
        "comparison" => "Contrast alternatives with clear tradeoffs and recommendation bias.",
        "timeline" => "Organize milestones chronologically with concrete outcomes.",
        "kpi" => "Quantify impact. Use metric-first language and explicit baseline delta.",
        "table_data" => "Summarize what the table shows; avoid repeating every cell value in prose.",
        "quote" => "Use one short quote and attach attribution/citation.",
        "closing" => "End with decision ask, ownership, and next step clarity.",
        _ => "Use concise executive language with one key message per slide.",
    }
}

/// Character budget derived from a slot's actual box geometry. Returns 0
/// when the geometry is unusable so callers can fall back to the static
/// table.
pub fn dimension_aware_budget(width_inches: f64, height_inches: f64, font_size_pt: f64) -> usize {
    if width_inches <= 0.0 || height_inches <= 0.0 {
        return 0;
    }
    let safe_font = font_size_pt.clamp(8.0, 36.0);
    let chars_per_inch = (72.0 / safe_font) * 1.8;
    let lines = height_inches * (72.0 / (safe_font * 1.2));
    let budget = (chars_per_inch * width_inches * lines * 0.7) as usize;
    budget.max(40)
}

/// Effective character budget for a slot: geometry wins when present and
/// usable, otherwise the archetype override, otherwise the default table.
pub fn slot_budget(archetype: &str, slot_name: &str, binding: Option<&SlotBinding>) -> usize {
    let category = classify_slot(slot_name);
    let base = archetype_override(archetype, category).unwrap_or_else(|| default_budget(category));

    if let Some(binding) = binding {
        let width = binding.width_inches.unwrap_or(0.0);
        let height = binding.height_inches.unwrap_or(0.0);
        let font = binding.font_size_pt.unwrap_or(12.0);
        let dynamic = dimension_aware_budget(width, height, font);
        if dynamic > 0 {
            return dynamic;
        }
    }

    base
}

/// Guess an archetype from a template's slot names when the manifest does
/// not declare one.
pub fn infer_archetype(slots: &[String]) -> &'static str {
    let up: Vec<String> = slots.iter().map(|s| s.to_ascii_uppercase()).collect();
    let joined = up.join(" ");

    if ["AGENDA", "OUTLINE"].iter().any(|k| joined.contains(k)) {
        return "agenda";
    }
    if ["TIMELINE", "MILESTONE", "PHASE"].iter().any(|k| joined.contains(k)) {
        return "timeline";
    }
    if ["KPI", "METRIC", "STAT", "IMPACT"].iter().any(|k| joined.contains(k)) {
        return "kpi";
    }
    if up.iter().any(|s| s.contains("TABLE")) {
        return "table_data";
    }
    if up.iter().any(|s| s.contains("QUOTE")) {
        return "quote";
    }
    if ["LEFT", "RIGHT", "PRO", "CON", "VERSUS", "VS"].iter().any(|k| joined.contains(k)) {
        return "comparison";
    }
    if ["NEXT_STEP", "DECISION", "ASK"].iter().any(|k| joined.contains(k)) {
        return "closing";
    }

    let has_title = up.iter().any(|s| s.contains("TITLE"));
    let has_subtitle = up.iter().any(|s| s.contains("SUBTITLE"));
    let has_body = up.iter().any(|s| classify_slot(s) == SlotCategory::Body);
    let has_bullet = up.iter().any(|s| classify_slot(s) == SlotCategory::Bullet);
    let has_citation = up.iter().any(|s| classify_slot(s) == SlotCategory::Citation);

    if has_title && has_subtitle && !has_body && slots.len() <= 3 {
        return "section_break";
    }
    if has_citation && (has_body || has_bullet) {
        return "executive_summary";
    }
    if has_bullet && has_body {
        return "comparison";
    }

    "general"
}
