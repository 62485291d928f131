use deckhand_core::units::{DeckManifest, SlidePayload, SlideSpec};

const SEED_TRUNCATE_CHARS: usize = 280;

/// Deterministic stand-in content for a slide whose generation failed.
/// The first slot carries the job's thesis or brief so the deck still
/// opens with something real; the rest are visibly-placeholder text that
/// a correction pass can regenerate.
pub fn fallback_payload(spec: &SlideSpec, seed_text: &str) -> SlidePayload {
    let name = if spec.name.is_empty() {
        format!("Slide {}", spec.index + 1)
    } else {
        spec.name.clone()
    };

    let mut payload = SlidePayload::new(spec.index);
    for (position, slot) in spec.slots.iter().enumerate() {
        let text = if position == 0 {
            let seed = truncate_chars(seed_text.trim(), SEED_TRUNCATE_CHARS);
            if seed.is_empty() {
                format!("Content pending for {name}")
            } else {
                seed
            }
        } else {
            format!("{name}: {slot} content pending regeneration")
        };
        payload.slots.insert(slot.clone(), text);
    }
    payload
}

/// One fallback payload per slide of the manifest.
pub fn fallback_slides(manifest: &DeckManifest, seed_text: &str) -> Vec<SlidePayload> {
    manifest
        .slides
        .iter()
        .map(|spec| fallback_payload(spec, seed_text))
        .collect()
}

/// Line up model output with the manifest: one payload per slide, in
/// manifest order, with fallbacks substituted for slides the model skipped.
/// Returns the aligned payloads plus the indexes that were backfilled.
pub fn align_with_manifest(
    given: Vec<SlidePayload>,
    manifest: &DeckManifest,
    seed_text: &str,
) -> (Vec<SlidePayload>, Vec<usize>) {
    let mut by_index: std::collections::BTreeMap<usize, SlidePayload> = given
        .into_iter()
        .map(|p| (p.slide_index, p))
        .collect();
    let mut aligned = Vec::with_capacity(manifest.slides.len());
    let mut backfilled = Vec::new();
    for spec in &manifest.slides {
        match by_index.remove(&spec.index) {
            Some(payload) => aligned.push(payload),
            None => {
                backfilled.push(spec.index);
                aligned.push(fallback_payload(spec, seed_text));
            }
        }
    }
    (aligned, backfilled)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}
