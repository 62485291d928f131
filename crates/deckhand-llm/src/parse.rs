use deckhand_core::units::{SlidePayload, SlideSpec};

/// Pull a JSON document out of model text. Models wrap JSON in code fences
/// or surround it with prose often enough that this has to be lenient.
/// Returns None rather than erroring; callers degrade to fallbacks.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = strip_code_fence(text.trim());
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    // Scan for the first balanced object or array embedded in prose.
    for (start, open) in trimmed.char_indices().filter(|(_, c)| *c == '{' || *c == '[') {
        if let Some(end) = balanced_end(&trimmed[start..], open) {
            if let Ok(value) = serde_json::from_str(&trimmed[start..start + end]) {
                return Some(value);
            }
        }
    }
    None
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line, then everything after the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.rsplit_once("```").map(|(b, _)| b).unwrap_or(body).trim()
}

/// Byte offset one past the close of the bracket opened at position 0,
/// skipping brackets inside string literals.
fn balanced_end(text: &str, open: char) -> Option<usize> {
    let close = if open == '{' { '}' } else { ']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode slide payloads from a model-produced JSON value. Accepts either
/// a bare array or `{"slides": [...]}`; array elements may carry an
/// explicit `slide_index`/`slots` pair or be a plain slot map matched to
/// the specs positionally. Returns None when nothing usable is present.
pub fn payloads_from_value(
    value: &serde_json::Value,
    specs: &[SlideSpec],
) -> Option<Vec<SlidePayload>> {
    let rows = match value {
        serde_json::Value::Array(rows) => rows.as_slice(),
        serde_json::Value::Object(map) => map.get("slides")?.as_array()?.as_slice(),
        _ => return None,
    };

    let mut payloads = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let obj = row.as_object()?;
        let declared_index = obj.get("slide_index").and_then(|v| v.as_u64());
        let slots_obj = match obj.get("slots").and_then(|v| v.as_object()) {
            Some(slots) => slots,
            None => obj,
        };
        let index = declared_index
            .map(|i| i as usize)
            .or_else(|| specs.get(position).map(|s| s.index))
            .unwrap_or(position);

        let mut payload = SlidePayload::new(index);
        for (slot, text) in slots_obj {
            if slot == "slide_index" {
                continue;
            }
            match text {
                serde_json::Value::String(s) => {
                    payload.slots.insert(slot.clone(), s.clone());
                }
                serde_json::Value::Number(n) => {
                    payload.slots.insert(slot.clone(), n.to_string());
                }
                _ => {}
            }
        }
        payloads.push(payload);
    }

    if payloads.is_empty() {
        None
    } else {
        Some(payloads)
    }
}
