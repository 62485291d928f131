use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-slot geometry supplied by the template, when the renderer knows it.
/// Used to derive character budgets from actual box dimensions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotBinding {
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_inches: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_inches: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f64>,
}

/// One slide's contract: which named slots exist and what the slide is for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub index: usize,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archetype: String,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<SlotBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_message: Option<String>,
}

impl SlideSpec {
    pub fn binding(&self, slot: &str) -> Option<&SlotBinding> {
        self.bindings.iter().find(|b| b.slot == slot)
    }
}

/// The deck template: an ordered list of slide specs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckManifest {
    pub slides: Vec<SlideSpec>,
}

impl DeckManifest {
    pub fn slide(&self, index: usize) -> Option<&SlideSpec> {
        self.slides.iter().find(|s| s.index == index)
    }

    pub fn expected_slots(&self, index: usize) -> &[String] {
        self.slide(index).map(|s| s.slots.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Generated content for one slide, keyed by slot name. Replaced wholesale
/// when a slide is regenerated — never patched in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidePayload {
    pub slide_index: usize,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

impl SlidePayload {
    pub fn new(slide_index: usize) -> Self {
        Self {
            slide_index,
            slots: BTreeMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>, text: impl Into<String>) -> Self {
        self.slots.insert(slot.into(), text.into());
        self
    }

    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(String::as_str)
    }
}

/// A unit of research material that can be routed to slides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub source_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub excerpt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lookup_by_declared_index() {
        let manifest = DeckManifest {
            slides: vec![
                SlideSpec {
                    index: 2,
                    name: "Market".into(),
                    slots: vec!["TITLE".into(), "BODY".into()],
                    ..Default::default()
                },
                SlideSpec {
                    index: 5,
                    name: "Closing".into(),
                    slots: vec!["TITLE".into()],
                    ..Default::default()
                },
            ],
        };
        assert_eq!(manifest.slide(5).map(|s| s.name.as_str()), Some("Closing"));
        assert!(manifest.slide(0).is_none());
        assert_eq!(manifest.expected_slots(2), &["TITLE", "BODY"]);
        assert!(manifest.expected_slots(99).is_empty());
    }

    #[test]
    fn payload_slots_serialize_deterministically() {
        let payload = SlidePayload::new(0)
            .with_slot("TITLE", "Q3 Results")
            .with_slot("BODY", "Revenue grew 14%");
        let json = serde_json::to_string(&payload).unwrap();
        // BTreeMap keys come out sorted
        assert!(json.find("BODY").unwrap() < json.find("TITLE").unwrap());
    }

    #[test]
    fn slide_spec_tolerates_sparse_json() {
        let spec: SlideSpec = serde_json::from_str(r#"{"index": 3}"#).unwrap();
        assert_eq!(spec.index, 3);
        assert!(spec.slots.is_empty());
        assert!(spec.narrative_role.is_none());
    }
}
