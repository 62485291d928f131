use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::units::{DeckManifest, SlidePayload, SourceChunk};

/// Everything a provider needs to draft slot content. `manifest` is scoped
/// to the slides being (re)generated, not necessarily the whole deck.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thesis: Option<String>,
    #[serde(default)]
    pub context_chunks: Vec<SourceChunk>,
    pub manifest: DeckManifest,
    pub slide_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
}

/// Seam between the control loop and whatever model backs it. Providers are
/// expected to degrade rather than fail on bad model output: substitute
/// fallback payloads and record a warning for the critic to price.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Draft one payload per slide in `req.manifest`, in manifest order.
    async fn generate_slides(
        &self,
        req: &GenerationRequest,
    ) -> Result<Vec<SlidePayload>, ProviderError>;

    /// Free-form text generation (thesis, outline prose).
    async fn generate_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;

    /// Drain warnings accumulated since the last call to this method.
    /// The orchestrator folds these into the quality report.
    fn take_warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::SlideSpec;

    #[test]
    fn request_serde_round_trip() {
        let req = GenerationRequest {
            prompt: "Quarterly review".into(),
            thesis: Some("Revenue grew".into()),
            context_chunks: vec![SourceChunk {
                source_id: "s1".into(),
                title: "Q3 earnings".into(),
                ..Default::default()
            }],
            manifest: DeckManifest {
                slides: vec![SlideSpec {
                    index: 0,
                    slots: vec!["TITLE".into()],
                    ..Default::default()
                }],
            },
            slide_count: 1,
            extra_instructions: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["slide_count"], 1);
        assert!(json.get("extra_instructions").is_none());
        let back: GenerationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.context_chunks.len(), 1);
    }
}
