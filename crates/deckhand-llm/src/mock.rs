use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use deckhand_core::errors::ProviderError;
use deckhand_core::provider::{GenerationProvider, GenerationRequest};
use deckhand_core::units::{SlidePayload, SlideSpec};

/// Pre-programmed outcomes for deterministic testing without API calls.
pub enum MockGeneration {
    /// Return these payloads from generate_slides.
    Slides(Vec<SlidePayload>),
    /// Return this text from generate_text.
    Text(String),
    /// Fail the call.
    Error(ProviderError),
    /// Wait a duration, then yield the inner outcome.
    Delay(Duration, Box<MockGeneration>),
}

impl MockGeneration {
    pub fn delayed(delay: Duration, inner: MockGeneration) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider. In scripted mode it plays back outcomes in sequence and
/// errors when the script runs out; in generative mode it synthesizes
/// deterministic content from the request, which keeps the CLI usable with
/// no API key.
pub struct MockProvider {
    responses: Vec<MockGeneration>,
    synthesize_when_exhausted: bool,
    call_count: AtomicUsize,
    warnings: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn scripted(responses: Vec<MockGeneration>) -> Self {
        Self {
            responses,
            synthesize_when_exhausted: false,
            call_count: AtomicUsize::new(0),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn generative() -> Self {
        Self {
            responses: Vec::new(),
            synthesize_when_exhausted: true,
            call_count: AtomicUsize::new(0),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Queue a warning to be surfaced by the next take_warnings().
    pub fn push_warning(&self, warning: impl Into<String>) {
        self.warnings.lock().push(warning.into());
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    async fn next_outcome(&self) -> Option<&MockGeneration> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut current = self.responses.get(idx)?;
        loop {
            match current {
                MockGeneration::Delay(duration, inner) => {
                    tokio::time::sleep(*duration).await;
                    current = inner;
                }
                other => return Some(other),
            }
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_slides(
        &self,
        req: &GenerationRequest,
    ) -> Result<Vec<SlidePayload>, ProviderError> {
        match self.next_outcome().await {
            Some(MockGeneration::Slides(payloads)) => Ok(payloads.clone()),
            Some(MockGeneration::Error(e)) => Err(e.clone()),
            Some(MockGeneration::Text(_)) => Err(ProviderError::InvalidResponse(
                "MockProvider: text outcome scripted for a slides call".into(),
            )),
            Some(MockGeneration::Delay(..)) => unreachable!("delays are unrolled"),
            None if self.synthesize_when_exhausted => Ok(synthesize_slides(req)),
            None => Err(ProviderError::InvalidRequest(format!(
                "MockProvider: no outcome configured for call {}",
                self.call_count() - 1
            ))),
        }
    }

    async fn generate_text(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        match self.next_outcome().await {
            Some(MockGeneration::Text(text)) => Ok(text.clone()),
            Some(MockGeneration::Error(e)) => Err(e.clone()),
            Some(MockGeneration::Slides(payloads)) => serde_json::to_string(payloads)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string())),
            Some(MockGeneration::Delay(..)) => unreachable!("delays are unrolled"),
            None if self.synthesize_when_exhausted => {
                let head: String = user_prompt.chars().take(200).collect();
                Ok(format!("Draft notes: {head}"))
            }
            None => Err(ProviderError::InvalidRequest(format!(
                "MockProvider: no outcome configured for call {}",
                self.call_count() - 1
            ))),
        }
    }

    fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock())
    }
}

/// Deterministic slot content derived only from the request.
fn synthesize_slides(req: &GenerationRequest) -> Vec<SlidePayload> {
    req.manifest
        .slides
        .iter()
        .map(|spec| synthesize_payload(spec, req))
        .collect()
}

fn synthesize_payload(spec: &SlideSpec, req: &GenerationRequest) -> SlidePayload {
    let name = if spec.name.is_empty() {
        format!("Slide {}", spec.index + 1)
    } else {
        spec.name.clone()
    };
    let theme = spec
        .key_message
        .clone()
        .or_else(|| req.thesis.clone())
        .unwrap_or_else(|| req.prompt.clone());

    let mut payload = SlidePayload::new(spec.index);
    for slot in &spec.slots {
        let upper = slot.to_ascii_uppercase();
        let text = if upper.contains("CITATION") || upper.contains("SOURCE") {
            match req.context_chunks.first() {
                Some(chunk) if !chunk.title.is_empty() => format!("Source: {}", chunk.title),
                _ => "Source: internal analysis".to_string(),
            }
        } else if upper.contains("SUBTITLE") {
            theme.chars().take(110).collect()
        } else if upper.contains("TITLE") {
            name.clone()
        } else {
            let mut body = theme.clone();
            let titles: Vec<&str> = req
                .context_chunks
                .iter()
                .take(2)
                .map(|c| c.title.as_str())
                .filter(|t| !t.is_empty())
                .collect();
            if !titles.is_empty() {
                body.push_str(&format!(" Supporting material: {}.", titles.join("; ")));
            }
            body
        };
        payload.slots.insert(slot.clone(), text);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::units::{DeckManifest, SourceChunk};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "State of the fleet".into(),
            thesis: Some("Uptime improved across all regions".into()),
            context_chunks: vec![SourceChunk {
                source_id: "s1".into(),
                title: "Fleet report".into(),
                ..Default::default()
            }],
            manifest: DeckManifest {
                slides: vec![SlideSpec {
                    index: 0,
                    name: "Overview".into(),
                    slots: vec!["TITLE".into(), "BODY".into(), "CITATION".into()],
                    ..Default::default()
                }],
            },
            slide_count: 1,
            extra_instructions: None,
        }
    }

    #[tokio::test]
    async fn scripted_sequence() {
        let mock = MockProvider::scripted(vec![
            MockGeneration::Slides(vec![SlidePayload::new(0).with_slot("TITLE", "first")]),
            MockGeneration::Slides(vec![SlidePayload::new(0).with_slot("TITLE", "second")]),
        ]);
        let req = request();
        let first = mock.generate_slides(&req).await.unwrap();
        assert_eq!(first[0].slot("TITLE"), Some("first"));
        let second = mock.generate_slides(&req).await.unwrap();
        assert_eq!(second[0].slot("TITLE"), Some("second"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let mock = MockProvider::scripted(vec![MockGeneration::Slides(vec![])]);
        let req = request();
        let _ = mock.generate_slides(&req).await;
        let result = mock.generate_slides(&req).await;
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn scripted_error_surfaces() {
        let mock = MockProvider::scripted(vec![MockGeneration::Error(
            ProviderError::RateLimited { retry_after: None },
        )]);
        let result = mock.generate_slides(&request()).await;
        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn delayed_outcome_waits() {
        tokio::time::pause();
        let mock = MockProvider::scripted(vec![MockGeneration::delayed(
            Duration::from_millis(50),
            MockGeneration::Slides(vec![]),
        )]);
        let req = request();
        let start = tokio::time::Instant::now();
        mock.generate_slides(&req).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn generative_mode_fills_every_slot() {
        let mock = MockProvider::generative();
        let payloads = mock.generate_slides(&request()).await.unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].slot("TITLE"), Some("Overview"));
        assert_eq!(payloads[0].slot("CITATION"), Some("Source: Fleet report"));
        assert!(!payloads[0].slot("BODY").unwrap().is_empty());
    }

    #[tokio::test]
    async fn warnings_drain_once() {
        let mock = MockProvider::generative();
        mock.push_warning("fallback payload used for slide 2");
        assert_eq!(mock.take_warnings().len(), 1);
        assert!(mock.take_warnings().is_empty());
    }
}
