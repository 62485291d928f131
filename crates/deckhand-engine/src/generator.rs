use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use deckhand_core::provider::{GenerationProvider, GenerationRequest};
use deckhand_core::report::QualityProfile;
use deckhand_core::tools::ToolContext;
use deckhand_core::units::{DeckManifest, SlidePayload, SlideSpec, SourceChunk};
use deckhand_llm::fallback::fallback_payload;
use deckhand_tools::archetypes::{archetype_guidance, infer_archetype};
use deckhand_tools::runner::ToolRunner;

const MAX_CONCURRENT_SLIDES: usize = 8;

/// Inputs shared by every slide drafted in one job.
#[derive(Clone)]
pub struct DraftRequest {
    pub brief: String,
    pub thesis: Option<String>,
    pub chunks: Vec<SourceChunk>,
    pub quality_profile: QualityProfile,
    pub job_id: Option<String>,
    pub extra_instructions: Option<String>,
    pub max_sources_per_slide: usize,
}

/// Parallel per-slide drafting. Each slide gets its own routed sources and
/// its own provider call; a failed slide degrades to a fallback payload
/// and never disturbs its siblings. Output is in spec order regardless of
/// completion order.
pub struct SlideGenerator {
    provider: Arc<dyn GenerationProvider>,
    runner: Arc<ToolRunner>,
}

impl SlideGenerator {
    pub fn new(provider: Arc<dyn GenerationProvider>, runner: Arc<ToolRunner>) -> Self {
        Self { provider, runner }
    }

    pub async fn generate(
        &self,
        specs: &[SlideSpec],
        req: &DraftRequest,
    ) -> (Vec<SlidePayload>, Vec<String>) {
        if specs.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_SLIDES.min(specs.len())));
        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.clone();
            let req = req.clone();
            let provider = self.provider.clone();
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                draft_one(spec, req, provider, runner).await
            }));
        }

        let seed = req.thesis.as_deref().unwrap_or(&req.brief);
        let mut payloads = Vec::with_capacity(specs.len());
        let mut warnings = Vec::new();
        // Joining in spawn order keeps output aligned with the specs even
        // when completion order is scrambled.
        for (handle, spec) in handles.into_iter().zip(specs) {
            match handle.await {
                Ok((payload, mut slide_warnings)) => {
                    payloads.push(payload);
                    warnings.append(&mut slide_warnings);
                }
                Err(_) => {
                    warn!(slide_index = spec.index, "slide generation task panicked");
                    payloads.push(fallback_payload(spec, seed));
                    warnings.push(format!(
                        "slide {} generation task panicked; fallback payload used",
                        spec.index
                    ));
                }
            }
        }

        warnings.extend(self.provider.take_warnings());
        (payloads, warnings)
    }
}

async fn draft_one(
    spec: SlideSpec,
    req: DraftRequest,
    provider: Arc<dyn GenerationProvider>,
    runner: Arc<ToolRunner>,
) -> (SlidePayload, Vec<String>) {
    let mut warnings = Vec::new();
    let seed = req.thesis.as_deref().unwrap_or(&req.brief);

    let routed = route_sources(&spec, &req, &runner).await;
    debug!(slide_index = spec.index, sources = routed.len(), "drafting slide");

    let mut scoped = spec.clone();
    if scoped.archetype.is_empty() {
        scoped.archetype = infer_archetype(&scoped.slots).to_string();
    }
    let guidance = archetype_guidance(&scoped.archetype);
    let extra = match &req.extra_instructions {
        Some(extra) => format!("{guidance}\n{extra}"),
        None => guidance.to_string(),
    };

    let generation = GenerationRequest {
        prompt: req.brief.clone(),
        thesis: req.thesis.clone(),
        context_chunks: routed,
        manifest: DeckManifest { slides: vec![scoped] },
        slide_count: 1,
        extra_instructions: Some(extra),
    };

    let payload = match provider.generate_slides(&generation).await {
        Ok(payloads) => match payloads.into_iter().find(|p| p.slide_index == spec.index) {
            Some(payload) => payload,
            None => {
                warnings.push(format!(
                    "fallback payload used for slide {}: provider returned no payload",
                    spec.index
                ));
                fallback_payload(&spec, seed)
            }
        },
        Err(e) => {
            warn!(slide_index = spec.index, kind = e.error_kind(), "slide generation failed");
            warnings.push(format!(
                "slide {} generation failed ({}); fallback payload used",
                spec.index,
                e.error_kind()
            ));
            fallback_payload(&spec, seed)
        }
    };

    (payload, warnings)
}

/// Route research chunks through the tool runner; a failed routing call
/// degrades to the first N chunks.
async fn route_sources(
    spec: &SlideSpec,
    req: &DraftRequest,
    runner: &ToolRunner,
) -> Vec<SourceChunk> {
    if req.chunks.is_empty() {
        return Vec::new();
    }
    let ctx = ToolContext {
        job_id: req.job_id.clone(),
        quality_profile: req.quality_profile,
        ..ToolContext::default()
    };
    let input = serde_json::json!({
        "slide_spec": serde_json::to_value(spec).unwrap_or_default(),
        "research_chunks": serde_json::to_value(&req.chunks).unwrap_or_default(),
        "max_per_slide": req.max_sources_per_slide,
    });
    let result = runner.run("research.route_sources", input, &ctx).await;
    if result.ok {
        serde_json::from_value(result.payload["chunks"].clone()).unwrap_or_default()
    } else {
        req.chunks
            .iter()
            .take(req.max_sources_per_slide)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deckhand_core::errors::ProviderError;
    use deckhand_tools::registry::builtin_registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Per-slide test double: replies with a payload derived from the
    /// scoped manifest, optionally failing or sleeping per slide index.
    struct PerSlideProvider {
        fail_on: Vec<usize>,
        /// Sleep (5 - index) * 10ms so later slides finish first.
        scramble: bool,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PerSlideProvider {
        fn new() -> Self {
            Self {
                fail_on: Vec::new(),
                scramble: false,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl deckhand_core::provider::GenerationProvider for PerSlideProvider {
        fn name(&self) -> &str {
            "per-slide-test"
        }

        async fn generate_slides(
            &self,
            req: &GenerationRequest,
        ) -> Result<Vec<SlidePayload>, ProviderError> {
            let spec = &req.manifest.slides[0];
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);

            if self.scramble {
                let delay = 10 * (5usize.saturating_sub(spec.index) as u64);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.contains(&spec.index) {
                return Err(ProviderError::ProviderOverloaded);
            }
            Ok(vec![SlidePayload::new(spec.index)
                .with_slot("TITLE", format!("Title {}", spec.index))])
        }

        async fn generate_text(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: u32,
        ) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    fn specs(n: usize) -> Vec<SlideSpec> {
        (0..n)
            .map(|i| SlideSpec {
                index: i,
                name: format!("Slide {i}"),
                slots: vec!["TITLE".into()],
                ..Default::default()
            })
            .collect()
    }

    fn draft_request() -> DraftRequest {
        DraftRequest {
            brief: "brief".into(),
            thesis: Some("thesis".into()),
            chunks: Vec::new(),
            quality_profile: QualityProfile::Balanced,
            job_id: None,
            extra_instructions: None,
            max_sources_per_slide: 3,
        }
    }

    fn generator(provider: Arc<dyn GenerationProvider>) -> SlideGenerator {
        let runner = Arc::new(ToolRunner::without_trace(Arc::new(builtin_registry())));
        SlideGenerator::new(provider, runner)
    }

    #[tokio::test(start_paused = true)]
    async fn output_order_survives_scrambled_completion() {
        let provider = Arc::new(PerSlideProvider {
            scramble: true,
            ..PerSlideProvider::new()
        });
        let (payloads, warnings) = generator(provider)
            .generate(&specs(5), &draft_request())
            .await;

        assert!(warnings.is_empty());
        assert_eq!(payloads.len(), 5);
        for (i, payload) in payloads.iter().enumerate() {
            assert_eq!(payload.slide_index, i);
            assert_eq!(payload.slot("TITLE"), Some(format!("Title {i}").as_str()));
        }
    }

    #[tokio::test]
    async fn failed_slide_degrades_to_fallback_without_disturbing_others() {
        let provider = Arc::new(PerSlideProvider {
            fail_on: vec![2],
            ..PerSlideProvider::new()
        });
        let (payloads, warnings) = generator(provider)
            .generate(&specs(5), &draft_request())
            .await;

        assert_eq!(payloads.len(), 5);
        // Slide 2 carries the fallback shape: first slot seeded with the thesis.
        assert_eq!(payloads[2].slot("TITLE"), Some("thesis"));
        for i in [0, 1, 3, 4] {
            assert_eq!(payloads[i].slot("TITLE"), Some(format!("Title {i}").as_str()));
        }
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("slide 2 generation failed"));
        assert!(warnings[0].contains("provider_overloaded"));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_is_bounded() {
        let provider = Arc::new(PerSlideProvider {
            scramble: true,
            ..PerSlideProvider::new()
        });
        let (payloads, _) = generator(provider.clone())
            .generate(&specs(20), &draft_request())
            .await;
        assert_eq!(payloads.len(), 20);
        assert!(provider.peak.load(Ordering::SeqCst) <= 8);
    }

    #[tokio::test]
    async fn routed_sources_reach_the_provider() {
        struct CapturingProvider {
            seen: parking_lot::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl deckhand_core::provider::GenerationProvider for CapturingProvider {
            fn name(&self) -> &str {
                "capturing"
            }
            async fn generate_slides(
                &self,
                req: &GenerationRequest,
            ) -> Result<Vec<SlidePayload>, ProviderError> {
                self.seen
                    .lock()
                    .extend(req.context_chunks.iter().map(|c| c.source_id.clone()));
                let spec = &req.manifest.slides[0];
                Ok(vec![SlidePayload::new(spec.index).with_slot("TITLE", "t")])
            }
            async fn generate_text(
                &self,
                _s: &str,
                _u: &str,
                _m: u32,
            ) -> Result<String, ProviderError> {
                Ok(String::new())
            }
        }

        let provider = Arc::new(CapturingProvider {
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let mut req = draft_request();
        req.chunks = vec![
            SourceChunk { source_id: "a".into(), title: "margin data".into(), ..Default::default() },
            SourceChunk { source_id: "b".into(), title: "other".into(), ..Default::default() },
        ];
        req.max_sources_per_slide = 1;

        let mut spec = specs(1);
        spec[0].key_message = Some("margin data".into());
        let (payloads, _) = generator(provider.clone()).generate(&spec, &req).await;

        assert_eq!(payloads.len(), 1);
        assert_eq!(provider.seen.lock().as_slice(), &["a".to_string()]);
    }

    #[tokio::test]
    async fn empty_specs_yield_nothing() {
        let provider = Arc::new(PerSlideProvider::new());
        let (payloads, warnings) = generator(provider).generate(&[], &draft_request()).await;
        assert!(payloads.is_empty());
        assert!(warnings.is_empty());
    }
}
