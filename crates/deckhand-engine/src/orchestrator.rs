use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use deckhand_core::issues::Issue;
use deckhand_core::provider::GenerationProvider;
use deckhand_core::report::{CreationMode, QualityProfile, QualityReport};
use deckhand_core::tools::ToolContext;
use deckhand_core::units::{DeckManifest, SlidePayload, SourceChunk};
use deckhand_llm::prompt::{build_thesis_prompt, THESIS_SYSTEM_PROMPT};
use deckhand_tools::registry::ToolRegistry;
use deckhand_tools::runner::ToolRunner;
use deckhand_tools::trace::{TraceEvent, TraceSink};

use crate::critic::{collect_issues, correction_targets, score, should_continue};
use crate::error::EngineError;
use crate::generator::{DraftRequest, SlideGenerator};
use crate::planner::{build_plan, Plan, DEFAULT_MAX_PLAN_STEPS};

/// Server-wide ceiling on correction passes, whatever the profile asks for.
pub const HARD_MAX_CORRECTION_PASSES: u32 = 3;

const DEFAULT_MAX_SOURCES_PER_SLIDE: usize = 3;

const THESIS_MAX_TOKENS: u32 = 200;

const CORRECTIVE_INSTRUCTION: &str =
    "Tighten wording and fix overflow; keep every listed slot filled and within its character budget.";

#[derive(Clone, Debug)]
pub struct JobConfig {
    pub quality_profile: QualityProfile,
    pub creation_mode: CreationMode,
    /// When false the QA/correction loop is skipped entirely and the
    /// drafted payloads ship as-is.
    pub agent_enabled: bool,
    /// Override for the profile's correction-pass budget. Fast stays at
    /// zero regardless; everything is capped by the hard maximum.
    pub correction_passes: Option<u32>,
    pub max_plan_steps: usize,
    pub max_sources_per_slide: usize,
    pub extra_instructions: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            quality_profile: QualityProfile::default(),
            creation_mode: CreationMode::default(),
            agent_enabled: true,
            correction_passes: None,
            max_plan_steps: DEFAULT_MAX_PLAN_STEPS,
            max_sources_per_slide: DEFAULT_MAX_SOURCES_PER_SLIDE,
            extra_instructions: None,
        }
    }
}

impl JobConfig {
    fn effective_max_passes(&self) -> u32 {
        if self.quality_profile == QualityProfile::Fast {
            return 0;
        }
        self.correction_passes
            .unwrap_or_else(|| self.quality_profile.default_correction_passes())
            .min(HARD_MAX_CORRECTION_PASSES)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub payloads: Vec<SlidePayload>,
    pub report: QualityReport,
    pub issues: Vec<Issue>,
    pub warnings: Vec<String>,
    pub plan: Plan,
    pub passes_used: u32,
    pub rewrites_applied: u32,
}

/// The bounded control loop: draft every slide in parallel, evaluate with
/// the QA tools, then regenerate the worst slides until nothing critical
/// remains or the pass budget runs out. Quality problems are priced into
/// the report; only infrastructure failures abort the job.
pub struct DeckJobDriver {
    provider: Arc<dyn GenerationProvider>,
    runner: Arc<ToolRunner>,
    trace: Arc<dyn TraceSink>,
}

impl DeckJobDriver {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        registry: Arc<ToolRegistry>,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        let runner = Arc::new(ToolRunner::new(registry, trace.clone()));
        Self {
            provider,
            runner,
            trace,
        }
    }

    #[instrument(skip_all, fields(profile = config.quality_profile.as_str()))]
    pub async fn run(
        &self,
        brief: &str,
        thesis: Option<String>,
        manifest: &DeckManifest,
        chunks: Vec<SourceChunk>,
        config: &JobConfig,
    ) -> Result<JobOutcome, EngineError> {
        if manifest.is_empty() {
            return Err(EngineError::Manifest("deck manifest has no slides".into()));
        }

        let job_id = Uuid::now_v7().to_string();
        self.trace.record_event(TraceEvent::new(
            &job_id,
            "job",
            "job_start",
            serde_json::json!({
                "profile": config.quality_profile.as_str(),
                "mode": config.creation_mode,
                "slide_count": manifest.len(),
            }),
        ));

        let plan = build_plan(
            config.creation_mode,
            config.quality_profile,
            &manifest.slides,
            config.max_plan_steps,
        );

        let mut warnings = Vec::new();
        let thesis = match thesis {
            Some(thesis) => Some(thesis),
            None => self.derive_thesis(brief, &mut warnings).await,
        };

        let generator = SlideGenerator::new(self.provider.clone(), self.runner.clone());
        let draft_req = DraftRequest {
            brief: brief.to_string(),
            thesis,
            chunks,
            quality_profile: config.quality_profile,
            job_id: Some(job_id.clone()),
            extra_instructions: config.extra_instructions.clone(),
            max_sources_per_slide: config.max_sources_per_slide,
        };

        let (mut payloads, mut draft_warnings) =
            generator.generate(&manifest.slides, &draft_req).await;
        warnings.append(&mut draft_warnings);
        info!(slides = payloads.len(), "initial draft complete");

        if !config.agent_enabled {
            let report = score(&[], &warnings, 0, 0);
            return Ok(self.finish(job_id, payloads, report, Vec::new(), warnings, plan, 0, 0));
        }

        let max_passes = config.effective_max_passes();
        let mut issues = self.evaluate(&job_id, &payloads, manifest, config).await;
        let mut passes_used = 0u32;
        let mut rewrites_applied = 0u32;

        while should_continue(&issues, passes_used, max_passes) {
            let targets = correction_targets(&issues);
            let specs: Vec<_> = targets
                .iter()
                .filter_map(|index| manifest.slide(*index).cloned())
                .collect();
            if specs.is_empty() {
                break;
            }
            info!(pass = passes_used + 1, targets = specs.len(), "correction pass");
            self.trace.record_event(TraceEvent::new(
                &job_id,
                "correct",
                "correction_pass",
                serde_json::json!({"pass": passes_used + 1, "targets": targets}),
            ));

            let corrective = DraftRequest {
                extra_instructions: Some(match &config.extra_instructions {
                    Some(extra) => format!("{extra}\n{CORRECTIVE_INSTRUCTION}"),
                    None => CORRECTIVE_INSTRUCTION.to_string(),
                }),
                ..draft_req.clone()
            };
            let (regenerated, mut pass_warnings) = generator.generate(&specs, &corrective).await;
            warnings.append(&mut pass_warnings);
            for replacement in regenerated {
                if let Some(slot) = payloads
                    .iter_mut()
                    .find(|p| p.slide_index == replacement.slide_index)
                {
                    *slot = replacement;
                }
            }

            rewrites_applied += specs.len() as u32;
            passes_used += 1;
            issues = self.evaluate(&job_id, &payloads, manifest, config).await;
        }

        let report = score(&issues, &warnings, rewrites_applied, passes_used);
        Ok(self.finish(
            job_id,
            payloads,
            report,
            issues,
            warnings,
            plan,
            passes_used,
            rewrites_applied,
        ))
    }

    /// Derive a thesis from the brief when the caller supplies none. A
    /// provider failure here is not fatal: drafting proceeds without a
    /// thesis and the report carries a warning.
    async fn derive_thesis(&self, brief: &str, warnings: &mut Vec<String>) -> Option<String> {
        match self
            .provider
            .generate_text(THESIS_SYSTEM_PROMPT, &build_thesis_prompt(brief), THESIS_MAX_TOKENS)
            .await
        {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                warn!(kind = e.error_kind(), "thesis generation failed");
                warnings.push(format!(
                    "thesis generation failed ({}); drafting without a thesis",
                    e.error_kind()
                ));
                None
            }
        }
    }

    /// Run the QA stage over the current payloads and pool the issues.
    async fn evaluate(
        &self,
        job_id: &str,
        payloads: &[SlidePayload],
        manifest: &DeckManifest,
        config: &JobConfig,
    ) -> Vec<Issue> {
        let ctx = ToolContext {
            job_id: Some(job_id.to_string()),
            quality_profile: config.quality_profile,
            ..ToolContext::default()
        };
        let input = serde_json::json!({
            "slides_payload": serde_json::to_value(payloads).unwrap_or_default(),
            "template_manifest": serde_json::to_value(manifest).unwrap_or_default(),
        });

        let mut results = vec![self.runner.run("qa.content_check", input.clone(), &ctx).await];
        if config.quality_profile.runs_visual_qa() {
            results.push(self.runner.run("qa.visual_check", input, &ctx).await);
        }
        collect_issues(&results.iter().collect::<Vec<_>>())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        job_id: String,
        payloads: Vec<SlidePayload>,
        report: QualityReport,
        issues: Vec<Issue>,
        warnings: Vec<String>,
        plan: Plan,
        passes_used: u32,
        rewrites_applied: u32,
    ) -> JobOutcome {
        self.trace.record_event(TraceEvent::new(
            &job_id,
            "job",
            "job_done",
            serde_json::json!({
                "score": report.score,
                "passes_used": passes_used,
                "rewrites_applied": rewrites_applied,
            }),
        ));
        info!(score = report.score, passes_used, "job finished");
        JobOutcome {
            job_id,
            payloads,
            report,
            issues,
            warnings,
            plan,
            passes_used,
            rewrites_applied,
        }
    }
}
