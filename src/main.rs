use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use deckhand_core::report::{CreationMode, QualityProfile};
use deckhand_core::units::{DeckManifest, SourceChunk};
use deckhand_engine::orchestrator::{DeckJobDriver, JobConfig};
use deckhand_engine::planner::DEFAULT_MAX_PLAN_STEPS;
use deckhand_llm::factory::{create_provider, ProviderConfig, ProviderKind};
use deckhand_tools::registry::builtin_registry;
use deckhand_tools::trace::MemoryTraceSink;

#[derive(Parser)]
#[command(name = "deckhand", about = "Slide content generation with bounded QA correction")]
struct Cli {
    /// Emit logs as newline-delimited JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Draft a deck from a brief and a template manifest.
    Generate {
        /// The presentation brief.
        #[arg(long)]
        brief: String,
        /// Optional central thesis to anchor every slide.
        #[arg(long)]
        thesis: Option<String>,
        /// Path to the deck manifest JSON.
        #[arg(long)]
        manifest: PathBuf,
        /// Path to a JSON array of research source chunks.
        #[arg(long)]
        sources: Option<PathBuf>,
        /// Quality profile: fast, balanced, or high_fidelity.
        #[arg(long, default_value = "balanced")]
        profile: String,
        /// Force a provider backend: mock, openai, or anthropic.
        #[arg(long)]
        provider: Option<String>,
        /// Override the profile's correction-pass budget.
        #[arg(long)]
        passes: Option<u32>,
        /// Skip QA and correction; ship the raw draft.
        #[arg(long)]
        no_agent: bool,
        /// Cap on routed sources per slide.
        #[arg(long, default_value_t = 3)]
        max_sources_per_slide: usize,
        /// Extra instructions appended to every generation prompt.
        #[arg(long)]
        instructions: Option<String>,
        /// Write the result JSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Dump trace events to stderr as NDJSON.
        #[arg(long)]
        trace: bool,
    },
    /// List the registered tools.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    deckhand_telemetry::init_telemetry(deckhand_telemetry::TelemetryConfig {
        json_output: cli.json_logs,
        ..deckhand_telemetry::TelemetryConfig::default()
    });

    match cli.command {
        Command::Generate {
            brief,
            thesis,
            manifest,
            sources,
            profile,
            provider,
            passes,
            no_agent,
            max_sources_per_slide,
            instructions,
            out,
            trace,
        } => {
            generate(GenerateArgs {
                brief,
                thesis,
                manifest,
                sources,
                profile,
                provider,
                passes,
                no_agent,
                max_sources_per_slide,
                instructions,
                out,
                trace,
            })
            .await
        }
        Command::Tools => {
            for name in builtin_registry().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

struct GenerateArgs {
    brief: String,
    thesis: Option<String>,
    manifest: PathBuf,
    sources: Option<PathBuf>,
    profile: String,
    provider: Option<String>,
    passes: Option<u32>,
    no_agent: bool,
    max_sources_per_slide: usize,
    instructions: Option<String>,
    out: Option<PathBuf>,
    trace: bool,
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let manifest = read_manifest(&args.manifest)?;
    let chunks = match &args.sources {
        Some(path) => read_sources(path)?,
        None => Vec::new(),
    };

    let mut provider_config = ProviderConfig::from_env();
    if let Some(forced) = &args.provider {
        provider_config.kind = Some(
            ProviderKind::parse(forced)
                .with_context(|| format!("unknown provider '{forced}'"))?,
        );
    }
    let provider = create_provider(&provider_config);

    let sink = Arc::new(MemoryTraceSink::new());
    let driver = DeckJobDriver::new(provider, Arc::new(builtin_registry()), sink.clone());

    let config = JobConfig {
        quality_profile: QualityProfile::parse_lenient(&args.profile),
        creation_mode: CreationMode::Generate,
        agent_enabled: !args.no_agent,
        correction_passes: args.passes,
        max_plan_steps: DEFAULT_MAX_PLAN_STEPS,
        max_sources_per_slide: args.max_sources_per_slide,
        extra_instructions: args.instructions.clone(),
    };

    let outcome = driver
        .run(&args.brief, args.thesis.clone(), &manifest, chunks, &config)
        .await
        .context("deck generation failed")?;

    if args.trace {
        for event in sink.events() {
            if let Ok(line) = serde_json::to_string(&event) {
                eprintln!("{line}");
            }
        }
    }

    let output = serde_json::json!({
        "job_id": outcome.job_id,
        "slides": outcome.payloads,
        "quality_report": outcome.report,
        "issues": outcome.issues,
        "warnings": outcome.warnings,
        "passes_used": outcome.passes_used,
        "rewrites_applied": outcome.rewrites_applied,
    });
    let rendered = serde_json::to_string_pretty(&output)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing output to {}", path.display()))?;
            tracing::info!(path = %path.display(), score = outcome.report.score, "result written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn read_manifest(path: &PathBuf) -> Result<DeckManifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing manifest {}", path.display()))
}

fn read_sources(path: &PathBuf) -> Result<Vec<SourceChunk>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading sources {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing sources {}", path.display()))
}
