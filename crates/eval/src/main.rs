//! Command-line front end for the conflict engine.
//!
//! Usage:
//!     eval grade --candidates marks.json --name COLORGRIP --classes "3, 25" --goods "hair color"
//!     eval audit --oracle-output answer.txt --name COLORGRIP
//!     eval filter --candidates marks.json --oracle-output overlap.txt
//!     eval health

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clearmark_audit::{audit_oracle_text, filter_by_overlap, parse_component_analysis};
use clearmark_explain::{explain_verdict, summarize_verdict};
use clearmark_features::{HashingEmbedder, PrecomputedEmbedder, SharedEmbedder};
use clearmark_grade::{embedding_inputs, relevant_candidates, ConflictEngine, EngineConfig};
use clearmark_model::{CandidateMark, ConflictGrade, ProposedMark};
use clearmark_oracle::{ChatBackend, ChatOracle, EmbeddingClient, OracleConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Grade trademark conflicts and audit oracle output")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Azure OpenAI embeddings deployment
    Azure,
    /// Offline word and trigram hashing
    Hashing,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade candidate marks against a proposed mark
    Grade {
        /// JSON array of candidate marks
        #[arg(long)]
        candidates: PathBuf,

        /// Proposed mark name
        #[arg(short, long)]
        name: String,

        /// Proposed Nice classes (comma-separated)
        #[arg(short, long, default_value = "")]
        classes: String,

        /// Proposed goods/services
        #[arg(short, long, default_value = "")]
        goods: String,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Embedding model for the semantic checks
        #[arg(long, value_enum, default_value = "azure")]
        embedder: EmbedderKind,

        /// Precomputed embeddings (JSON object of text -> vector), used
        /// before the embedding model
        #[arg(long)]
        embeddings: Option<PathBuf>,

        /// Ask the oracle for prominent elements
        #[arg(long)]
        oracle: bool,

        /// Grade with the prominent-element profile
        #[arg(long)]
        prominent: bool,

        /// Drop candidates whose goods/services look unrelated
        #[arg(long)]
        relevant_only: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Audit an oracle classification answer
    Audit {
        /// Raw oracle answer text
        #[arg(long)]
        oracle_output: PathBuf,

        /// Proposed mark name
        #[arg(short, long)]
        name: String,

        /// The answer is a component analysis
        #[arg(long)]
        components: bool,
    },

    /// Keep candidates the oracle confirmed as overlapping
    Filter {
        /// JSON array of candidate marks
        #[arg(long)]
        candidates: PathBuf,

        /// Raw oracle answer text with overlap results
        #[arg(long)]
        oracle_output: PathBuf,
    },

    /// Check oracle health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clearmark=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grade {
            candidates,
            name,
            classes,
            goods,
            config,
            embedder,
            embeddings,
            oracle,
            prominent,
            relevant_only,
            format,
        } => {
            let options = GradeOptions {
                config,
                embedder,
                embeddings,
                oracle,
                prominent,
                relevant_only,
                format,
            };
            run_grade(&candidates, ProposedMark::new(name, &classes, goods), options).await?;
        }
        Commands::Audit {
            oracle_output,
            name,
            components,
        } => {
            run_audit(&oracle_output, &name, components)?;
        }
        Commands::Filter {
            candidates,
            oracle_output,
        } => {
            run_filter(&candidates, &oracle_output)?;
        }
        Commands::Health => {
            run_health().await?;
        }
    }

    Ok(())
}

struct GradeOptions {
    config: Option<PathBuf>,
    embedder: EmbedderKind,
    embeddings: Option<PathBuf>,
    oracle: bool,
    prominent: bool,
    relevant_only: bool,
    format: Format,
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_candidates(path: &Path) -> Result<Vec<CandidateMark>> {
    serde_json::from_str(&read_text(path)?)
        .with_context(|| format!("Invalid candidate list in {}", path.display()))
}

/// Build the embedder for a run.
///
/// The Azure deployment embeds every text the run will compare up front;
/// without Azure settings the offline hashing embedder is used. A
/// precomputed table, when given, answers first.
async fn load_embedder(
    kind: EmbedderKind,
    table: Option<&Path>,
    candidates: &[CandidateMark],
    proposed: &ProposedMark,
) -> Result<SharedEmbedder> {
    let model: SharedEmbedder = match kind {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
        EmbedderKind::Azure => match OracleConfig::from_env().and_then(EmbeddingClient::new) {
            Ok(client) => {
                info!(model = %client.model_name(), "Embedding with Azure OpenAI");
                Arc::new(client.prefetch(embedding_inputs(candidates, proposed)).await)
            }
            Err(e) => {
                warn!(error = %e, "Embedding service unavailable, using hashing embedder");
                Arc::new(HashingEmbedder::default())
            }
        },
    };

    let Some(path) = table else {
        return Ok(model);
    };
    let table = PrecomputedEmbedder::from_json(&read_text(path)?)
        .with_context(|| format!("Invalid embedding table in {}", path.display()))?;
    Ok(Arc::new(table.with_fallback(model)))
}

async fn run_grade(candidates_path: &Path, proposed: ProposedMark, options: GradeOptions) -> Result<()> {
    let config: EngineConfig = match &options.config {
        Some(path) => serde_json::from_str(&read_text(path)?)
            .with_context(|| format!("Invalid engine config in {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let relevance_threshold = config.thresholds.relevance_keyword_overlap;

    let all_candidates = load_candidates(candidates_path)?;
    let candidates: Vec<CandidateMark> = if options.relevant_only {
        let (kept, excluded) =
            relevant_candidates(&all_candidates, &proposed.goods_services, relevance_threshold);
        if options.format == Format::Text {
            println!("Excluded {} candidates with unrelated goods/services", excluded);
        }
        kept.into_iter().cloned().collect()
    } else {
        all_candidates
    };

    let embedder = load_embedder(
        options.embedder,
        options.embeddings.as_deref(),
        &candidates,
        &proposed,
    )
    .await?;
    let mut engine = ConflictEngine::new(embedder, config);

    if options.oracle {
        match OracleConfig::from_env().and_then(ChatOracle::new) {
            Ok(oracle) => {
                let marks = candidates
                    .iter()
                    .map(|c| c.name.as_str())
                    .chain(std::iter::once(proposed.name.as_str()));
                let table = oracle.prefetch(marks).await;
                engine = engine.with_oracle(Arc::new(table));
            }
            Err(e) => warn!(error = %e, "Oracle unavailable, using heuristic prominent elements"),
        }
    }

    let report = if options.prominent {
        engine.screen_prominent(&candidates, &proposed)
    } else {
        engine.screen(&candidates, &proposed)
    };
    let dashboard = report.dashboard();

    if options.format == Format::Json {
        let explanations: Vec<_> = report.verdicts.iter().map(explain_verdict).collect();
        let output = serde_json::json!({
            "proposed": proposed,
            "verdicts": report.verdicts,
            "explanations": explanations,
            "dashboard": dashboard,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Proposed: {}", proposed.name);
    if !proposed.classes.is_empty() {
        println!("Classes: {:?}", proposed.classes);
    }
    println!("---");

    for (i, verdict) in report.verdicts.iter().enumerate() {
        println!("\n{}. {}", i + 1, summarize_verdict(verdict));
        for line in verdict.reasoning.lines().filter(|l| !l.trim().is_empty()) {
            println!("   {}", line);
        }
    }

    println!("\n---");
    println!(
        "Conflicts: {} (High {}, Moderate {}, Name-Match {}, Low {})",
        dashboard.total_conflicts,
        dashboard.high,
        dashboard.moderate,
        dashboard.name_match,
        dashboard.low
    );
    println!("Total: {} candidates", report.verdicts.len());

    let direct_hits: Vec<&str> = report
        .by_grade(ConflictGrade::NameMatch)
        .map(|v| v.mark_name.as_str())
        .collect();
    if !direct_hits.is_empty() {
        println!("Direct hits: {}", direct_hits.join(", "));
    }

    Ok(())
}

fn run_audit(path: &Path, proposed_name: &str, components: bool) -> Result<()> {
    let text = read_text(path)?;

    let output = if components {
        let analysis = parse_component_analysis(&text)
            .with_context(|| format!("Unreadable component analysis in {}", path.display()))?;
        serde_json::to_string_pretty(&analysis)?
    } else {
        serde_json::to_string_pretty(&audit_oracle_text(&text, proposed_name))?
    };

    println!("{}", output);
    Ok(())
}

fn run_filter(candidates_path: &Path, oracle_path: &Path) -> Result<()> {
    let candidates = load_candidates(candidates_path)?;
    let kept = filter_by_overlap(&candidates, &read_text(oracle_path)?);
    println!("{}", serde_json::to_string_pretty(&kept)?);
    Ok(())
}

async fn run_health() -> Result<()> {
    let oracle = ChatOracle::new(OracleConfig::from_env()?)?;
    print!("Checking {} oracle... ", oracle.name());

    match oracle.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}
