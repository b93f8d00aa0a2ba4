//! ssimulacra2 CLI - score a distorted image against its original

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use ssim2_engine::{
    AlphaBlend, DataAnalysis, QualityBand, ScoreConfig, Scorer, analyze_image_data, scores_agree,
    version,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Compute the SSIMULACRA2 score of a distorted image against its original.
#[derive(Parser, Debug)]
#[command(name = "ssimulacra2")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Original (reference) image
    original: PathBuf,

    /// Distorted image
    distorted: PathBuf,

    /// Background intensity for alpha blending (0.0 to 1.0, default 0.5)
    #[arg(value_parser = parse_background, allow_negative_numbers = true)]
    background: Option<f32>,

    /// Composite transparency on dark and bright backgrounds and keep the lower score
    #[arg(long)]
    worst_case_alpha: bool,

    /// JSON scoring configuration; the positional background overrides it
    #[arg(long, value_name = "FILE", env = "SSIMULACRA2_CONFIG")]
    config: Option<PathBuf>,

    /// Emit a machine-readable JSON report
    #[arg(long)]
    json: bool,

    /// Skip the per-image header analysis
    #[arg(long)]
    no_analysis: bool,

    /// Skip rescoring through the in-memory API
    #[arg(long)]
    skip_memory_check: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_background(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err("background intensity must be a number between 0.0 and 1.0".to_string());
    }
    Ok(value)
}

#[derive(Serialize)]
struct Report {
    version: &'static str,
    original: PathBuf,
    distorted: PathBuf,
    config: ScoreConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisPair>,
    score: f64,
    band: QualityBand,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_check: Option<MemoryCheck>,
}

#[derive(Serialize)]
struct AnalysisPair {
    original: DataAnalysis,
    distorted: DataAnalysis,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum MemoryCheck {
    Agree { score: f64 },
    Disagree { score: f64 },
    Failed { code: i32, message: String, details: String },
}

#[derive(Serialize)]
struct FailureReport {
    version: &'static str,
    code: i32,
    name: &'static str,
    message: String,
    details: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose, rust_log.as_deref())?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// `RUST_LOG` when set and valid, else `warn`; `-v` adds engine debug output.
fn env_filter(verbose: bool, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    let filter = rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    if verbose {
        return Ok(filter.add_directive("ssim2_engine=debug".parse()?));
    }
    Ok(filter)
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ScoreConfig> {
    let mut config = match &cli.config {
        Some(path) => ScoreConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScoreConfig::default(),
    };
    if let Some(background) = cli.background {
        config.background = background;
    }
    if cli.worst_case_alpha {
        config.alpha_blend = AlphaBlend::WorstCase;
    }
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(data) => Some(data),
        Err(err) => {
            debug!(path = %path.display(), "could not read input for analysis: {err}");
            None
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli)?;
    let scorer = Scorer::new(config.clone());

    // Kept apart from `score_files`, which reads the files itself; these bytes
    // feed the analysis and the memory-path cross-check.
    let original_data = read_optional(&cli.original);
    let distorted_data = read_optional(&cli.distorted);

    if !cli.json {
        println!("SSIMULACRA2 - {}", version());
        println!();
        println!("Computing SSIMULACRA2 score...");
        println!("Original: {}", cli.original.display());
        println!("Distorted: {}", cli.distorted.display());
        println!("Background intensity: {}", config.background);
        if config.alpha_blend == AlphaBlend::WorstCase {
            println!("Alpha blending: worst case of dark and bright backgrounds");
        }
        println!();
    }

    let analysis = match (&original_data, &distorted_data) {
        (Some(original), Some(distorted)) if !cli.no_analysis => Some(AnalysisPair {
            original: analyze_image_data(original),
            distorted: analyze_image_data(distorted),
        }),
        _ => None,
    };

    if let (Some(analysis), false) = (&analysis, cli.json) {
        println!("=== IMAGE ANALYSIS ===");
        println!("Original image analysis:");
        println!("{}", analysis.original);
        println!();
        println!("Distorted image analysis:");
        println!("{}", analysis.distorted);
        println!();
    }

    let score = scorer.score_files(&cli.original, &cli.distorted)?;
    let band = QualityBand::from_score(score);

    let memory_check = match (&original_data, &distorted_data) {
        (Some(original), Some(distorted)) if !cli.skip_memory_check => {
            Some(match scorer.score_memory(original, distorted) {
                Ok(memory) if scores_agree(score, memory) => MemoryCheck::Agree { score: memory },
                Ok(memory) => MemoryCheck::Disagree { score: memory },
                Err(err) => MemoryCheck::Failed {
                    code: err.code().raw(),
                    message: err.to_string(),
                    details: err.details(),
                },
            })
        }
        _ => None,
    };

    if cli.json {
        let report = Report {
            version: version(),
            original: cli.original.clone(),
            distorted: cli.distorted.clone(),
            config,
            analysis,
            score,
            band,
            description: band.description(),
            memory_check,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("SSIMULACRA2 Score: {score:.8}");
    println!();
    println!("Quality interpretation:");
    println!("  {band}");

    if let Some(check) = memory_check {
        println!();
        println!("=== TESTING MEMORY-BASED API ===");
        match check {
            MemoryCheck::Agree { score } => {
                println!("Score from memory: {score:.8}");
                println!("✓ File and memory APIs produce identical results");
            }
            MemoryCheck::Disagree { score } => {
                println!("Score from memory: {score:.8}");
                println!("⚠ File and memory APIs produce different results (unexpected)");
            }
            MemoryCheck::Failed { code, message, details } => {
                println!("❌ Memory API failed: {message}");
                println!("Error Code: {code}");
                println!();
                println!("=== DETAILED ERROR DIAGNOSTICS ===");
                println!("{details}");
            }
        }
    }

    Ok(())
}

fn report_failure(err: &anyhow::Error, json: bool) {
    let Some(engine_err) = err.downcast_ref::<ssim2_engine::Error>() else {
        eprintln!("Error: {err:#}");
        return;
    };

    let code = engine_err.code();
    if json {
        let report = FailureReport {
            version: version(),
            code: code.raw(),
            name: code.name(),
            message: code.message().to_string(),
            details: engine_err.details(),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: {e}"),
        }
        return;
    }

    eprintln!("❌ SSIMULACRA2 Error: {}", code.message());
    eprintln!("Error Code: {code}");
    if err.to_string() != engine_err.to_string() {
        eprintln!("{err:#}");
    }
    eprintln!();
    eprintln!("=== DETAILED ERROR DIAGNOSTICS ===");
    eprintln!("{}", engine_err.details());
}
