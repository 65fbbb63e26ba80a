use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use engine::{run_script, ExecutionReport, FixedDurationProbe, PipelineConfig, ReprocessPipeline};
use script::{parse_commands, parse_scene_blocks, timecode, SceneBlock};
use timeline::{SegmentManager, SegmentState, VideoSegment};

#[derive(Parser)]
#[command(name = "scriptcut", version, about = "Text-driven video timeline editing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a script and apply it against a source of the given duration.
    Apply {
        script: PathBuf,
        /// Source media duration in seconds (the engine never probes media
        /// itself).
        #[arg(long)]
        duration: f64,
        #[arg(long)]
        json: bool,
    },
    /// Print the scene blocks extracted from a script.
    Blocks {
        script: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Report command lines that fail field validation.
    Check { script: PathBuf },
    /// Re-apply the script through the debounced pipeline whenever the file
    /// changes.
    Watch {
        script: PathBuf,
        #[arg(long)]
        duration: f64,
        /// Debounce quiet window in milliseconds.
        #[arg(long, default_value_t = 250)]
        quiet_ms: u64,
    },
}

#[derive(Serialize)]
struct ApplyOutput<'a> {
    segments: &'a [VideoSegment],
    blocks: &'a [SceneBlock],
    report: &'a ExecutionReport,
}

fn main() -> Result<ExitCode> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Command::Apply { script, duration, json } => cmd_apply(&script, duration, json),
        Command::Blocks { script, json } => cmd_blocks(&script, json),
        Command::Check { script } => cmd_check(&script),
        Command::Watch { script, duration, quiet_ms } => cmd_watch(&script, duration, quiet_ms),
    }
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn cmd_apply(path: &Path, duration: f64, json: bool) -> Result<ExitCode> {
    let text = read_script(path)?;
    let mut manager = SegmentManager::new();
    let (blocks, report) = run_script(&mut manager, &text, FixedDurationProbe(duration));

    if json {
        let output = ApplyOutput { segments: manager.segments(), blocks: &blocks, report: &report };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_partition(&manager);
        if !blocks.is_empty() {
            println!();
            print_blocks(&blocks);
        }
        println!();
        print_report(&report);
    }

    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_blocks(path: &Path, json: bool) -> Result<ExitCode> {
    let text = read_script(path)?;
    let blocks = parse_scene_blocks(&text);
    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else {
        print_blocks(&blocks);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(path: &Path) -> Result<ExitCode> {
    let text = read_script(path)?;
    let (commands, errors) = parse_commands(&text);
    println!("{} command(s), {} error(s)", commands.len(), errors.len());
    for error in &errors {
        println!("{error}");
    }
    Ok(if errors.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_watch(path: &Path, duration: f64, quiet_ms: u64) -> Result<ExitCode> {
    let pipeline = ReprocessPipeline::start(
        std::sync::Arc::new(FixedDurationProbe(duration)),
        PipelineConfig { quiet_window: Duration::from_millis(quiet_ms) },
    );

    let mut last = read_script(path)?;
    let generation = pipeline.submit(last.clone());
    tracing::info!(generation, "initial snapshot submitted");

    loop {
        // Poll for file changes; the pipeline handles debouncing and
        // supersession of in-flight runs.
        if let Ok(text) = std::fs::read_to_string(path) {
            if text != last {
                last = text.clone();
                let generation = pipeline.submit(text);
                tracing::info!(generation, "change submitted");
            }
        }
        while let Ok(outcome) = pipeline.outcomes().try_recv() {
            println!(
                "generation {}: {} segment(s), {} ok, {} failed, {} parse error(s)",
                outcome.generation,
                outcome.segments.len(),
                outcome.report.succeeded(),
                outcome.report.failed(),
                outcome.report.parse_errors.len(),
            );
            for line in outcome.report.error_lines() {
                println!("  {line}");
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn print_partition(manager: &SegmentManager) {
    match manager.video_path() {
        Some(path) => println!(
            "{} ({}) — {} segment(s)",
            path,
            timecode::format_timestamp(manager.media_duration()),
            manager.segments().len()
        ),
        None => {
            println!("no media loaded");
            return;
        }
    }
    for (i, seg) in manager.segments().iter().enumerate() {
        let state = match seg.state {
            SegmentState::Stopped => "stopped",
            SegmentState::Playing => "playing",
            SegmentState::Hidden => "hidden",
        };
        println!(
            "  {:>3}  {} .. {}  {:>7}  x{:<5.3}  {}{}",
            i + 1,
            timecode::format_timestamp(seg.start),
            timecode::format_timestamp(seg.end),
            state,
            seg.speed,
            if seg.visible { "" } else { "(invisible) " },
            seg.title.as_deref().unwrap_or("-"),
        );
    }
}

fn print_blocks(blocks: &[SceneBlock]) {
    println!("{} scene block(s)", blocks.len());
    for block in blocks {
        println!(
            "  [{}] line {}: {}",
            timecode::format_range(block.start as u32, block.end as u32),
            block.line,
            block.title.as_deref().unwrap_or("-"),
        );
    }
}

fn print_report(report: &ExecutionReport) {
    println!(
        "{} command(s) applied, {} failed, {} parse error(s)",
        report.succeeded(),
        report.failed(),
        report.parse_errors.len()
    );
    for line in report.error_lines() {
        println!("  {line}");
    }
}
