//! clockface-bench: CLI tool for threshold tuning and per-stage diagnostics.
//!
//! Runs the clock-reading pipeline on an image file with configurable
//! parameters, printing the reading and detailed per-stage diagnostics.
//! Useful for:
//!
//! - Tuning Canny, line and circle thresholds for a new image domain
//! - Measuring per-stage durations to identify bottlenecks
//! - Seeing whether the face was detected and how many segments were found
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin clockface-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use clockface_pipeline::PipelineConfig;
use clockface_pipeline::diagnostics::{Clock, PipelineDiagnostics};

/// Threshold experimentation and diagnostics for clockface.
///
/// Runs the pipeline on a given image with configurable parameters and
/// prints the reading plus per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "clockface-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP, GIF).
    image_path: PathBuf,

    /// White margin added around the image before circle detection.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANVAS_MARGIN)]
    canvas_margin: u32,

    /// Gaussian kernel side (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel_size: u32,

    /// CLAHE clip limit.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_CLIP_LIMIT)]
    clahe_clip_limit: f32,

    /// Adaptive threshold block size (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_BLOCK_SIZE)]
    threshold_block_size: u32,

    /// Canny low threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Votes needed before a line is walked.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LINE_VOTE_THRESHOLD)]
    line_votes: u32,

    /// Minimum segment extent in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: u32,

    /// Largest gap bridged inside a segment.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: u32,

    /// Circle accumulator threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CIRCLE_ACCUMULATOR_THRESHOLD)]
    circle_votes: u32,

    /// Smallest face radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CIRCLE_MIN_RADIUS)]
    circle_min_radius: u32,

    /// Largest face radius in pixels (0 = no cap).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CIRCLE_MAX_RADIUS)]
    circle_max_radius: u32,

    /// Rounding rule for minutes.
    #[arg(long, value_enum, default_value_t = Rounding::HalfAwayFromZero)]
    rounding: Rounding,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

/// Minute rounding selection.
#[derive(Clone, Copy, ValueEnum)]
enum Rounding {
    /// `x.5` rounds up.
    HalfAwayFromZero,
    /// `x.5` rounds to the even minute.
    HalfToEven,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        canvas_margin: cli.canvas_margin,
        blur_kernel_size: cli.blur_kernel_size,
        clahe_clip_limit: cli.clahe_clip_limit,
        threshold_block_size: cli.threshold_block_size,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
        line_vote_threshold: cli.line_votes,
        min_line_length: cli.min_line_length,
        max_line_gap: cli.max_line_gap,
        circle_accumulator_threshold: cli.circle_votes,
        circle_min_radius: cli.circle_min_radius,
        circle_max_radius: cli.circle_max_radius,
        minute_rounding: match cli.rounding {
            Rounding::HalfAwayFromZero => clockface_pipeline::MinuteRounding::HalfAwayFromZero,
            Rounding::HalfToEven => clockface_pipeline::MinuteRounding::HalfToEven,
        },
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let gray = match clockface_pipeline::grayscale::decode_and_grayscale(&image_bytes) {
        Ok(gray) => gray,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        gray.width(),
        gray.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match clockface_pipeline::diagnostics::estimate_with_diagnostics(&gray, &config, &StdClock)
        {
            Ok((estimate, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if run == 0 {
                    eprintln!("Estimate: {estimate}");
                    for (i, segment) in estimate.segments.iter().take(5).enumerate() {
                        eprintln!(
                            "  segment {i}: ({:.0}, {:.0}) -> ({:.0}, {:.0}) len={:.1}",
                            segment.start().x,
                            segment.start().y,
                            segment.end().x,
                            segment.end().y,
                            segment.length(),
                        );
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Contrast", |d| d.contrast.duration),
        ("Hand Edges", |d| d.hand_edges.duration),
        ("Line Detection", |d| d.line_detection.duration),
        ("Face", |d| d.face.duration),
        ("Reading", |d| d.reading.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
