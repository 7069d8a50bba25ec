//! # CLI Module
//!
//! Command-line interface for the batch converter.
//!
//! ## Usage
//! ```bash
//! # Convert a photo tree into ./processed
//! photo-mill convert ~/Photos ~/Photos-processed
//!
//! # Cap the pool and tighten the memory watermarks
//! photo-mill convert ~/Photos ./out --workers 4 --low-watermark 20 --high-watermark 50
//!
//! # Skip RAW files entirely
//! photo-mill convert ~/Photos ./out --no-raw
//!
//! # JSON report on stdout
//! photo-mill convert ~/Photos ./out --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_mill::core::pipeline::{ConversionRun, RunResult};
use photo_mill::core::RunConfig;
use photo_mill::error::Result;
use photo_mill::events::{self, BudgetEvent, DiscoverEvent, Event, JobEvent, RunEvent};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// photo-mill - batch-convert photo trees without melting the machine
#[derive(Parser, Debug)]
#[command(name = "photo-mill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert and resize every image under a directory tree
    Convert {
        /// Directory to read images from
        input: PathBuf,

        /// Directory to write converted images into
        output: PathBuf,

        /// Longest output side in pixels
        #[arg(long, default_value = "3000")]
        max_side: u32,

        /// JPEG quality (1-100; photographic floor of 85 applies)
        #[arg(short, long, default_value = "95")]
        quality: u8,

        /// Worker-count ceiling override
        #[arg(short, long)]
        workers: Option<usize>,

        /// Concurrent-RAW-decode ceiling override
        #[arg(long)]
        raw_workers: Option<usize>,

        /// Soft per-job timeout in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,

        /// Shrink concurrency below this percent of memory free
        #[arg(long, default_value = "15")]
        low_watermark: u8,

        /// Grow concurrency above this percent of memory free
        #[arg(long, default_value = "40")]
        high_watermark: u8,

        /// Leave RAW files untouched
        #[arg(long)]
        no_raw: bool,

        /// Include hidden files and directories
        #[arg(long)]
        include_hidden: bool,

        /// Output format for the run summary
        #[arg(long, default_value = "pretty")]
        output_format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON report for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    photo_mill::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            max_side,
            quality,
            workers,
            raw_workers,
            timeout,
            low_watermark,
            high_watermark,
            no_raw,
            include_hidden,
            output_format,
        } => {
            let mut config = RunConfig::new(input, output);
            config.max_side = max_side;
            config.jpeg_quality = quality;
            config.max_workers = workers;
            config.max_raw_concurrent = raw_workers;
            config.job_timeout = Duration::from_secs(timeout);
            config.low_watermark_pct = low_watermark;
            config.high_watermark_pct = high_watermark;
            config.process_raw = !no_raw;
            config.include_hidden = include_hidden;

            run_convert(config, output_format)
        }
    }
}

fn run_convert(config: RunConfig, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("photo-mill").bold().cyan(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let (sender, receiver) = events::channel();

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let pb = match progress_clone {
                Some(ref pb) => pb,
                None => continue,
            };
            match event {
                Event::Run(RunEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Discover(DiscoverEvent::Completed { pending, .. }) => {
                    pb.set_length(pending as u64);
                }
                Event::Job(JobEvent::Finished { .. }) => {
                    pb.inc(1);
                }
                Event::Budget(BudgetEvent::Shrunk {
                    max_workers,
                    max_raw_concurrent,
                    ..
                }) => {
                    pb.set_message(format!(
                        "memory pressure: workers={} raw={}",
                        max_workers, max_raw_concurrent
                    ));
                }
                Event::Budget(BudgetEvent::Grown {
                    max_workers,
                    max_raw_concurrent,
                    ..
                }) => {
                    pb.set_message(format!(
                        "recovered: workers={} raw={}",
                        max_workers, max_raw_concurrent
                    ));
                }
                Event::Run(RunEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = ConversionRun::builder(config)
        .build()
        .execute_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let result = result?;

    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result),
        OutputFormat::Json => print_json_results(&result)?,
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &RunResult) {
    let summary = &result.report.summary;

    term.write_line("").ok();
    term.write_line(&format!("{} Run Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files seen, {} jobs",
        style(result.stats.files_seen).cyan(),
        style(summary.total).cyan()
    ))
    .ok();

    term.write_line(&format!(
        "  {} converted in {:.1}s",
        style(summary.succeeded).green(),
        result.report.duration_ms as f64 / 1000.0
    ))
    .ok();

    if summary.failed > 0 {
        term.write_line(&format!("  {} failed", style(summary.failed).red()))
            .ok();
    }

    if summary.skipped() > 0 {
        term.write_line(&format!(
            "  {} skipped ({} duplicates, {} already processed)",
            style(summary.skipped()).yellow(),
            summary.skipped_duplicate,
            summary.skipped_existing
        ))
        .ok();
    }

    if result.stats.system_files_skipped > 0 {
        term.write_line(&format!(
            "  {} system files ignored",
            style(result.stats.system_files_skipped).dim()
        ))
        .ok();
    }

    term.write_line("").ok();

    let report_display = shorten_home(&result.report_path);
    term.write_line(&format!(
        "{}",
        style(format!("Full report: {}", report_display)).dim()
    ))
    .ok();
}

fn print_json_results(result: &RunResult) -> Result<()> {
    println!("{}", result.report.to_json()?);
    Ok(())
}

/// Render paths under the home directory as ~/...
fn shorten_home(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
