//! recflow - parallel ingestion of TFRecord-framed files
//!
//! Counts, merges, splits and builds vocabularies over many record files,
//! reading them concurrently through a bounded shared queue.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recflow_core::FailurePolicy;

mod cmd;
mod config;

use config::{Config, IngestOverrides};

#[derive(Parser)]
#[command(name = "recflow")]
#[command(about = "Parallel ingestion of TFRecord-framed files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./recflow.toml or ~/.config/recflow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of parallel file workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Records per queue push
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Shared queue capacity in records
    #[arg(long, global = true)]
    queue_capacity: Option<usize>,

    /// Milliseconds a worker waits before retrying a full queue
    #[arg(long, global = true)]
    backoff_ms: Option<u64>,

    /// What a failing source does to the run (fail-fast, tolerate)
    #[arg(long, global = true)]
    policy: Option<FailurePolicy>,

    /// Skip CRC verification of record frames
    #[arg(long, global = true)]
    no_verify: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Count records across input files
    Count(cmd::count::CountArgs),
    /// Merge input files into one record file
    Merge(cmd::merge::MergeArgs),
    /// Split input files into N shards
    Split(cmd::split::SplitArgs),
    /// Build the token vocabulary of text records
    Vocab(cmd::vocab::VocabArgs),
    /// Show current configuration
    Config,
}

impl Cli {
    fn overrides(&self) -> IngestOverrides {
        IngestOverrides {
            workers: self.workers,
            batch_size: self.batch_size,
            queue_capacity: self.queue_capacity,
            backoff_ms: self.backoff_ms,
            policy: self.policy,
            no_verify: self.no_verify,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(recflow_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, spinners show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    recflow_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    let ingest = config.ingest_config(&cli.overrides());

    match cli.command {
        Command::Count(args) => cmd::count::run(args, &ingest, &progress),
        Command::Merge(args) => cmd::merge::run(args, &ingest, &progress),
        Command::Split(args) => {
            cmd::split::run(args, &config.output, ingest.verify_checksums, &progress)
        }
        Command::Vocab(args) => cmd::vocab::run(args, &ingest, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Workers", &ingest.workers.to_string()]);
            table.add_row(vec!["Batch size", &ingest.batch_size.to_string()]);
            table.add_row(vec![
                "Queue capacity",
                &recflow_core::fmt_num(ingest.queue_capacity),
            ]);
            table.add_row(vec![
                "Push backoff",
                &format!("{}ms", ingest.push_backoff.as_millis()),
            ]);
            table.add_row(vec![
                "Poll interval",
                &format!("{}ms", ingest.poll_interval.as_millis()),
            ]);
            table.add_row(vec!["Failure policy", &ingest.failure_policy.to_string()]);
            table.add_row(vec![
                "Verify checksums",
                if ingest.verify_checksums { "yes" } else { "no" },
            ]);
            table.add_row(vec!["Shards", &config.output.shards.to_string()]);
            table.add_row(vec!["Shard prefix", &config.output.prefix]);
            table.add_row(vec![
                "Shard compression",
                match config.output.compression {
                    recflow_core::Compression::None => "none",
                    recflow_core::Compression::Gzip => "gzip",
                },
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
