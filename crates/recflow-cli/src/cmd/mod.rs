//! Subcommands and the plumbing they share

pub mod count;
pub mod merge;
pub mod split;
pub mod vocab;

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use recflow_core::{CancelToken, Decoder, IngestConfig, RecordStream, ingest, resolve_sources};

/// Resolve inputs and start ingesting them; SIGINT/SIGTERM cancel the run
pub fn start<D: Decoder + 'static>(
    inputs: &[PathBuf],
    decoder: D,
    config: &IngestConfig,
) -> Result<RecordStream<D::Record>> {
    let sources = resolve_sources(inputs).context("Failed to resolve input files")?;
    let stream = ingest(&sources, decoder, config)?;
    cancel_on_signal(&stream.cancel_token())?;
    Ok(stream)
}

/// First signal cancels `token`; a second one exits immediately
pub fn cancel_on_signal(token: &CancelToken) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let flag = token.flag();
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(sig, 130, flag.clone())
            .context("Failed to register signal handler")?;
        signal_hook::flag::register(sig, flag.clone())
            .context("Failed to register signal handler")?;
    }
    Ok(())
}

/// Log per-source failures of a finished stream and print its summary
pub fn report<R>(title: &str, stream: &RecordStream<R>, elapsed: std::time::Duration) {
    for failure in stream.failures() {
        log::warn!("{}: {}", failure.source.display(), failure.reason);
    }
    let summary = stream.summary();
    summary.log();
    print_summary(
        title,
        &[
            (
                "Sources",
                format!(
                    "{}/{} ({} failed)",
                    summary.completed, summary.sources, summary.failed
                ),
            ),
            ("Records", recflow_core::fmt_num(summary.records)),
            ("Time", format!("{:.1}s", elapsed.as_secs_f64())),
        ],
    );
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
