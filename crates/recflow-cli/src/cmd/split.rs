//! Split subcommand - partition records into N shard files

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use recflow_core::{
    CancelToken, Compression, FileRecords, SharedProgress, ShardWriter, resolve_sources,
};

use crate::config::OutputConfig;

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for the shard files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of shards [default: 10]
    #[arg(short = 'n', long)]
    pub shards: Option<usize>,

    /// Shard file name prefix [default: dataset]
    #[arg(long)]
    pub prefix: Option<String>,

    /// Gzip the shard files
    #[arg(long)]
    pub gzip: bool,
}

/// Records are read one source at a time in sorted order, so record `i`
/// always lands in shard `i % n` and reruns produce identical shards.
pub fn run(
    args: SplitArgs,
    output: &OutputConfig,
    verify: bool,
    progress: &SharedProgress,
) -> Result<()> {
    let start = Instant::now();
    let shards = args.shards.unwrap_or(output.shards);
    let prefix = args.prefix.as_deref().unwrap_or(&output.prefix);
    let compression = if args.gzip {
        Compression::Gzip
    } else {
        output.compression
    };

    let sources = resolve_sources(&args.inputs).context("Failed to resolve input files")?;
    let cancel = CancelToken::new();
    super::cancel_on_signal(&cancel)?;

    log::info!(
        "Splitting {} sources into {shards} shards under {}",
        sources.len(),
        args.output.display()
    );
    let mut writer = ShardWriter::create(&args.output, prefix, shards, compression)?;
    let mut counter = progress.records("split");
    for source in &sources {
        copy_source(source, &mut writer, verify, &cancel, &mut |_| counter.inc())?;
    }
    counter.finish();

    let counts = writer.finalize()?;
    super::print_summary(
        "Split",
        &[
            ("Sources", sources.len().to_string()),
            ("Shards", shards.to_string()),
            (
                "Records",
                recflow_core::fmt_num(counts.iter().sum::<usize>()),
            ),
            ("Time", format!("{:.1}s", start.elapsed().as_secs_f64())),
        ],
    );
    Ok(())
}

fn copy_source(
    source: &Path,
    writer: &mut ShardWriter,
    verify: bool,
    cancel: &CancelToken,
    on_record: &mut dyn FnMut(&[u8]),
) -> Result<()> {
    let records = FileRecords::open(source, verify)
        .with_context(|| format!("Failed to open {}", source.display()))?;
    for record in records {
        if cancel.is_cancelled() {
            anyhow::bail!("Interrupted");
        }
        let record = record
            .map_err(|(index, e)| anyhow!("{}: record {index}: {e}", source.display()))?;
        writer.write(&record)?;
        on_record(&record);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recflow_core::write_records;

    #[test]
    fn copy_source_round_robins_across_sources() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tfrecord");
        let b = dir.path().join("b.tfrecord");
        write_records(&a, ["a0", "a1", "a2"]).unwrap();
        write_records(&b, ["b0", "b1"]).unwrap();

        let out = dir.path().join("out");
        let mut writer = ShardWriter::create(&out, "dataset", 2, Compression::None).unwrap();
        let cancel = CancelToken::new();
        let mut seen = 0;
        for source in [&a, &b] {
            copy_source(source, &mut writer, true, &cancel, &mut |_| seen += 1).unwrap();
        }
        assert_eq!(seen, 5);
        assert_eq!(writer.finalize().unwrap(), vec![3, 2]);

        let shard0: Vec<Vec<u8>> = FileRecords::open(out.join("dataset-0.tfrecord"), true)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(shard0, vec![b"a0".to_vec(), b"a2".to_vec(), b"b1".to_vec()]);
    }

    #[test]
    fn cancelled_copy_stops() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tfrecord");
        write_records(&a, ["x"]).unwrap();
        let mut writer =
            ShardWriter::create(&dir.path().join("out"), "d", 1, Compression::None).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(copy_source(&a, &mut writer, true, &cancel, &mut |_| {}).is_err());
    }
}
