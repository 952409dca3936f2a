//! Merge subcommand - ingest many record files into a single one

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use recflow_core::{FilterChain, IngestConfig, RawDecoder, RecordSink, SharedProgress};

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file (`.gz` suffix enables gzip)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Stop after writing this many records
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Drop zero-length records
    #[arg(long)]
    pub skip_empty: bool,
}

fn filters(args: &MergeArgs) -> FilterChain<Vec<u8>> {
    let mut chain = FilterChain::new().max_items(args.max_records);
    if args.skip_empty {
        chain = chain.with("skip_empty", |r: Vec<u8>| (!r.is_empty()).then_some(r));
    }
    chain
}

pub fn run(args: MergeArgs, config: &IngestConfig, progress: &SharedProgress) -> Result<()> {
    let start = Instant::now();
    let mut stream = super::start(&args.inputs, RawDecoder, config)?;
    let mut sink = RecordSink::create(&args.output)?;
    let mut counter = progress.records("merge");

    let mut failure = None;
    {
        let records = stream
            .by_ref()
            .map_while(|r| r.map_err(|e| failure = Some(e)).ok());
        for record in filters(&args).apply(records) {
            sink.write(&record)?;
            counter.inc();
        }
    }
    // Stops workers still running after --max-records was reached
    stream.cancel_token().cancel();
    if let Some(e) = failure {
        return Err(e).context("Merge aborted, output not written");
    }

    counter.finish();
    let written = sink.finalize()?;
    log::info!("Wrote {written} records to {}", args.output.display());
    super::report("Merge", &stream, start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(max_records: Option<usize>, skip_empty: bool) -> MergeArgs {
        MergeArgs {
            inputs: vec![],
            output: PathBuf::from("out.tfrecord"),
            max_records,
            skip_empty,
        }
    }

    #[test]
    fn failed_merge_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tfrecord");
        recflow_core::write_records(&good, ["a", "b"]).unwrap();
        let output = dir.path().join("merged.tfrecord");
        let args = MergeArgs {
            inputs: vec![good, dir.path().join("missing.tfrecord")],
            output: output.clone(),
            max_records: None,
            skip_empty: false,
        };
        let config = IngestConfig {
            push_backoff: std::time::Duration::from_millis(1),
            poll_interval: std::time::Duration::from_millis(1),
            ..Default::default()
        };
        let progress = std::sync::Arc::new(recflow_core::ProgressContext::with_tty(false));

        assert!(run(args, &config, &progress).is_err());
        assert!(!output.exists());
        assert!(!dir.path().join("merged.tfrecord.tmp").exists());
    }

    #[test]
    fn skip_empty_and_limit() {
        let input = vec![b"a".to_vec(), vec![], b"b".to_vec(), b"c".to_vec()];
        let out: Vec<Vec<u8>> = filters(&args(Some(2), true)).apply(input.clone()).collect();
        assert_eq!(out, vec![b"a".to_vec(), b"b".to_vec()]);

        let all: Vec<Vec<u8>> = filters(&args(None, false)).apply(input.clone()).collect();
        assert_eq!(all, input);
    }
}
