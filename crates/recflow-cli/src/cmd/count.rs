//! Count subcommand - number of records across input files

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use recflow_core::{IngestConfig, RawDecoder, SharedProgress};

#[derive(Args, Debug)]
pub struct CountArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

pub fn run(args: CountArgs, config: &IngestConfig, progress: &SharedProgress) -> Result<()> {
    let start = Instant::now();
    let mut stream = super::start(&args.inputs, RawDecoder, config)?;

    let mut counter = progress.records("count");
    for record in stream.by_ref() {
        record?;
        counter.inc();
    }
    let total = counter.finish();

    super::report("Count", &stream, start.elapsed());
    println!("{total}");
    Ok(())
}
