//! Vocab subcommand - distinct whitespace-separated tokens of text records

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use recflow_core::{IngestConfig, ScopedTimer, SharedProgress, Utf8Decoder};
use rustc_hash::FxHashSet;

#[derive(Args, Debug)]
pub struct VocabArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file, one token per line (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Sorted distinct tokens
fn sorted_vocab(tokens: FxHashSet<String>) -> Vec<String> {
    let mut vocab: Vec<String> = tokens.into_iter().collect();
    vocab.sort_unstable();
    vocab
}

fn add_tokens(tokens: &mut FxHashSet<String>, text: &str) {
    for token in text.split_whitespace() {
        if !tokens.contains(token) {
            tokens.insert(token.to_string());
        }
    }
}

pub fn run(args: VocabArgs, config: &IngestConfig, progress: &SharedProgress) -> Result<()> {
    let start = Instant::now();
    let mut timer = ScopedTimer::new("Build vocabulary");
    let mut stream = super::start(&args.inputs, Utf8Decoder, config)?;

    let mut tokens = FxHashSet::default();
    let mut counter = progress.records("vocab");
    for record in stream.by_ref() {
        add_tokens(&mut tokens, &record?);
        counter.inc();
    }
    timer.set_iterations(counter.finish());
    drop(timer);

    let vocab = sorted_vocab(tokens);
    log::info!("Vocabulary size: {}", recflow_core::fmt_num(vocab.len()));

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_vocab(BufWriter::new(file), &vocab)?;
        }
        None => write_vocab(std::io::stdout().lock(), &vocab)?,
    }

    super::report("Vocab", &stream, start.elapsed());
    Ok(())
}

fn write_vocab(mut out: impl Write, vocab: &[String]) -> Result<()> {
    for token in vocab {
        writeln!(out, "{token}")?;
    }
    out.flush()?;
    Ok(())
}
