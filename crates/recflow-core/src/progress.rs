//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: a spinner line per command stage.
//! Non-TTY mode: a log line every [`LOG_INTERVAL`] records.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Records between progress log lines in non-TTY mode
pub const LOG_INTERVAL: usize = 1000;

/// Central progress context owning the `MultiProgress`
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    pub fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner status line for a stage; hidden outside a TTY
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Record counter for a stage
    pub fn records(&self, name: &str) -> RecordProgress {
        RecordProgress {
            name: name.to_string(),
            pb: self.stage_line(name),
            log_lines: !self.is_tty,
            count: 0,
            start: Instant::now(),
        }
    }

    /// Print a line above managed progress bars (avoids interference).
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Counts records flowing through a stage
pub struct RecordProgress {
    name: String,
    pb: ProgressBar,
    log_lines: bool,
    count: usize,
    start: Instant,
}

impl RecordProgress {
    pub fn inc(&mut self) {
        self.count += 1;
        if self.count % LOG_INTERVAL == 0 {
            if self.log_lines {
                log::info!("{}: {} records", self.name, fmt_num(self.count));
            } else {
                self.pb.set_message(format!("{} records", fmt_num(self.count)));
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Stop the spinner and log the final count with throughput
    pub fn finish(self) -> usize {
        self.pb.finish_and_clear();
        let secs = self.start.elapsed().as_secs_f64();
        if self.count > 0 && secs > 0.0 {
            log::info!(
                "{}: {} records ({:.0} records/sec)",
                self.name,
                fmt_num(self.count),
                self.count as f64 / secs
            );
        } else {
            log::info!("{}: {} records", self.name, fmt_num(self.count));
        }
        self.count
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
