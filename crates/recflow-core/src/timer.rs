//! Wall-clock timing of a scope, logged on drop

use std::time::Instant;

/// Logs `name: Xs` (or `name: Xs, Ys per iteration`) when dropped.
///
/// ```ignore
/// let _t = ScopedTimer::new("Build vocabulary");
/// ```
pub struct ScopedTimer {
    name: String,
    iterations: usize,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_iterations(name, 1)
    }

    pub fn with_iterations(name: impl Into<String>, iterations: usize) -> Self {
        Self {
            name: name.into(),
            iterations,
            start: Instant::now(),
        }
    }

    /// Update the iteration count once it is known (e.g. records processed)
    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    pub fn message(&self) -> String {
        let secs = self.start.elapsed().as_secs_f64();
        if self.iterations > 1 {
            format!(
                "{}: {secs:.6}s, {:.6}s per iteration",
                self.name,
                secs / self.iterations as f64
            )
        } else {
            format!("{}: {secs:.6}s", self.name)
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!("{}", self.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_iteration_message() {
        let t = ScopedTimer::new("Add one");
        let msg = t.message();
        assert!(msg.starts_with("Add one: "));
        assert!(!msg.contains("per iteration"));
    }

    #[test]
    fn per_iteration_message() {
        let mut t = ScopedTimer::new("Loop");
        t.set_iterations(10);
        assert!(t.message().contains("per iteration"));
    }
}
