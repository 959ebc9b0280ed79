//! Run metrics.
//!
//! Every stage of a finder run (each event pattern set, then each pipeline
//! pass) records one [`PassMetrics`]. The CLI prints them through
//! `debug_report`; library callers read them off [`RunMetrics`].
//!
//! ## Design notes
//!
//! - `before`/`after` count event mentions, so a pass that only rewrites
//!   (retype, tense, location) shows equal counts.
//! - Metrics are always collected; timing one pass costs two `Instant::now`.

use std::time::{Duration, Instant};

// --- Metrics -----------------------------------------------------------------

/// Timing and event counts for one stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassMetrics {
    pub name: String,
    /// Elapsed time for the stage.
    pub duration: Duration,
    /// Event mentions in the set when the stage started.
    pub before: usize,
    /// Event mentions in the set when the stage finished.
    pub after: usize,
}

impl PassMetrics {
    pub fn removed(&self) -> usize {
        self.before.saturating_sub(self.after)
    }

    pub fn added(&self) -> usize {
        self.after.saturating_sub(self.before)
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// One entry per generation stage followed by one per pipeline pass.
    pub passes: Vec<PassMetrics>,
}

impl RunMetrics {
    pub fn pass(&self, name: &str) -> Option<&PassMetrics> {
        self.passes.iter().find(|p| p.name == name)
    }
}

/// Starts timing a stage; [`PassTimer::finish`] produces its metrics.
pub(crate) struct PassTimer {
    name: String,
    start: Instant,
    before: usize,
}

impl PassTimer {
    pub(crate) fn start(name: impl Into<String>, before: usize) -> Self {
        Self { name: name.into(), start: Instant::now(), before }
    }

    pub(crate) fn finish(self, after: usize) -> PassMetrics {
        PassMetrics { name: self.name, duration: self.start.elapsed(), before: self.before, after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_added_and_removed() {
        let m = PassTimer::start("dedup", 5).finish(3);
        assert_eq!(m.name, "dedup");
        assert_eq!((m.removed(), m.added()), (2, 0));
        let run = RunMetrics { total: Duration::ZERO, passes: vec![m] };
        assert!(run.pass("dedup").is_some());
        assert!(run.pass("block").is_none());
    }
}
