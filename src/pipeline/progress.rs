// file: src/pipeline/progress.rs
// description: per-stage progress bar and row counters
// reference: uses indicatif for progress bars

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageCounts {
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

pub struct StageProgress {
    bar: ProgressBar,
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl StageProgress {
    pub fn new(label: &str, total_rows: usize) -> Self {
        Self::with_target(label, total_rows, ProgressDrawTarget::stderr())
    }

    pub fn hidden(label: &str, total_rows: usize) -> Self {
        Self::with_target(label, total_rows, ProgressDrawTarget::hidden())
    }

    fn with_target(label: &str, total_rows: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_rows as u64), target);
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_prefix(label.to_string());

        Self {
            bar,
            succeeded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn set_message(&self, message: String) {
        self.bar.set_message(message);
    }

    pub fn counts(&self) -> StageCounts {
        StageCounts {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    pub fn finish(&self) {
        let counts = self.counts();
        self.bar.finish_with_message(format!(
            "ok: {} | skipped: {} | failed: {}",
            counts.succeeded, counts.skipped, counts.failed
        ));
    }

    fn advance(&self) {
        self.bar.inc(1);
        let counts = self.counts();
        self.bar
            .set_message(format!("failed: {}", counts.failed));
    }
}
