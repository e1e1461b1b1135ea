// src/progress.rs
// =============================================================================
// Progress reporting.
//
// The crawler calls ProgressSink::update(completed, total_known) every time a
// URL settles. total_known only grows as links are discovered, so the bar
// stretches while it fills.
// =============================================================================

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub trait ProgressSink: Send + Sync {
    fn update(&self, completed: usize, total_known: usize);
    fn finish(&self) {}
}

/// Used with --quiet
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _completed: usize, _total_known: usize) {}
}

/// An indicatif bar drawn on stderr, so stdout stays clean for JSON
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(1), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "Scraping progress {bar:40.cyan/blue} {pos}/{len} pages [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn update(&self, completed: usize, total_known: usize) {
        self.bar.set_length(total_known.max(completed) as u64);
        self.bar.set_position(completed as u64);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
