use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

const TEMPLATE: &str = "{bar:40} {percent}% | ETA: {eta} | {pos}/{len} | {msg}";
const INITIAL_MESSAGE: &str = "Searching...";

/// Number of packages discovered and completed so far. Both only ever grow.
#[derive(Debug, Default)]
pub struct TaskCounters {
    discovered: AtomicU64,
    completed: AtomicU64,
}

impl TaskCounters {
    /// Count a newly discovered package and return the new total.
    pub fn discover(&self) -> u64 {
        self.discovered.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a completed package and return the new total.
    pub fn complete(&self) -> u64 {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Live progress of a run. Purely observational.
#[derive(Debug)]
pub struct ProgressReporter {
    counters: TaskCounters,
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Render progress on stderr.
    pub fn new() -> Self {
        ProgressReporter::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Count without rendering anything.
    pub fn hidden() -> Self {
        ProgressReporter::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(style);
        bar.set_message(INITIAL_MESSAGE);
        ProgressReporter { counters: TaskCounters::default(), bar }
    }

    /// A package was claimed and is about to be downloaded.
    pub fn discover(&self, name: &str) {
        let total = self.counters.discover();
        self.bar.set_length(total);
        self.bar.set_message(name.to_string());
    }

    /// A package and the submission of its dependencies are done.
    pub fn complete(&self) {
        let completed = self.counters.complete();
        self.bar.set_position(completed);
    }

    pub fn counters(&self) -> &TaskCounters {
        &self.counters
    }

    /// Stop rendering, leaving the final state on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }
}
