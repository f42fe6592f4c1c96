use indicatif::{ProgressBar, ProgressStyle};

use mvdecon::IterationStatistics;

/// Progress bar over deconvolution iterations
pub (super) struct Progress(ProgressBar);

impl Progress {

    pub (super) fn new(iterations: usize) -> Self {
        let bar = ProgressBar::new(iterations as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("Iterations: {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")
        {
            bar.set_style(style);
        }
        bar.tick();
        Self(bar)
    }

    pub (super) fn iteration_done(&self, _iteration: usize, stats: &IterationStatistics) {
        self.0.set_message(format!("sum of changes {:.4e}, max change {:.4e}", stats.sum_change, stats.max_change));
        self.0.inc(1);
    }

    pub (super) fn finish(&self) { self.0.finish() }
}
