use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use mosaic_core::pipeline::{ProgressReporter, StitchStage};

/// Progress reporter backed by an indicatif bar.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for ConsoleReporter {
    fn begin_stage(&self, stage: StitchStage, total_items: Option<usize>) {
        let bar = match total_items {
            Some(total) => ProgressBar::new(total as u64),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(stage.to_string());
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn advance(&self, items_done: usize) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            // Completion counts from parallel workers can arrive out of
            // order; never move the bar backwards.
            let pos = items_done as u64;
            if pos > bar.position() {
                bar.set_position(pos);
            }
        }
    }

    fn finish_stage(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish();
        }
    }
}
