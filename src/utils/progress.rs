use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Spinner that walks a command through its stages. Quiet mode only logs.
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
    stage: AtomicUsize,
}

impl ProgressReporter {
    pub fn new_spinner(message: &str, quiet: bool) -> Self {
        let spinner = (!quiet).then(|| {
            let style = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let spinner = ProgressBar::new_spinner().with_style(style);
            spinner.set_message(message.to_string());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });

        Self {
            spinner,
            stage: AtomicUsize::new(0),
        }
    }

    /// Move to the next stage; the spinner prefix counts stages
    pub fn set_message(&self, message: &str) {
        let stage = self.stage.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(stage, "{}", message);
        if let Some(spinner) = &self.spinner {
            spinner.set_prefix(format!("{}.", stage));
            spinner.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_prefix("");
            spinner.finish_with_message(message.to_string());
        }
    }

    pub fn stages(&self) -> usize {
        self.stage.load(Ordering::Relaxed)
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.as_ref().filter(|s| !s.is_finished()) {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_reporter_counts_stages() {
        let progress = ProgressReporter::new_spinner("working", true);
        progress.set_message("reading");
        progress.set_message("writing");
        progress.finish_with_message("done");
        assert_eq!(progress.stages(), 2);
    }
}
