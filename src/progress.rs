//! Progress display for a running download.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Whether the byte counter should be drawn.
///
/// Only on an interactive stderr, and never alongside `--quiet` or `--json`.
pub(crate) fn should_show_progress(stderr_is_terminal: bool, quiet: bool, json: bool) -> bool {
    stderr_is_terminal && !quiet && !json
}

/// Spinner with a running byte count; a no-op when hidden.
pub(crate) struct ByteCounter {
    bar: Option<ProgressBar>,
}

impl ByteCounter {
    pub(crate) fn new(visible: bool, label: &str) -> Self {
        if !visible {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} {bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub(crate) fn set(&self, bytes_on_disk: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(bytes_on_disk);
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
