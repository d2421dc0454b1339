//! # Terminal Progress Display Module
//!
//! Questo modulo gestisce il rendering del progresso nel terminale.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Barra aggregata del task (file completati / totali)
//! - Barre byte-progress per gli upload
//! - Rendering delle righe di log con prefisso per severità
//! - Spinner per operazioni indeterminate
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========>-------------] 3/8 (37%) 手写/a.mp4 · 52%
//! ```

use crate::events::{classify_line, LogSeverity};
use crate::progress::JobState;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages the aggregate progress bar for one watched task
#[derive(Clone)]
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    /// Create the aggregate bar for a task with a known file count
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Sync the bar with a reduced state snapshot
    pub fn render(&self, state: &JobState) {
        self.bar.set_length(state.total.max(1) as u64);
        self.bar.set_position(state.finished_count() as u64);

        let message = match (&state.current_file, state.current_percent()) {
            (Some(file), Some(pct)) => format!("{} · {}%", file, pct),
            (Some(file), None) => file.clone(),
            (None, _) => String::new(),
        };
        self.bar.set_message(message);
    }

    /// Print a processor log line above the bar, with a severity prefix
    pub fn log_line(&self, line: &str) {
        let prefix = match classify_line(line) {
            LogSeverity::Error => "❌",
            LogSeverity::Success => "✅",
            LogSeverity::Progress => "▸",
            LogSeverity::Info => "·",
        };
        self.bar.println(format!("  {} {}", prefix, line));
    }

    /// Print an informational line above the bar
    pub fn println(&self, message: &str) {
        self.bar.println(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Clear the bar without a summary (cancelled / aborted)
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }

    /// Byte-progress bar for a single file upload
    pub fn upload_bar(total_bytes: u64, label: &str) -> ProgressBar {
        let bar = ProgressBar::new(total_bytes);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%)")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar.set_message(label.to_string());

        bar
    }
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
