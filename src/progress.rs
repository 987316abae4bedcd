//! Progress reporting: byte-based progress bar over the input file.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}"
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if let Some(msg) = label {
        pb.set_message(msg.to_string());
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// On-disk size of the input; compressed inputs report compressed bytes.
pub fn input_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// A small wrapper around an optional `indicatif` bar.
/// Hands out clones of the bar to readers and finalizes it with a message.
pub struct ProgressScope {
    pb: Option<ProgressBar>,
}

impl ProgressScope {
    pub fn bytes<T: Into<String>>(label: T, total_bytes: u64) -> Self {
        let pb = make_progress_bar_labeled(total_bytes, Some(&label.into()));
        Self { pb: Some(pb) }
    }
    pub fn disabled() -> Self {
        Self { pb: None }
    }
    pub fn bar(&self) -> Option<ProgressBar> {
        self.pb.clone()
    }
    pub fn finish<T: Into<String>>(&self, msg: T) {
        if let Some(pb) = &self.pb {
            pb.finish_with_message(msg.into());
        }
    }
    pub fn abandon<T: Into<String>>(&self, msg: T) {
        if let Some(pb) = &self.pb {
            pb.abandon_with_message(msg.into());
        }
    }
}
