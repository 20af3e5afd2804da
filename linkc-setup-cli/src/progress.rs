//! Terminal rendering of download progress

use indicatif::{ProgressBar, ProgressStyle};
use linkc_setup_core::DownloadEvent;
use std::cell::RefCell;

/// Turns download events into an indicatif bar
pub struct DownloadBar {
    enabled: bool,
    bar: RefCell<Option<ProgressBar>>,
}

impl DownloadBar {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: RefCell::new(None),
        }
    }

    pub fn handle(&self, event: &DownloadEvent) {
        if !self.enabled {
            return;
        }

        match event {
            DownloadEvent::Started { source, total, .. } => {
                let bar = match total {
                    Some(len) => {
                        let bar = ProgressBar::new(*len);
                        if let Ok(style) = ProgressStyle::default_bar().template(
                            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                        ) {
                            bar.set_style(style.progress_chars("#>-"));
                        }
                        bar
                    }
                    None => {
                        let bar = ProgressBar::new_spinner();
                        if let Ok(style) =
                            ProgressStyle::default_spinner().template("{spinner} {msg} {bytes}")
                        {
                            bar.set_style(style);
                        }
                        bar
                    }
                };
                bar.set_message(format!("⬇ {}", source));
                self.replace(Some(bar));
            }
            DownloadEvent::Progress { downloaded, .. } => {
                if let Some(bar) = self.bar.borrow().as_ref() {
                    bar.set_position(*downloaded);
                }
            }
            DownloadEvent::Finished { .. } | DownloadEvent::Failed { .. } => self.replace(None),
        }
    }

    fn replace(&self, next: Option<ProgressBar>) {
        if let Some(previous) = self.bar.replace(next) {
            previous.finish_and_clear();
        }
    }
}
