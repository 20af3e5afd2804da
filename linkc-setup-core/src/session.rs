//! Everything a command needs to talk to the outside world

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cancel::Cancellation;
use crate::download::{DownloadEvent, DownloadOutcome, Downloader, ExistingFile, Transport};
use crate::mirrors::MirrorList;
use crate::platform::{self, Arch, Platform};
use crate::process::CommandRunner;
use crate::prompt::Prompt;
use crate::report::{format_size, Reporter};

/// Host facts plus the I/O seams shared by all commands
pub struct Session<'a> {
    pub platform: Platform,
    pub arch: Arch,
    pub elevated: bool,
    pub reporter: Reporter,
    pub cancel: Cancellation,
    pub prompt: &'a dyn Prompt,
    pub runner: &'a dyn CommandRunner,
    pub transport: &'a dyn Transport,
    progress: Option<&'a dyn Fn(&DownloadEvent)>,
    downloads_override: Option<PathBuf>,
}

impl<'a> Session<'a> {
    /// Session for the current host
    pub fn new(
        platform: Platform,
        reporter: Reporter,
        cancel: Cancellation,
        prompt: &'a dyn Prompt,
        runner: &'a dyn CommandRunner,
        transport: &'a dyn Transport,
    ) -> Self {
        Self {
            platform,
            arch: Arch::detect(),
            elevated: platform::is_elevated(),
            reporter,
            cancel,
            prompt,
            runner,
            transport,
            progress: None,
            downloads_override: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn Fn(&DownloadEvent)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Use `dir` instead of the user's download directory
    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_override = Some(dir.into());
        self
    }

    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    /// Where downloaded installers and archives are kept
    pub fn downloads_dir(&self) -> Result<PathBuf> {
        match &self.downloads_override {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create download directory: {}", dir.display())
                })?;
                Ok(dir.clone())
            }
            None => platform::downloads_dir(),
        }
    }

    pub fn downloader(&self) -> Downloader<'_> {
        let downloader = Downloader::new(self.transport, &self.cancel);
        match self.progress {
            Some(progress) => downloader.with_progress(progress),
            None => downloader,
        }
    }

    /// Runs the mirror-fallback download and reports how it went
    pub fn download(
        &self,
        what: &str,
        mirrors: &MirrorList,
        dest: &Path,
        existing: ExistingFile,
    ) -> Result<DownloadOutcome> {
        let outcome = self.downloader().fetch(mirrors, dest, existing)?;
        self.report_download(what, &outcome);
        Ok(outcome)
    }

    fn report_download(&self, what: &str, outcome: &DownloadOutcome) {
        let reporter = &self.reporter;
        for attempt in outcome.attempts() {
            if let Some(error) = &attempt.error {
                reporter.warning(&format!(
                    "{} mirror failed ({}), trying next...",
                    attempt.source, attempt.url
                ));
                reporter.detail(error);
            }
        }

        match outcome {
            DownloadOutcome::Reused { path, bytes } => {
                reporter.info(&format!(
                    "Using existing file: {} ({})",
                    path.display(),
                    format_size(*bytes)
                ));
            }
            DownloadOutcome::Downloaded {
                path,
                position,
                source,
                bytes,
                ..
            } => {
                reporter.success(&format!(
                    "Downloaded {} from {} (source {}, {})",
                    what,
                    source,
                    position,
                    format_size(*bytes)
                ));
                reporter.detail(&path.display().to_string());
            }
            DownloadOutcome::Failed { attempts } => {
                reporter.error(&format!(
                    "Could not download {}: all {} source(s) failed",
                    what,
                    attempts.len()
                ));
            }
        }
    }
}
