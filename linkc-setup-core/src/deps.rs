//! install-deps: installs libimobiledevice and its helpers for the current platform
//!
//! Windows downloads a prebuilt libimobiledevice tree into the project and
//! optionally the Apple Mobile Device driver; macOS and Linux go through
//! Homebrew and apt. Package installs are best-effort: one failing package
//! does not stop the next.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

mod apt;
mod homebrew;
pub mod windows;

use crate::error::{is_cancelled, SetupError};
use crate::platform::Platform;
use crate::process::{CommandSpec, PROBE_TIMEOUT};
use crate::session::Session;

/// Device listing may wait on usbmuxd, so it gets a little longer than a probe
const DEVICE_LIST_TIMEOUT: Duration = Duration::from_secs(15);

/// Options for `install-deps`
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub skip_itunes: bool,
    /// Work directory to use instead of a scoped temporary one. Kept afterwards.
    pub temp_dir: Option<PathBuf>,
    pub run_tests: bool,
    /// Directory holding `thirdparty/`
    pub project_root: PathBuf,
}

impl InstallOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            skip_itunes: false,
            temp_dir: None,
            run_tests: true,
            project_root: project_root.into(),
        }
    }
}

/// Extraction staging area
pub enum WorkDir {
    /// Removed when dropped
    Scoped(TempDir),
    /// Supplied by the operator; left in place
    Provided(PathBuf),
}

impl WorkDir {
    pub fn create(provided: Option<&Path>) -> Result<Self> {
        match provided {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create work directory: {}", dir.display())
                })?;
                Ok(WorkDir::Provided(dir.to_path_buf()))
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("linkc_setup_")
                    .tempdir()
                    .context("Failed to create temporary directory")?;
                Ok(WorkDir::Scoped(dir))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WorkDir::Scoped(dir) => dir.path(),
            WorkDir::Provided(dir) => dir,
        }
    }
}

/// Per-package results of a package-manager run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
    pub installed: Vec<String>,
    /// Package and failure reason
    pub failed: Vec<(String, String)>,
}

impl PackageReport {
    pub fn all_installed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs each package independently
///
/// A package that fails is recorded and skipped. Not being able to start the
/// package manager at all is an error.
fn install_each(
    session: &Session,
    packages: &[&str],
    command: impl Fn(&str) -> CommandSpec,
) -> Result<PackageReport> {
    let reporter = &session.reporter;
    let mut report = PackageReport::default();

    for package in packages {
        session.cancel.check()?;
        reporter.progress(&format!("Installing {}...", package));
        let spec = command(package);
        let output = session
            .runner
            .run(&spec)
            .with_context(|| format!("Failed to run '{}'", spec.display()))?;

        if output.success() {
            reporter.success(&format!("{} installed", package));
            report.installed.push(package.to_string());
        } else {
            let reason = output.failure_reason();
            reporter.warning(&format!("{} may not have installed: {}", package, reason));
            report.failed.push((package.to_string(), reason));
        }
    }

    Ok(report)
}

/// Runs `install-deps`. Returns whether every mandatory step succeeded.
pub fn run_install(session: &Session, options: &InstallOptions) -> Result<bool> {
    let reporter = &session.reporter;
    reporter.banner("iOS device manager - dependency installer", 60);
    reporter.line(&format!("System: {} {}", session.platform, session.arch));
    reporter.blank();

    if session.platform == Platform::Windows && !session.elevated {
        reporter.error("Administrator privileges are required");
        reporter.info("Re-run this command from an elevated prompt");
        return Ok(false);
    }

    let work_dir = WorkDir::create(options.temp_dir.as_deref())?;
    reporter.info(&format!("Work directory: {}", work_dir.path().display()));
    reporter.info("Installing dependencies...");

    let mut success = true;
    match session.platform {
        Platform::Windows => {
            if !windows::install_libimobiledevice(session, &options.project_root, work_dir.path())? {
                success = false;
            }
            if options.skip_itunes {
                reporter.info("Skipping Apple Mobile Device driver (--skip-itunes)");
            } else if !windows::install_apple_driver(session)? {
                reporter.warning("Apple Mobile Device support was skipped or failed");
                reporter.info("Device connections may not work until iTunes is installed");
            }
        }
        Platform::Macos | Platform::Linux => {
            let result = if session.platform == Platform::Macos {
                homebrew::install_dependencies(session)
            } else {
                apt::install_dependencies(session)
            };
            match result {
                Ok(report) => {
                    if !report.all_installed() {
                        let failed: Vec<&str> =
                            report.failed.iter().map(|(p, _)| p.as_str()).collect();
                        reporter.warning(&format!(
                            "Some packages may be missing: {}",
                            failed.join(", ")
                        ));
                    }
                }
                Err(e) => match e.downcast_ref::<SetupError>() {
                    Some(SetupError::PackageManagerNotFound(name)) => {
                        reporter.error(&e.to_string());
                        if *name == homebrew::BREW {
                            reporter.info(&format!(
                                "Install Homebrew first: {}",
                                homebrew::HOMEBREW_WEBSITE
                            ));
                        }
                        success = false;
                    }
                    _ => return Err(e),
                },
            }
        }
    }

    if options.run_tests {
        run_post_install_tests(session)?;
    }

    if success {
        reporter.success("All dependencies installed");
    } else {
        reporter.error("Some dependencies failed to install");
    }
    print_summary(session, &options.project_root)?;

    if let WorkDir::Provided(dir) = &work_dir {
        reporter.info(&format!("Work directory kept: {}", dir.display()));
    }
    Ok(success)
}

/// Splits `idevice_id -l` output into device identifiers
pub fn parse_device_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Smoke tests after installation. Only Windows ships the tools itself.
fn run_post_install_tests(session: &Session) -> Result<()> {
    if session.platform != Platform::Windows {
        return Ok(());
    }
    let reporter = &session.reporter;
    reporter.info("Running post-install tests...");

    let help = session
        .runner
        .run(&CommandSpec::new("idevice_id").arg("--help").timeout(PROBE_TIMEOUT));
    match help {
        Ok(output) if output.success() => reporter.success("idevice_id is available"),
        Ok(_) => reporter.warning("idevice_id did not run; a new terminal may be needed"),
        Err(e) if is_cancelled(&e) => return Err(e),
        Err(_) => reporter.warning("idevice_id is not on PATH yet; a new terminal may be needed"),
    }

    let list = session
        .runner
        .run(&CommandSpec::new("idevice_id").arg("-l").timeout(DEVICE_LIST_TIMEOUT));
    match list {
        Ok(output) if output.success() => {
            let devices = parse_device_list(&output.stdout);
            if devices.is_empty() {
                reporter.info("No devices connected (this is fine)");
            } else {
                reporter.success(&format!("Found {} device(s):", devices.len()));
                for device in devices {
                    reporter.detail(&format!("- {}", device));
                }
            }
        }
        Ok(output) => reporter.warning(&format!(
            "Device listing failed: {}",
            output.failure_reason()
        )),
        Err(e) if is_cancelled(&e) => return Err(e),
        Err(e) => reporter.info(&format!("Device listing skipped: {:#}", e)),
    }
    Ok(())
}

fn print_summary(session: &Session, project_root: &Path) -> Result<()> {
    let reporter = &session.reporter;
    reporter.blank();
    reporter.banner("Installation summary", 60);

    match session.platform {
        Platform::Windows => {
            reporter.line("Components:");
            reporter.line("- libimobiledevice: iOS device communication library");
            reporter.line("- Apple Mobile Device Support (when iTunes was installed)");
            reporter.blank();
            reporter.line("Installed to:");
            reporter.line(&format!(
                "- {}",
                project_root.join(crate::locate::THIRDPARTY_DIR).display()
            ));
            reporter.line("Downloads kept in:");
            reporter.line(&format!("- {}", session.downloads_dir()?.display()));
            reporter.line(&format!("- {}", windows::LIBIMOBILEDEVICE_FILENAME));
            reporter.line(&format!("- {} (if downloaded)", windows::ITUNES_FILENAME));
            reporter.blank();
            reporter.line("Next steps:");
            reporter.line("1. Open a new terminal so the environment changes apply");
            reporter.line("2. Connect an iOS device and trust this computer");
            reporter.line("3. Verify with: linkc-setup check-deps");
        }
        Platform::Macos => {
            reporter.line("Components (Homebrew):");
            for formula in homebrew::FORMULAS {
                reporter.line(&format!("- {}", formula));
            }
            reporter.blank();
            reporter.line("Next steps:");
            reporter.line("1. Connect an iOS device and trust this computer");
            reporter.line("2. Build the project");
        }
        Platform::Linux => {
            reporter.line("Components (apt):");
            for package in apt::PACKAGES {
                reporter.line(&format!("- {}", package));
            }
            reporter.blank();
            reporter.line("Next steps:");
            reporter.line("1. Connect an iOS device");
            reporter.line("2. Build the project");
        }
    }
    Ok(())
}
