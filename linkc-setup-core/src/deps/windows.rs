//! Windows dependency installation
//!
//! libimobiledevice comes as a prebuilt zip that is staged in the work
//! directory and then copied into `<project>/thirdparty/libimobiledevice`.
//! Device access additionally needs Apple's Mobile Device driver, which ships
//! with the iTunes installer.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::archive;
use crate::download::{DownloadOutcome, ExistingFile};
use crate::env_config::{self, EnvRequest};
use crate::error::is_cancelled;
use crate::hash::{self, HashCheck};
use crate::locate::THIRDPARTY_DIR;
use crate::mirrors::{MirrorCandidate, MirrorList};
use crate::process::{CommandSpec, DRIVER_INSTALL_TIMEOUT, PROBE_TIMEOUT};
use crate::session::Session;

pub const LIBIMOBILEDEVICE_URL: &str = "https://github.com/libimobiledevice-win32/imobiledevice-net/releases/download/v1.3.17/libimobiledevice.1.2.1-r1122-win-x64.zip";
pub const LIBIMOBILEDEVICE_FILENAME: &str = "libimobiledevice.1.2.1-r1122-win-x64.zip";
/// Expected SHA-256 of the zip; empty skips verification
pub const LIBIMOBILEDEVICE_SHA256: &str = "";

pub const ITUNES_URL: &str = "https://secure-appldnld.apple.com/itunes12/001-97787-20210421-F0E5A3C2-A2C9-11EB-A40B-A128318AD179/iTunes64Setup.exe";
pub const ITUNES_FILENAME: &str = "iTunes64Setup.exe";

const APPLE_SERVICE: &str = "Apple Mobile Device Service";
const APPLE_DRIVER_DLLS: &[&str] = &["MobileDevice.dll", "iTunesMobileDevice.dll"];

/// Downloads, stages and installs libimobiledevice into the project
///
/// Returns `Ok(false)` when a step fails; the caller still runs its summary.
pub fn install_libimobiledevice(
    session: &Session,
    project_root: &Path,
    work_dir: &Path,
) -> Result<bool> {
    let reporter = &session.reporter;
    reporter.info("Installing libimobiledevice (Windows)");

    let zip_path = session.downloads_dir()?.join(LIBIMOBILEDEVICE_FILENAME);
    let mirrors = MirrorList::single(MirrorCandidate::from_url("GitHub", LIBIMOBILEDEVICE_URL));
    let outcome = session.download(
        "libimobiledevice",
        &mirrors,
        &zip_path,
        ExistingFile::Reuse,
    )?;
    if let DownloadOutcome::Failed { .. } = outcome {
        return Ok(false);
    }

    match hash::verify_sha256(&zip_path, LIBIMOBILEDEVICE_SHA256)? {
        HashCheck::Skipped => log::debug!("No SHA-256 configured for {}", LIBIMOBILEDEVICE_FILENAME),
        HashCheck::Matched => reporter.success("SHA-256 verified"),
        HashCheck::Mismatched { expected, actual } => {
            reporter.error("SHA-256 mismatch");
            reporter.detail(&format!("Expected: {}", expected));
            reporter.detail(&format!("Actual:   {}", actual));
            return Ok(false);
        }
    }

    let staging = work_dir.join("libimobiledevice");
    reporter.progress(&format!("Extracting to {}", staging.display()));
    if let Err(e) = archive::extract_zip(&zip_path, &staging) {
        reporter.error(&format!("Extraction failed: {:#}", e));
        return Ok(false);
    }

    let Some(staged_bin) = archive::find_dir_containing(&staging, "idevice_id.exe") else {
        reporter.error("idevice_id.exe not found in the archive");
        return Ok(false);
    };
    let relative_bin = staged_bin
        .strip_prefix(&staging)
        .context("Located binary directory is outside the staging area")?
        .to_path_buf();

    session.cancel.check()?;
    let install_dir = project_root.join(THIRDPARTY_DIR);
    reporter.progress(&format!("Installing to {}", install_dir.display()));
    let copied = archive::replace_tree(&staging, &install_dir)?;
    log::debug!("Copied {} files into {}", copied, install_dir.display());

    let bin_dir = if relative_bin.as_os_str().is_empty() {
        install_dir.clone()
    } else {
        install_dir.join(relative_bin)
    };
    reporter.success(&format!("Executables in {}", bin_dir.display()));

    let request = EnvRequest::for_installation(&install_dir, &bin_dir);
    env_config::configure_environment(session.platform, &request).print(reporter, &request);

    if verify_tools(session, &bin_dir)? {
        reporter.success("libimobiledevice installed");
        Ok(true)
    } else {
        reporter.error("libimobiledevice installation could not be verified");
        Ok(false)
    }
}

/// Runs `idevice_id --help` from the installed directory
fn verify_tools(session: &Session, bin_dir: &Path) -> Result<bool> {
    let exe = bin_dir.join("idevice_id.exe");
    if !exe.is_file() {
        return Ok(false);
    }
    match session
        .runner
        .run(&CommandSpec::new(&exe).arg("--help").timeout(PROBE_TIMEOUT))
    {
        Ok(output) => Ok(output.success()),
        Err(e) if is_cancelled(&e) => Err(e),
        Err(e) => {
            log::warn!("Failed to run {}: {:#}", exe.display(), e);
            Ok(false)
        }
    }
}

/// Directories the Apple driver DLLs are installed into
pub fn apple_support_dirs(common_files: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for base in ["Mobile Device Support", "Apple Application Support"] {
        for common in common_files {
            dirs.push(common.join("Apple").join(base));
        }
    }
    dirs
}

/// `Common Files` directories of this machine
fn common_files_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = ["CommonProgramFiles", "CommonProgramFiles(x86)"]
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    for fallback in [
        r"C:\Program Files\Common Files",
        r"C:\Program Files (x86)\Common Files",
    ] {
        let fallback = PathBuf::from(fallback);
        if !dirs.contains(&fallback) {
            dirs.push(fallback);
        }
    }
    dirs
}

/// First Apple driver DLL found under `dirs`
pub fn find_apple_driver_dll(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| APPLE_DRIVER_DLLS.iter().map(move |dll| dir.join(dll)))
        .find(|path| path.is_file())
}

/// Checks for the Apple Mobile Device driver files or a running service
pub fn has_apple_mobile_device_support(session: &Session) -> Result<bool> {
    if let Some(dll) = find_apple_driver_dll(&apple_support_dirs(&common_files_dirs())) {
        session.reporter.info(&format!("Found {}", dll.display()));
        return Ok(true);
    }

    match session
        .runner
        .run(&CommandSpec::new("sc").args(["query", APPLE_SERVICE]))
    {
        Ok(output) if output.success() && output.stdout.contains("RUNNING") => {
            session.reporter.info(&format!("{} is running", APPLE_SERVICE));
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if is_cancelled(&e) => Err(e),
        Err(e) => {
            log::debug!("sc query failed: {:#}", e);
            Ok(false)
        }
    }
}

/// Installs the Apple Mobile Device driver via the iTunes installer, after asking
pub fn install_apple_driver(session: &Session) -> Result<bool> {
    let reporter = &session.reporter;
    reporter.info("Checking Apple Mobile Device driver");

    if has_apple_mobile_device_support(session)? {
        reporter.success("Apple Mobile Device support is installed");
        return Ok(true);
    }

    reporter.warning("Apple Mobile Device support not found");
    reporter.info("It is installed together with iTunes");
    if !session.prompt.confirm("Download and install iTunes?", true)? {
        reporter.info("Skipping iTunes installation");
        return Ok(false);
    }

    let installer = session.downloads_dir()?.join(ITUNES_FILENAME);
    let mirrors = MirrorList::single(MirrorCandidate::from_url("Apple", ITUNES_URL));
    let outcome = session.download("iTunes", &mirrors, &installer, ExistingFile::Reuse)?;
    if let DownloadOutcome::Failed { .. } = outcome {
        return Ok(false);
    }

    reporter.progress("Running the iTunes installer (silent)...");
    let run = session.runner.run(
        &CommandSpec::new(&installer)
            .arg("/S")
            .timeout(DRIVER_INSTALL_TIMEOUT),
    );
    match run {
        Ok(output) if output.success() => {}
        Ok(output) => {
            reporter.error(&format!("iTunes installer failed: {}", output.failure_reason()));
            return Ok(false);
        }
        Err(e) if is_cancelled(&e) => return Err(e),
        Err(e) => {
            reporter.error(&format!("iTunes installer could not start: {:#}", e));
            return Ok(false);
        }
    }

    reporter.success("iTunes installer finished");
    has_apple_mobile_device_support(session)
}
