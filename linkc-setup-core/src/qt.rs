//! install-qt: downloads and launches the Qt online installer

use anyhow::Result;
use std::path::Path;

use crate::download::{DownloadOutcome, ExistingFile};
use crate::env_config::{self, EnvRequest};
use crate::error::{is_cancelled, SetupError};
use crate::locate;
use crate::mirrors::{self, QT_INSTALLER_MIRROR};
use crate::platform::{self, Platform};
use crate::process::{CommandSpec, INTERACTIVE_INSTALL_TIMEOUT};
use crate::report::format_size;
use crate::session::Session;

/// Free space the Qt SDK needs on the system drive
pub const REQUIRED_SPACE: u64 = 5 * 1024 * 1024 * 1024;

/// Options for `install-qt`
#[derive(Debug, Clone)]
pub struct QtInstallOptions {
    pub required_space: u64,
}

impl Default for QtInstallOptions {
    fn default() -> Self {
        Self {
            required_space: REQUIRED_SPACE,
        }
    }
}

/// Runs `install-qt`. Returns whether the installer completed.
pub fn run_install_qt(session: &Session, options: &QtInstallOptions) -> Result<bool> {
    let reporter = &session.reporter;
    reporter.banner("Qt cross-platform installer", 50);
    reporter.line(&format!("Platform: {} ({})", session.platform, session.arch));
    reporter.rule(50);

    if !session.elevated {
        reporter.warning("Running without administrator/root privileges");
        reporter.warning("Some steps may require elevated privileges");
    }

    if !check_disk_space(session, options.required_space)? {
        reporter.info("Installation cancelled");
        return Ok(false);
    }

    let mirror_list = mirrors::qt_mirrors(session.platform, session.arch);
    let installer = session
        .downloads_dir()?
        .join(&mirror_list.preferred().artifact_filename);

    let existing = if is_non_empty_file(&installer) {
        reporter.info(&format!("Existing installer found: {}", installer.display()));
        if session.prompt.confirm("Use existing installer?", true)? {
            ExistingFile::Reuse
        } else {
            ExistingFile::Replace
        }
    } else {
        ExistingFile::Replace
    };

    match session.download("the Qt installer", &mirror_list, &installer, existing)? {
        DownloadOutcome::Failed { attempts } => {
            return Err(SetupError::AllMirrorsFailed {
                attempts: attempts.len(),
            }
            .into());
        }
        DownloadOutcome::Reused { .. } | DownloadOutcome::Downloaded { .. } => {}
    }

    print_tips(session);
    if !session
        .prompt
        .confirm("Continue with the installation?", true)?
    {
        reporter.info("Installation cancelled");
        return Ok(false);
    }

    let installer_ok = launch_installer(session, &installer)?;

    let roots = locate::qt_search_roots(session.platform, dirs::home_dir().as_deref());
    match locate::find_qt_bin(&roots, session.platform) {
        Some(bin) => {
            reporter.success(&format!("Qt found: {}", bin.display()));
            if session
                .prompt
                .confirm("Configure environment variables?", true)?
            {
                let request = EnvRequest::path_only(&bin);
                env_config::configure_environment(session.platform, &request)
                    .print(reporter, &request);
            }
        }
        None => {
            reporter.warning("Qt installation not found");
            reporter.info("Add the Qt bin directory to PATH manually");
        }
    }

    if session
        .prompt
        .confirm("Delete the downloaded installer?", false)?
    {
        match std::fs::remove_file(&installer) {
            Ok(()) => reporter.info("Installer deleted"),
            Err(e) => reporter.warning(&format!("Failed to delete installer: {}", e)),
        }
    } else {
        reporter.info(&format!("Installer kept at: {}", installer.display()));
    }

    reporter.blank();
    reporter.rule(50);
    if installer_ok {
        reporter.line("Qt installation completed!");
    } else {
        reporter.line("Qt installer did not finish successfully");
    }
    reporter.blank();
    reporter.line("Next steps:");
    reporter.line("1. Restart the terminal so environment changes apply");
    reporter.line("2. Run 'qmake --version' to verify the installation");
    reporter.line("3. Start Qt Creator");
    reporter.rule(50);

    Ok(installer_ok)
}

/// Returns `false` when space is short and the operator chose not to continue
fn check_disk_space(session: &Session, required: u64) -> Result<bool> {
    let reporter = &session.reporter;
    let drive = platform::system_drive_root();
    match platform::free_disk_space(&drive) {
        Ok(Some(available)) if available >= required => {
            reporter.info(&format!("Available disk space: {}", format_size(available)));
            Ok(true)
        }
        Ok(Some(available)) => {
            reporter.warning(&format!(
                "Less than {} available on {}: {}",
                format_size(required),
                drive.display(),
                format_size(available)
            ));
            session.prompt.confirm("Continue anyway?", false)
        }
        Ok(None) => {
            reporter.warning("Free disk space cannot be queried here, skipping the check");
            Ok(true)
        }
        Err(e) => {
            reporter.warning(&format!("Disk space check failed: {:#}", e));
            Ok(true)
        }
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn print_tips(session: &Session) {
    let reporter = &session.reporter;
    reporter.blank();
    reporter.rule(50);
    reporter.line("Installation tips:");
    reporter.line(&format!(
        "1. The installer fetches packages from {}",
        QT_INSTALLER_MIRROR
    ));
    reporter.line("2. Log in with your Qt account in the installer");
    reporter.line("3. Recommended components:");
    reporter.line("   - Qt 6.x (latest version)");
    reporter.line("   - Qt Creator");
    reporter.line("   - CMake");
    match session.platform {
        Platform::Windows => reporter.line("   - MSVC 2019/2022 compiler"),
        Platform::Macos | Platform::Linux => reporter.line("   - GCC/Clang compiler"),
    }
    reporter.line("4. Recommended installation path:");
    match session.platform {
        Platform::Windows => reporter.line(r"   D:\Qt"),
        Platform::Macos | Platform::Linux => reporter.line("   ~/Qt"),
    }
    reporter.rule(50);
    reporter.blank();
}

/// Hands the terminal to the platform's installer
fn launch_installer(session: &Session, installer: &Path) -> Result<bool> {
    let reporter = &session.reporter;
    reporter.info("Starting the Qt installer...");

    let spec = match session.platform {
        Platform::Windows => CommandSpec::new(installer).args(["--mirror", QT_INSTALLER_MIRROR]),
        Platform::Linux => {
            if let Err(e) = make_executable(installer) {
                reporter.error(&format!("{:#}", e));
                return Ok(false);
            }
            CommandSpec::new(installer).args(["--mirror", QT_INSTALLER_MIRROR])
        }
        Platform::Macos => CommandSpec::new("open").arg(installer),
    }
    .interactive()
    .timeout(INTERACTIVE_INSTALL_TIMEOUT);

    match session.runner.run(&spec) {
        Ok(output) if output.success() => {
            reporter.success("Qt installer finished");
            Ok(true)
        }
        Ok(output) => {
            reporter.error(&format!("Qt installer failed: {}", output.failure_reason()));
            Ok(false)
        }
        Err(e) if is_cancelled(&e) => Err(e),
        Err(e) => {
            reporter.error(&format!("Qt installer could not start: {:#}", e));
            Ok(false)
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use anyhow::Context;
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to make {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
