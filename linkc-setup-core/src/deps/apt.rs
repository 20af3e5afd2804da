//! APT package manager integration (Debian, Ubuntu)

use anyhow::{Context, Result};

use super::{install_each, PackageReport};
use crate::error::SetupError;
use crate::process::{CommandSpec, PACKAGE_TIMEOUT};
use crate::session::Session;

const APT_GET: &str = "apt-get";

/// Development packages needed to build against libimobiledevice
pub const PACKAGES: &[&str] = &[
    "libimobiledevice-dev",
    "libplist-dev",
    "libusbmuxd-dev",
    "pkg-config",
    "build-essential",
];

/// Refreshes the package lists, then installs each package with `apt-get install -y`
///
/// Commands go through `sudo` unless the process already runs as root. A
/// failed `apt-get update` is only a warning; installs may still succeed from
/// the existing lists.
pub fn install_dependencies(session: &Session) -> Result<PackageReport> {
    let reporter = &session.reporter;
    reporter.info("Installing Linux dependencies...");

    if session.runner.locate(APT_GET).is_none() {
        return Err(SetupError::PackageManagerNotFound(APT_GET).into());
    }

    let use_sudo = !session.elevated;
    let apt = |args: &[&str]| {
        let spec = CommandSpec::new(APT_GET)
            .args(args)
            .timeout(PACKAGE_TIMEOUT);
        if use_sudo {
            spec.with_sudo()
        } else {
            spec
        }
    };

    reporter.progress("Updating package lists...");
    let update = apt(&["update"]);
    let output = session
        .runner
        .run(&update)
        .with_context(|| format!("Failed to run '{}'", update.display()))?;
    if output.success() {
        reporter.success("Package lists updated");
    } else {
        reporter.warning(&format!(
            "Updating package lists failed: {}",
            output.failure_reason()
        ));
    }

    install_each(session, PACKAGES, |package| apt(&["install", "-y", package]))
}
