//! Homebrew package manager integration for macOS

use anyhow::Result;

use super::{install_each, PackageReport};
use crate::error::SetupError;
use crate::process::{CommandSpec, PACKAGE_TIMEOUT};
use crate::session::Session;

pub const BREW: &str = "brew";
pub const HOMEBREW_WEBSITE: &str = "https://brew.sh";

/// Formulas providing libimobiledevice and its build tooling
pub const FORMULAS: &[&str] = &["libimobiledevice", "libplist", "libusbmuxd", "pkg-config"];

/// Installs every formula with `brew install`
pub fn install_dependencies(session: &Session) -> Result<PackageReport> {
    session.reporter.info("Installing macOS dependencies...");

    let Some(brew) = session.runner.locate(BREW) else {
        return Err(SetupError::PackageManagerNotFound(BREW).into());
    };
    log::debug!("Using Homebrew at {}", brew.display());

    install_each(session, FORMULAS, |formula| {
        CommandSpec::new(BREW)
            .args(["install", formula])
            .timeout(PACKAGE_TIMEOUT)
    })
}
