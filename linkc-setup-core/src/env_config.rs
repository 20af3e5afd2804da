//! Environment configuration
//!
//! On Windows the bin directory (and optionally `PKG_CONFIG_PATH`) is written
//! to the machine-wide environment in the registry. Everywhere else, and
//! whenever the registry write is refused, the operator gets the lines to add
//! by hand.

use std::path::{Path, PathBuf};

use crate::platform::Platform;
use crate::report::Reporter;

/// Registry key holding the machine-wide environment
pub const MACHINE_ENVIRONMENT_KEY: &str =
    r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

pub const PKG_CONFIG_PATH_VAR: &str = "PKG_CONFIG_PATH";

/// What to put on the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRequest {
    pub bin_dir: PathBuf,
    /// Value for `PKG_CONFIG_PATH`, when the installation ships `.pc` files
    pub pkg_config_dir: Option<PathBuf>,
}

impl EnvRequest {
    pub fn path_only(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            pkg_config_dir: None,
        }
    }

    /// Adds `<root>/lib/pkgconfig` when that directory exists
    pub fn for_installation(root: &Path, bin_dir: impl Into<PathBuf>) -> Self {
        let pkg_config = root.join("lib").join("pkgconfig");
        Self {
            bin_dir: bin_dir.into(),
            pkg_config_dir: pkg_config.is_dir().then_some(pkg_config),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOutcome {
    /// The persistent environment was changed
    Applied {
        path_appended: bool,
        pkg_config_set: bool,
    },
    /// Nothing was changed; the operator has to apply these lines
    Advisory {
        reason: Option<String>,
        lines: Vec<String>,
    },
}

impl EnvOutcome {
    pub fn print(&self, reporter: &Reporter, request: &EnvRequest) {
        match self {
            EnvOutcome::Applied {
                path_appended,
                pkg_config_set,
            } => {
                if *path_appended {
                    reporter.success(&format!(
                        "Added {} to the system PATH",
                        request.bin_dir.display()
                    ));
                } else {
                    reporter.info("PATH already contains the target directory");
                }
                if let (true, Some(dir)) = (pkg_config_set, &request.pkg_config_dir) {
                    reporter.success(&format!("{} set to {}", PKG_CONFIG_PATH_VAR, dir.display()));
                }
                reporter.info("Open a new terminal for the changes to take effect");
            }
            EnvOutcome::Advisory { reason, lines } => {
                if let Some(reason) = reason {
                    reporter.warning(&format!("Could not update the system environment: {}", reason));
                }
                reporter.info("Add the following to your environment:");
                for line in lines {
                    reporter.detail(line);
                }
            }
        }
    }
}

/// Appends `entry` to a `;`-separated PATH value
///
/// Returns `None` when an equal entry is already present. Comparison ignores
/// ASCII case and a trailing backslash.
pub fn append_path_entry(current: &str, entry: &str) -> Option<String> {
    let normalize = |s: &str| s.trim().trim_end_matches('\\').to_ascii_lowercase();
    let wanted = normalize(entry);
    if current.split(';').any(|p| normalize(p) == wanted) {
        return None;
    }

    let current = current.trim_end_matches(';');
    if current.is_empty() {
        Some(entry.to_string())
    } else {
        Some(format!("{};{}", current, entry))
    }
}

/// Lines the operator can apply by hand
pub fn advisory_lines(platform: Platform, request: &EnvRequest) -> Vec<String> {
    let bin = request.bin_dir.display();
    let mut lines = Vec::new();
    match platform {
        Platform::Windows => {
            lines.push(format!("setx /M PATH \"%PATH%;{}\"", bin));
            if let Some(dir) = &request.pkg_config_dir {
                lines.push(format!("setx /M {} \"{}\"", PKG_CONFIG_PATH_VAR, dir.display()));
            }
        }
        Platform::Macos | Platform::Linux => {
            lines.push(format!("export PATH=\"$PATH:{}\"", bin));
            if let Some(dir) = &request.pkg_config_dir {
                lines.push(format!(
                    "export {}=\"{}:${}\"",
                    PKG_CONFIG_PATH_VAR,
                    dir.display(),
                    PKG_CONFIG_PATH_VAR
                ));
            }
        }
    }
    lines
}

/// Persists the request where the platform allows it
pub fn configure_environment(platform: Platform, request: &EnvRequest) -> EnvOutcome {
    if platform != Platform::Windows {
        return EnvOutcome::Advisory {
            reason: None,
            lines: advisory_lines(platform, request),
        };
    }

    match write_machine_environment(request) {
        Ok((path_appended, pkg_config_set)) => EnvOutcome::Applied {
            path_appended,
            pkg_config_set,
        },
        Err(e) => {
            log::warn!("Registry update failed: {:#}", e);
            EnvOutcome::Advisory {
                reason: Some(format!("{:#}", e)),
                lines: advisory_lines(platform, request),
            }
        }
    }
}

/// Only a missing value reads as empty; any other failure must not be
/// mistaken for an empty `Path` and overwritten
#[cfg_attr(not(windows), allow(dead_code))]
fn existing_path_value(read: std::io::Result<String>) -> std::io::Result<String> {
    match read {
        Ok(value) => Ok(value),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

#[cfg(windows)]
fn write_machine_environment(request: &EnvRequest) -> anyhow::Result<(bool, bool)> {
    use anyhow::Context;
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE, REG_EXPAND_SZ};
    use winreg::types::ToRegValue;
    use winreg::RegKey;

    let env = RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags(MACHINE_ENVIRONMENT_KEY, KEY_READ | KEY_WRITE)
        .context("Failed to open the machine environment registry key")?;

    let current = existing_path_value(env.get_value("Path"))
        .context("Failed to read Path from the registry")?;
    let bin = request.bin_dir.to_string_lossy();
    let path_appended = match append_path_entry(&current, &bin) {
        Some(updated) => {
            // Path holds %SystemRoot%-style references
            let mut value = updated.to_reg_value();
            value.vtype = REG_EXPAND_SZ;
            env.set_raw_value("Path", &value)
                .context("Failed to update Path in the registry")?;
            true
        }
        None => false,
    };

    let pkg_config_set = match &request.pkg_config_dir {
        Some(dir) => {
            env.set_value(PKG_CONFIG_PATH_VAR, &dir.to_string_lossy().into_owned())
                .context("Failed to set PKG_CONFIG_PATH in the registry")?;
            true
        }
        None => false,
    };

    Ok((path_appended, pkg_config_set))
}

#[cfg(not(windows))]
fn write_machine_environment(_request: &EnvRequest) -> anyhow::Result<(bool, bool)> {
    anyhow::bail!("the machine environment registry only exists on Windows")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_append_path_entry() {
        assert_eq!(
            append_path_entry(r"C:\Windows;C:\Tools", r"D:\lib\bin"),
            Some(r"C:\Windows;C:\Tools;D:\lib\bin".to_string())
        );
        assert_eq!(append_path_entry("", r"D:\lib\bin"), Some(r"D:\lib\bin".to_string()));
        assert_eq!(
            append_path_entry(r"C:\Windows;", r"D:\bin"),
            Some(r"C:\Windows;D:\bin".to_string())
        );
    }

    #[test]
    fn test_append_path_entry_is_idempotent_and_case_insensitive() {
        let once = append_path_entry(r"C:\Windows", r"D:\Lib\Bin").unwrap();
        assert_eq!(append_path_entry(&once, r"D:\Lib\Bin"), None);
        assert_eq!(append_path_entry(&once, r"d:\lib\bin"), None);
        assert_eq!(append_path_entry(&once, r"D:\LIB\BIN\"), None);
    }

    #[test]
    fn test_unreadable_path_is_not_treated_as_empty() {
        use std::io::{Error, ErrorKind};

        let missing = existing_path_value(Err(Error::new(ErrorKind::NotFound, "no value")));
        assert_eq!(missing.ok(), Some(String::new()));

        let denied = existing_path_value(Err(Error::new(ErrorKind::PermissionDenied, "denied")));
        assert!(denied.is_err());

        let present = existing_path_value(Ok(r"C:\Windows".to_string()));
        assert_eq!(present.ok(), Some(r"C:\Windows".to_string()));
    }

    #[test]
    fn test_request_picks_up_pkgconfig_dir() -> Result<()> {
        let temp = TempDir::new()?;
        let bin = temp.path().join("bin");

        let request = EnvRequest::for_installation(temp.path(), &bin);
        assert_eq!(request.pkg_config_dir, None);

        std::fs::create_dir_all(temp.path().join("lib/pkgconfig"))?;
        let request = EnvRequest::for_installation(temp.path(), &bin);
        assert_eq!(
            request.pkg_config_dir,
            Some(temp.path().join("lib").join("pkgconfig"))
        );
        Ok(())
    }

    #[test]
    fn test_unix_platforms_are_advisory() {
        let request = EnvRequest {
            bin_dir: PathBuf::from("/opt/Qt/6.7.2/gcc_64/bin"),
            pkg_config_dir: Some(PathBuf::from("/opt/lib/pkgconfig")),
        };
        let outcome = configure_environment(Platform::Linux, &request);
        assert_eq!(
            outcome,
            EnvOutcome::Advisory {
                reason: None,
                lines: vec![
                    "export PATH=\"$PATH:/opt/Qt/6.7.2/gcc_64/bin\"".to_string(),
                    "export PKG_CONFIG_PATH=\"/opt/lib/pkgconfig:$PKG_CONFIG_PATH\"".to_string(),
                ],
            }
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_registry_failure_degrades_to_advisory() {
        let request = EnvRequest::path_only(r"C:\libimobiledevice\bin");
        match configure_environment(Platform::Windows, &request) {
            EnvOutcome::Advisory { reason, lines } => {
                assert!(reason.is_some());
                assert_eq!(lines, vec![r#"setx /M PATH "%PATH%;C:\libimobiledevice\bin""#.to_string()]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
