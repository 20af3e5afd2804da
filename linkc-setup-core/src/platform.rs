//! Host platform detection and host-level checks
//!
//! Covers the operating system and CPU architecture, administrator
//! privileges, free disk space and the user's download directory.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SetupError;

/// Operating systems the installers know how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

impl Platform {
    /// Detects the current platform from the compile target
    pub fn detect() -> Result<Self, SetupError> {
        match std::env::consts::OS {
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::Macos),
            "linux" => Ok(Platform::Linux),
            other => Err(SetupError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
        }
    }

    pub fn executable_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Macos | Platform::Linux => "",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture as used in installer file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    X86,
}

impl Arch {
    pub fn detect() -> Self {
        Self::from_target(std::env::consts::ARCH)
    }

    /// Anything that is not a 32-bit x86 name is treated as x64
    pub fn from_target(arch: &str) -> Self {
        match arch {
            "x86" | "i386" | "i586" | "i686" => Arch::X86,
            _ => Arch::X64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::X86 => "x86",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks whether the process runs with administrator/root rights
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Checks whether the process runs with administrator/root rights
///
/// Opening `HKLM\SOFTWARE` for writing only succeeds for elevated processes.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_WRITE};
    use winreg::RegKey;

    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags("SOFTWARE", KEY_WRITE)
        .is_ok()
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}

/// Root of the drive that holds the system installation
pub fn system_drive_root() -> PathBuf {
    if cfg!(windows) {
        let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        PathBuf::from(format!("{}\\", drive))
    } else {
        PathBuf::from("/")
    }
}

/// Returns the number of bytes available to the current user on the volume holding `path`
///
/// `Ok(None)` means the query is not supported on this platform.
#[cfg(unix)]
pub fn free_disk_space(path: &Path) -> Result<Option<u64>> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("Path contains a NUL byte: {}", path.display()))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs failed for {}", path.display()));
    }

    #[allow(clippy::unnecessary_cast)]
    Ok(Some(stat.f_bavail as u64 * stat.f_frsize as u64))
}

/// Returns the number of bytes available to the current user on the volume holding `path`
#[cfg(windows)]
pub fn free_disk_space(path: &Path) -> Result<Option<u64>> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut available: u64 = 0;

    unsafe {
        GetDiskFreeSpaceExW(
            PCWSTR(wide.as_ptr()),
            Some(&mut available as *mut u64),
            None,
            None,
        )
            .with_context(|| format!("GetDiskFreeSpaceExW failed for {}", path.display()))?;
    }

    Ok(Some(available))
}

#[cfg(not(any(unix, windows)))]
pub fn free_disk_space(_path: &Path) -> Result<Option<u64>> {
    Ok(None)
}

/// Environment variable that overrides the download directory
pub const DOWNLOAD_DIR_VAR: &str = "XDG_DOWNLOAD_DIR";

/// Resolves the user's download directory, creating it when missing
pub fn downloads_dir() -> Result<PathBuf> {
    let dir = resolve_downloads_dir(std::env::var_os(DOWNLOAD_DIR_VAR), dirs::home_dir())
        .context("Could not determine the home directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create download directory: {}", dir.display()))?;
    Ok(dir)
}

fn resolve_downloads_dir(override_dir: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    match override_dir {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => home.map(|h| h.join("Downloads")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_on_supported_hosts() {
        let platform = Platform::detect().ok();
        #[cfg(target_os = "linux")]
        assert_eq!(platform, Some(Platform::Linux));
        #[cfg(target_os = "macos")]
        assert_eq!(platform, Some(Platform::Macos));
        #[cfg(target_os = "windows")]
        assert_eq!(platform, Some(Platform::Windows));
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        assert!(platform.is_none());
    }

    #[test]
    fn test_arch_from_target() {
        assert_eq!(Arch::from_target("x86_64"), Arch::X64);
        assert_eq!(Arch::from_target("i686"), Arch::X86);
        assert_eq!(Arch::from_target("x86"), Arch::X86);
        // Unknown architectures fall back to x64 installers
        assert_eq!(Arch::from_target("aarch64"), Arch::X64);
    }

    #[test]
    fn test_executable_suffix() {
        assert_eq!(Platform::Windows.executable_suffix(), ".exe");
        assert_eq!(Platform::Linux.executable_suffix(), "");
        assert_eq!(Platform::Macos.executable_suffix(), "");
    }

    #[test]
    fn test_downloads_dir_override_wins() {
        let resolved = resolve_downloads_dir(
            Some(OsString::from("/srv/downloads")),
            Some(PathBuf::from("/home/user")),
        );
        assert_eq!(resolved, Some(PathBuf::from("/srv/downloads")));
    }

    #[test]
    fn test_downloads_dir_defaults_to_home() {
        let resolved = resolve_downloads_dir(None, Some(PathBuf::from("/home/user")));
        assert_eq!(resolved, Some(PathBuf::from("/home/user").join("Downloads")));

        // An empty override is ignored
        let resolved = resolve_downloads_dir(Some(OsString::new()), Some(PathBuf::from("/h")));
        assert_eq!(resolved, Some(PathBuf::from("/h").join("Downloads")));

        assert_eq!(resolve_downloads_dir(None, None), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_free_disk_space_reports_a_value() -> Result<()> {
        let temp = tempfile::TempDir::new()?;
        let free = free_disk_space(temp.path())?;
        assert!(free.is_some());
        Ok(())
    }
}
