//! Finds existing installations on disk

use std::cmp::Ordering;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Overrides the libimobiledevice installation root
pub const LIBIMOBILEDEVICE_ROOT_VAR: &str = "LIBIMOBILEDEVICE_ROOT";

/// Project-relative directory the Windows installer populates
pub const THIRDPARTY_DIR: &str = "thirdparty/libimobiledevice";

/// Candidate libimobiledevice roots, most specific first
pub fn libimobiledevice_candidates(
    root_override: Option<&OsStr>,
    path_var: Option<&OsStr>,
    project_root: &Path,
    home: Option<&Path>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(root) = root_override.filter(|r| !r.is_empty()) {
        candidates.push(PathBuf::from(root));
    }

    if let Some(path_var) = path_var {
        for entry in env::split_paths(path_var) {
            let mentions = entry
                .to_string_lossy()
                .to_lowercase()
                .contains("libimobiledevice");
            if !mentions {
                continue;
            }
            if let Some(parent) = entry.parent().filter(|p| !p.as_os_str().is_empty()) {
                candidates.push(parent.to_path_buf());
            }
        }
    }

    candidates.push(project_root.join(THIRDPARTY_DIR));
    candidates.extend(
        [
            r"C:\libimobiledevice",
            r"C:\Program Files\libimobiledevice",
            r"C:\Program Files (x86)\libimobiledevice",
        ]
        .iter()
        .map(PathBuf::from),
    );
    if let Some(home) = home {
        candidates.push(home.join("libimobiledevice"));
    }

    candidates
}

/// True when `<root>/bin` holds at least one `idevice*.exe`
pub fn has_idevice_tools(root: &Path) -> bool {
    let Ok(entries) = fs::read_dir(root.join("bin")) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|entry| {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        name.starts_with("idevice")
            && name.ends_with(".exe")
            && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
    })
}

/// First candidate root that exists and holds the idevice tools
pub fn find_libimobiledevice_in(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|root| has_idevice_tools(root)).cloned()
}

/// Looks for a libimobiledevice installation using the process environment
pub fn find_libimobiledevice(project_root: &Path) -> Option<PathBuf> {
    let root_override = env::var_os(LIBIMOBILEDEVICE_ROOT_VAR);
    let path_var = env::var_os("PATH");
    let home = dirs::home_dir();
    let candidates = libimobiledevice_candidates(
        root_override.as_deref(),
        path_var.as_deref(),
        project_root,
        home.as_deref(),
    );
    log::debug!("libimobiledevice candidates: {:?}", candidates);
    find_libimobiledevice_in(&candidates)
}

/// Directories a Qt SDK is usually installed under
pub fn qt_search_roots(platform: Platform, home: Option<&Path>) -> Vec<PathBuf> {
    let home_qt = home.map(|h| h.join("Qt"));
    match platform {
        Platform::Windows => [r"C:\Qt", r"D:\Qt", r"E:\Qt"]
            .iter()
            .map(PathBuf::from)
            .collect(),
        Platform::Linux => home_qt
            .into_iter()
            .chain(["/opt/Qt", "/usr/local/Qt"].iter().map(PathBuf::from))
            .collect(),
        Platform::Macos => home_qt
            .into_iter()
            .chain(std::iter::once(PathBuf::from("/Applications/Qt")))
            .collect(),
    }
}

/// Finds a Qt `bin` directory holding `qmake`
///
/// Accepts `<root>/<version>/bin` and `<root>/<version>/<kit>/bin`. Newer
/// version directories are preferred.
pub fn find_qt_bin(roots: &[PathBuf], platform: Platform) -> Option<PathBuf> {
    let qmake = format!("qmake{}", platform.executable_suffix());
    for root in roots {
        for version_dir in sorted_subdirs(root) {
            let bin = version_dir.join("bin");
            if bin.join(&qmake).is_file() {
                return Some(bin);
            }
            for kit_dir in sorted_subdirs(&version_dir) {
                let bin = kit_dir.join("bin");
                if bin.join(&qmake).is_file() {
                    return Some(bin);
                }
            }
        }
    }
    None
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    // Versions newest first, then anything else (`Tools`, kits) by name
    dirs.sort_by(|a, b| match (version_key(a), version_key(b)) {
        (Some(va), Some(vb)) => vb.cmp(&va),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    });
    dirs
}

/// Numeric segments of a dotted version directory name such as `6.10.0`
fn version_key(path: &Path) -> Option<Vec<u64>> {
    let name = path.file_name()?.to_str()?;
    name.split('.').map(|segment| segment.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::ffi::OsString;
    use tempfile::TempDir;

    #[test]
    fn test_candidate_order() {
        let path_var = env::join_paths([
            PathBuf::from("/usr/bin"),
            PathBuf::from("/opt/LibiMobileDevice/bin"),
        ])
        .unwrap();
        let candidates = libimobiledevice_candidates(
            Some(OsStr::new("/custom/root")),
            Some(&path_var),
            Path::new("/work/project"),
            Some(Path::new("/home/dev")),
        );

        assert_eq!(candidates[0], PathBuf::from("/custom/root"));
        assert_eq!(candidates[1], PathBuf::from("/opt/LibiMobileDevice"));
        assert_eq!(
            candidates[2],
            Path::new("/work/project").join(THIRDPARTY_DIR)
        );
        assert_eq!(
            candidates.last(),
            Some(&Path::new("/home/dev").join("libimobiledevice"))
        );
        assert!(!candidates.contains(&PathBuf::from("/usr")));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let empty = OsString::new();
        let candidates =
            libimobiledevice_candidates(Some(&empty), None, Path::new("/p"), None);
        assert_eq!(candidates[0], Path::new("/p").join(THIRDPARTY_DIR));
    }

    #[test]
    fn test_root_needs_idevice_executables() -> Result<()> {
        let temp = TempDir::new()?;
        let empty_root = temp.path().join("empty");
        fs::create_dir_all(empty_root.join("bin"))?;
        fs::write(empty_root.join("bin/readme.txt"), "")?;

        let good_root = temp.path().join("good");
        fs::create_dir_all(good_root.join("bin"))?;
        fs::write(good_root.join("bin/ideviceinfo.exe"), "")?;

        assert!(!has_idevice_tools(&empty_root));
        assert!(has_idevice_tools(&good_root));
        assert_eq!(
            find_libimobiledevice_in(&[
                temp.path().join("absent"),
                empty_root,
                good_root.clone()
            ]),
            Some(good_root)
        );
        Ok(())
    }

    #[test]
    fn test_find_qt_bin_prefers_newest_version() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("Qt");
        for version in ["6.5.3", "6.7.2"] {
            let bin = root.join(version).join("gcc_64").join("bin");
            fs::create_dir_all(&bin)?;
            fs::write(bin.join("qmake"), "")?;
        }
        fs::create_dir_all(root.join("Tools/QtCreator/bin"))?;

        let found = find_qt_bin(&[temp.path().join("missing"), root.clone()], Platform::Linux);
        assert_eq!(found, Some(root.join("6.7.2").join("gcc_64").join("bin")));
        Ok(())
    }

    #[test]
    fn test_find_qt_bin_compares_versions_numerically() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("Qt");
        for version in ["6.9.3", "6.10.0"] {
            let bin = root.join(version).join("gcc_64").join("bin");
            fs::create_dir_all(&bin)?;
            fs::write(bin.join("qmake"), "")?;
        }
        // Non-version directories sort after every version
        let tools = root.join("Tools").join("bin");
        fs::create_dir_all(&tools)?;
        fs::write(tools.join("qmake"), "")?;

        let found = find_qt_bin(&[root.clone()], Platform::Linux);
        assert_eq!(found, Some(root.join("6.10.0").join("gcc_64").join("bin")));
        Ok(())
    }

    #[test]
    fn test_version_key() {
        assert_eq!(version_key(Path::new("/Qt/6.10.0")), Some(vec![6, 10, 0]));
        assert_eq!(version_key(Path::new("/Qt/Tools")), None);
        assert_eq!(version_key(Path::new("/Qt/6.x")), None);
    }

    #[test]
    fn test_find_qt_bin_uses_windows_suffix() -> Result<()> {
        let temp = TempDir::new()?;
        let bin = temp.path().join("6.7.2").join("bin");
        fs::create_dir_all(&bin)?;
        fs::write(bin.join("qmake"), "")?;

        let roots = vec![temp.path().to_path_buf()];
        assert_eq!(find_qt_bin(&roots, Platform::Windows), None);
        fs::write(bin.join("qmake.exe"), "")?;
        assert_eq!(find_qt_bin(&roots, Platform::Windows), Some(bin));
        Ok(())
    }

    #[test]
    fn test_qt_search_roots() {
        let home = Path::new("/home/dev");
        assert_eq!(
            qt_search_roots(Platform::Linux, Some(home)),
            vec![home.join("Qt"), PathBuf::from("/opt/Qt"), PathBuf::from("/usr/local/Qt")]
        );
        assert_eq!(qt_search_roots(Platform::Macos, None), vec![PathBuf::from("/Applications/Qt")]);
        assert_eq!(qt_search_roots(Platform::Windows, Some(home)).len(), 3);
    }
}
