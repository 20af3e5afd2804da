//! Installation verifier
//!
//! Checks an installation root against a fixed set of required relative
//! paths and classifies each one as found or missing. Absence is never an
//! error; other I/O failures are recorded and the path counts as missing.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::report::{Reporter, Status};

/// Kind of required file. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Executables,
    Headers,
    Libraries,
    PackageMetadata,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Executables,
        Category::Headers,
        Category::Libraries,
        Category::PackageMetadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Executables => "executables",
            Category::Headers => "headers",
            Category::Libraries => "libraries",
            Category::PackageMetadata => "package-metadata",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category → relative paths expected under an installation root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredFileSet {
    files: BTreeMap<Category, Vec<String>>,
}

impl RequiredFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, category: Category, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files
            .entry(category)
            .or_default()
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Files a usable libimobiledevice development tree must provide
    pub fn libimobiledevice() -> Self {
        Self::new()
            .with(
                Category::Executables,
                [
                    "bin/idevice_id.exe",
                    "bin/ideviceinfo.exe",
                    "bin/ideviceinstaller.exe",
                ],
            )
            .with(
                Category::Headers,
                [
                    "include/libimobiledevice/libimobiledevice.h",
                    "include/plist/plist.h",
                ],
            )
            .with(
                Category::Libraries,
                ["lib/libimobiledevice-1.0.dll", "lib/libplist-2.0.dll"],
            )
            .with(
                Category::PackageMetadata,
                [
                    "lib/pkgconfig/libimobiledevice-1.0.pc",
                    "lib/pkgconfig/libplist-2.0.pc",
                ],
            )
    }

    /// Categories in declaration order with their paths
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.files.iter().map(|(c, paths)| (*c, paths.as_slice()))
    }

    pub fn get(&self, category: Category) -> &[String] {
        self.files.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// A path whose existence could not be determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    pub path: String,
    pub message: String,
}

/// Result of one verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationReport {
    pub root: PathBuf,
    pub found: BTreeMap<Category, Vec<String>>,
    pub missing: BTreeMap<Category, Vec<String>>,
    pub errors: Vec<CheckError>,
}

impl InstallationReport {
    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }

    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }

    pub fn found_count(&self) -> usize {
        self.found.values().map(Vec::len).sum()
    }

    pub fn found_in(&self, category: Category) -> &[String] {
        self.found.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn missing_in(&self, category: Category) -> &[String] {
        self.missing.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-file status lines, grouped by category
    pub fn print_details(&self, reporter: &Reporter) {
        // Both maps carry the same categories
        for category in self.missing.keys() {
            reporter.line(&format!("Checking {}:", category));
            for path in self.found_in(*category) {
                reporter.status_with_detail(
                    Status::Success,
                    &format!("{} found", path),
                    &self.root.join(path).display().to_string(),
                );
            }
            for path in self.missing_in(*category) {
                reporter.error(&format!("{} not found", path));
            }
        }
        for err in &self.errors {
            reporter.warning(&format!("Could not check {}: {}", err.path, err.message));
        }
    }

    /// Lists what is missing per category
    pub fn print_missing(&self, reporter: &Reporter) {
        for (category, paths) in &self.missing {
            if paths.is_empty() {
                continue;
            }
            reporter.line(&format!("Missing {}:", category));
            for path in paths {
                reporter.line(&format!("  - {}", path));
            }
        }
    }
}

/// Checks every required path under `root`
pub fn verify_installation(root: &Path, required: &RequiredFileSet) -> InstallationReport {
    let mut report = InstallationReport {
        root: root.to_path_buf(),
        found: BTreeMap::new(),
        missing: BTreeMap::new(),
        errors: Vec::new(),
    };

    let root_exists = root.is_dir();
    if !root_exists {
        log::debug!("Installation root {} does not exist", root.display());
    }

    for (category, paths) in required.iter() {
        let found = report.found.entry(category).or_default();
        let missing = report.missing.entry(category).or_default();

        for rel in paths {
            if !root_exists {
                missing.push(rel.clone());
                continue;
            }
            match std::fs::metadata(root.join(rel)) {
                Ok(_) => found.push(rel.clone()),
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    missing.push(rel.clone())
                }
                Err(e) => {
                    log::warn!("Failed to check {}: {}", root.join(rel).display(), e);
                    missing.push(rel.clone());
                    report.errors.push(CheckError {
                        path: rel.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"x")?;
        Ok(())
    }

    fn assert_partition(report: &InstallationReport, required: &RequiredFileSet) {
        for (category, paths) in required.iter() {
            let mut combined: Vec<String> = report
                .found_in(category)
                .iter()
                .chain(report.missing_in(category))
                .cloned()
                .collect();
            combined.sort();
            let mut expected = paths.to_vec();
            expected.sort();
            assert_eq!(combined, expected, "category {}", category);
            for path in report.found_in(category) {
                assert!(!report.missing_in(category).contains(path));
            }
        }
    }

    #[test]
    fn test_partial_installation() -> Result<()> {
        let temp = TempDir::new()?;
        touch(temp.path(), "a.exe")?;
        let required = RequiredFileSet::new()
            .with(Category::Executables, ["a.exe"])
            .with(Category::Headers, ["h.h"]);

        let report = verify_installation(temp.path(), &required);

        assert_eq!(report.found_in(Category::Executables), ["a.exe".to_string()]);
        assert!(report.found_in(Category::Headers).is_empty());
        assert!(report.missing_in(Category::Executables).is_empty());
        assert_eq!(report.missing_in(Category::Headers), ["h.h".to_string()]);
        // Both categories are present in both maps, even when empty
        assert_eq!(report.found.len(), 2);
        assert_eq!(report.missing.len(), 2);
        assert!(!report.is_complete());
        assert_eq!(report.missing_count(), 1);
        assert_partition(&report, &required);
        Ok(())
    }

    #[test]
    fn test_missing_root_marks_everything_missing() -> Result<()> {
        let temp = TempDir::new()?;
        let required = RequiredFileSet::libimobiledevice();

        let report = verify_installation(&temp.path().join("nope"), &required);

        assert_eq!(report.found_count(), 0);
        assert_eq!(report.missing_count(), required.total());
        for (category, paths) in required.iter() {
            assert_eq!(report.missing_in(category), paths);
        }
        assert!(report.errors.is_empty());
        Ok(())
    }

    #[test]
    fn test_superset_is_complete() -> Result<()> {
        let temp = TempDir::new()?;
        let required = RequiredFileSet::libimobiledevice();
        for (_, paths) in required.iter() {
            for path in paths {
                touch(temp.path(), path)?;
            }
        }
        touch(temp.path(), "bin/idevicebackup2.exe")?;
        touch(temp.path(), "share/doc/README")?;

        let report = verify_installation(temp.path(), &required);

        assert!(report.is_complete());
        assert_eq!(report.found_count(), required.total());
        assert_partition(&report, &required);
        Ok(())
    }

    #[test]
    fn test_file_in_place_of_directory_counts_as_missing() -> Result<()> {
        let temp = TempDir::new()?;
        // `lib` is a file, so `lib/x.dll` cannot exist
        touch(temp.path(), "lib")?;
        let required = RequiredFileSet::new().with(Category::Libraries, ["lib/x.dll"]);

        let report = verify_installation(temp.path(), &required);

        assert_eq!(report.missing_in(Category::Libraries), ["lib/x.dll".to_string()]);
        assert!(report.errors.is_empty());
        Ok(())
    }

    #[test]
    fn test_categories_iterate_in_declaration_order() {
        let required = RequiredFileSet::new()
            .with(Category::PackageMetadata, ["p.pc"])
            .with(Category::Executables, ["e.exe"])
            .with(Category::Headers, ["h.h"]);
        let order: Vec<Category> = required.iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![Category::Executables, Category::Headers, Category::PackageMetadata]
        );
        assert_eq!(Category::ALL[3].name(), "package-metadata");
    }
}
