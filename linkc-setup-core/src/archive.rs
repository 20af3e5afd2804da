//! Zip extraction and directory tree helpers

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Extracts a ZIP archive into `dest_dir`, creating it if needed
///
/// Entries with absolute paths or `..` components are rejected.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {}", i))?;

        let relative: PathBuf = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .with_context(|| format!("Unsafe path in archive: {}", entry.name()))?;
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            anyhow::bail!("Unsafe path in archive: {}", relative.display());
        }

        let out_path = dest_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create directory: {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create file: {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract: {}", out_path.display()))?;
    }

    log::debug!(
        "Extracted {} entries from {} into {}",
        archive.len(),
        archive_path.display(),
        dest_dir.display()
    );
    Ok(())
}

/// Finds the first directory under `root` (inclusive) that directly contains `file_name`
pub fn find_dir_containing(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == file_name)
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

/// Recursively copies `src` into `dest`, creating `dest` as needed
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} is outside {}", entry.path().display(), src.display()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Replaces `dest` with a copy of `src`
pub fn replace_tree(src: &Path, dest: &Path) -> Result<u64> {
    if dest.exists() {
        fs::remove_dir_all(dest)
            .with_context(|| format!("Failed to remove existing directory: {}", dest.display()))?;
    }
    copy_tree(src, dest)
}
