use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Outcome of comparing a file against an expected digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    /// No digest configured
    Skipped,
    Matched,
    Mismatched { expected: String, actual: String },
}

/// Compares the file's SHA-256 with `expected` (hex, any case). An empty
/// `expected` skips the check.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<HashCheck> {
    let expected = expected.trim();
    if expected.is_empty() {
        return Ok(HashCheck::Skipped);
    }

    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(HashCheck::Matched)
    } else {
        Ok(HashCheck::Mismatched {
            expected: expected.to_lowercase(),
            actual,
        })
    }
}
