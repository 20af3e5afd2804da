//! Ordered download sources for a single artifact

use crate::error::SetupError;
use crate::platform::{Arch, Platform};

/// One place an artifact can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCandidate {
    /// Short name for diagnostics ("Aliyun", "Qt Project", ...)
    pub name: String,
    pub base_url: String,
    pub artifact_filename: String,
}

impl MirrorCandidate {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        artifact_filename: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            artifact_filename: artifact_filename.into(),
        }
    }

    /// Splits a full artifact URL at its last `/`
    pub fn from_url(name: impl Into<String>, url: &str) -> Self {
        match url.rsplit_once('/') {
            Some((base, file)) => Self::new(name, base, file),
            None => Self::new(name, "", url),
        }
    }

    pub fn url(&self) -> String {
        if self.base_url.is_empty() {
            return self.artifact_filename.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.artifact_filename
        )
    }
}

/// Non-empty, ordered list of candidates; the first is preferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorList {
    candidates: Vec<MirrorCandidate>,
}

impl MirrorList {
    pub fn new(candidates: Vec<MirrorCandidate>) -> Result<Self, SetupError> {
        if candidates.is_empty() {
            return Err(SetupError::EmptyMirrorList);
        }
        Ok(Self { candidates })
    }

    pub fn single(candidate: MirrorCandidate) -> Self {
        Self {
            candidates: vec![candidate],
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn preferred(&self) -> &MirrorCandidate {
        &self.candidates[0]
    }

    /// Candidates with their 1-based position
    pub fn iter(&self) -> impl Iterator<Item = (usize, &MirrorCandidate)> {
        self.candidates.iter().enumerate().map(|(i, c)| (i + 1, c))
    }
}

/// Mirror used both for the installer download and for the installer's own package fetches
pub const QT_INSTALLER_MIRROR: &str = "https://mirrors.aliyun.com/qt";

const QT_MIRRORS: &[(&str, &str)] = &[
    (
        "Aliyun",
        "https://mirrors.aliyun.com/qt/official_releases/online_installers",
    ),
    (
        "Qt Project",
        "https://download.qt.io/official_releases/online_installers",
    ),
    (
        "TUNA",
        "https://mirrors.tuna.tsinghua.edu.cn/qt/official_releases/online_installers",
    ),
    (
        "USTC",
        "https://mirrors.ustc.edu.cn/qtproject/official_releases/online_installers",
    ),
];

/// File name of the Qt online installer for a platform
pub fn qt_installer_filename(platform: Platform, arch: Arch) -> String {
    let name = match platform {
        Platform::Windows => "qt-online-installer-windows-x64-online.exe",
        Platform::Linux => "qt-online-installer-linux-x64-online.run",
        Platform::Macos => "qt-online-installer-mac-x64-online.dmg",
    };
    // Only the Windows installer ships a 32-bit build
    if platform == Platform::Windows && arch == Arch::X86 {
        name.replace("x64", "x86")
    } else {
        name.to_string()
    }
}

/// Qt online installer sources, preferred mirror first
pub fn qt_mirrors(platform: Platform, arch: Arch) -> MirrorList {
    let filename = qt_installer_filename(platform, arch);
    MirrorList {
        candidates: QT_MIRRORS
            .iter()
            .map(|(name, base)| MirrorCandidate::new(*name, *base, filename.clone()))
            .collect(),
    }
}
