//! check-deps: diagnoses a Windows libimobiledevice setup
//!
//! Locates the installation, verifies its files, probes pkg-config, the
//! device listing and the build tools, inspects an existing CMake cache and
//! finally offers to install what is missing.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::deps::{windows, WorkDir};
use crate::env_config::PKG_CONFIG_PATH_VAR;
use crate::error::is_cancelled;
use crate::locate;
use crate::platform::Platform;
use crate::process::{CommandOutput, CommandSpec, PROBE_TIMEOUT};
use crate::session::Session;
use crate::verify::{verify_installation, InstallationReport, RequiredFileSet};

/// Modules queried through pkg-config
pub const PKG_CONFIG_MODULES: &[&str] = &["libimobiledevice-1.0", "libplist-2.0", "libusbmuxd-2.0"];

/// CMake cache entries that tell whether the build found libimobiledevice
pub const CMAKE_CACHE_VARS: &[&str] = &[
    "LIBIMOBILEDEVICE_AVAILABLE",
    "HAVE_LIBIMOBILEDEVICE",
    "IMOBILEDEVICE_FOUND",
    "PLIST_FOUND",
    "IMOBILEDEVICE_INCLUDE_DIRS",
    "IMOBILEDEVICE_LIBRARIES",
];

const VCPKG_HINTS: &[&str] = &[
    "vcpkg install libimobiledevice:x64-windows",
    "vcpkg install libplist:x64-windows",
];

/// Options for `check-deps`
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Skip the diagnostics and install when nothing is found
    pub install: bool,
    /// Offer installation at the end of a full check
    pub interactive: bool,
    /// Directory holding `thirdparty/` and `build/`
    pub project_root: PathBuf,
}

impl CheckOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            install: false,
            interactive: true,
            project_root: project_root.into(),
        }
    }
}

/// Classification of a CMake cache value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFlag {
    Enabled,
    Disabled,
    Other,
}

pub fn classify_cache_value(value: &str) -> CacheFlag {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => CacheFlag::Enabled,
        "false" | "0" | "off" => CacheFlag::Disabled,
        _ => CacheFlag::Other,
    }
}

/// Parses `KEY:TYPE=VALUE` and `KEY=VALUE` lines; comments are skipped
pub fn parse_cmake_cache(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let name = key.split_once(':').map(|(name, _)| name).unwrap_or(key);
            (name.trim().to_string(), value.trim_end_matches('\r').to_string())
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Where the CMake cache search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    NoBuildDir,
    NoCache { build_dir: PathBuf },
    Found(PathBuf),
}

/// Looks for `build/CMakeCache.txt` in the project, then next to it
pub fn find_cmake_cache(project_root: &Path) -> CacheLookup {
    let candidates = [
        project_root.join("build"),
        project_root.join("..").join("build"),
    ];
    let Some(build_dir) = candidates.into_iter().find(|d| d.is_dir()) else {
        return CacheLookup::NoBuildDir;
    };
    let cache = build_dir.join("CMakeCache.txt");
    if cache.is_file() {
        CacheLookup::Found(cache)
    } else {
        CacheLookup::NoCache { build_dir }
    }
}

struct Checker<'s, 'a> {
    session: &'s Session<'a>,
    project_root: PathBuf,
    root: Option<PathBuf>,
    report: Option<InstallationReport>,
    pkg_config_available: bool,
}

impl<'s, 'a> Checker<'s, 'a> {
    fn new(session: &'s Session<'a>, project_root: &Path) -> Self {
        Self {
            session,
            project_root: project_root.to_path_buf(),
            root: None,
            report: None,
            pkg_config_available: false,
        }
    }

    /// Runs a probe; a command that cannot start is `None`
    fn probe(&self, spec: &CommandSpec) -> Result<Option<CommandOutput>> {
        match self.session.runner.run(spec) {
            Ok(output) => Ok(Some(output)),
            Err(e) if is_cancelled(&e) => Err(e),
            Err(e) => {
                log::debug!("'{}' could not run: {:#}", spec.display(), e);
                Ok(None)
            }
        }
    }

    fn detect_system(&self) -> bool {
        let reporter = &self.session.reporter;
        reporter.section("System");
        reporter.line(&format!("Operating system: {}", self.session.platform));
        reporter.line(&format!("Architecture: {}", self.session.arch));
        if self.session.platform == Platform::Windows {
            reporter.success("Windows detected");
            true
        } else {
            reporter.error(&format!(
                "This check is for Windows; current system: {}",
                self.session.platform
            ));
            false
        }
    }

    fn check_privileges(&self) {
        let reporter = &self.session.reporter;
        reporter.section("Administrator privileges");
        if self.session.elevated {
            reporter.success("Sufficient system access");
        } else {
            reporter.warning("Not running as administrator");
            reporter.info("Some installation steps may need administrator rights");
        }
    }

    fn locate(&mut self) -> Option<PathBuf> {
        let reporter = self.session.reporter;
        reporter.section("libimobiledevice location");
        self.root = locate::find_libimobiledevice(&self.project_root);
        match &self.root {
            Some(root) => reporter.success(&format!("Found libimobiledevice: {}", root.display())),
            None => reporter.error("libimobiledevice not found"),
        }
        self.root.clone()
    }

    fn check_files(&mut self) {
        let reporter = self.session.reporter;
        reporter.section("Required files");
        let Some(root) = &self.root else {
            reporter.error("Cannot check files: no installation found");
            return;
        };
        let report = verify_installation(root, &RequiredFileSet::libimobiledevice());
        report.print_details(&reporter);
        self.report = Some(report);
    }

    fn check_pkg_config(&mut self) -> Result<()> {
        let reporter = self.session.reporter;
        reporter.section("pkg-config");

        let version = self.probe(&CommandSpec::new("pkg-config").arg("--version"))?;
        match version {
            Some(output) if output.success() => {
                reporter.success(&format!("pkg-config installed: {}", output.stdout.trim()));
                self.pkg_config_available = true;
            }
            _ => {
                reporter.error("pkg-config not found");
                reporter.info("pkg-config is optional but improves library detection");
                return Ok(());
            }
        }

        match std::env::var(PKG_CONFIG_PATH_VAR) {
            Ok(value) if !value.is_empty() => {
                reporter.info(&format!("{}: {}", PKG_CONFIG_PATH_VAR, value))
            }
            _ => {
                reporter.warning(&format!("{} is not set", PKG_CONFIG_PATH_VAR));
                if let Some(root) = &self.root {
                    reporter.info(&format!(
                        "Suggested: {}",
                        root.join("lib").join("pkgconfig").display()
                    ));
                }
            }
        }
        Ok(())
    }

    fn query_pkg_config(&self) -> Result<()> {
        if !self.pkg_config_available {
            return Ok(());
        }
        let reporter = &self.session.reporter;
        reporter.section("pkg-config queries");

        for &module in PKG_CONFIG_MODULES {
            let query = |flag: &str| -> Result<Option<String>> {
                let output = self.probe(&CommandSpec::new("pkg-config").args([flag, module]))?;
                Ok(output
                    .filter(CommandOutput::success)
                    .map(|o| o.stdout.trim().to_string()))
            };

            if query("--exists")?.is_none() {
                reporter.error(&format!("{} cannot be queried", module));
                continue;
            }
            match (query("--modversion")?, query("--cflags")?, query("--libs")?) {
                (Some(version), Some(cflags), Some(libs)) => {
                    reporter.success(&format!("{} is queryable", module));
                    reporter.detail(&format!("Version: {}", version));
                    reporter.detail(&format!("CFLAGS: {}", cflags));
                    reporter.detail(&format!("LIBS: {}", libs));
                }
                _ => reporter.error(&format!("{} cannot be queried", module)),
            }
        }
        Ok(())
    }

    fn test_devices(&self) -> Result<()> {
        let reporter = &self.session.reporter;
        reporter.section("Device connection");
        let Some(root) = &self.root else {
            reporter.error("Cannot test: libimobiledevice not found");
            return Ok(());
        };
        let exe = root.join("bin").join("idevice_id.exe");
        if !exe.is_file() {
            reporter.error("idevice_id.exe does not exist");
            return Ok(());
        }

        let output = self.probe(&CommandSpec::new(&exe).arg("-l").timeout(PROBE_TIMEOUT))?;
        match output {
            Some(o) if o.timed_out => reporter.warning("Device detection timed out"),
            Some(o) if o.success() => {
                let devices = crate::deps::parse_device_list(&o.stdout);
                if devices.is_empty() {
                    reporter.warning("No connected devices");
                    reporter.info("Connect the iOS device and trust this computer");
                } else {
                    reporter.success(&format!("Found {} device(s)", devices.len()));
                    for (i, device) in devices.iter().enumerate() {
                        reporter.detail(&format!("Device {}: {}", i + 1, device));
                    }
                }
            }
            Some(o) => {
                reporter.error(&format!("Device detection failed ({})", o.failure_reason()));
            }
            None => reporter.error("Device detection could not run"),
        }
        Ok(())
    }

    fn check_build_tools(&self) -> Result<()> {
        let reporter = &self.session.reporter;
        reporter.section("Build tools");

        match self.probe(&CommandSpec::new("cl.exe"))? {
            Some(output) => match output.stderr.lines().find(|l| l.contains("Microsoft")) {
                Some(banner) => {
                    reporter.success("MSVC compiler (cl.exe) available");
                    reporter.detail(banner.trim());
                }
                None => reporter.error("MSVC compiler is not usable"),
            },
            None => {
                reporter.error("MSVC compiler (cl.exe) not found");
                reporter.info("Install Visual Studio 2019/2022 with C++ support");
            }
        }

        match self.probe(&CommandSpec::new("cmake").arg("--version"))? {
            Some(output) if output.success() => {
                let first = output.stdout.lines().next().unwrap_or_default();
                reporter.success(&format!("CMake available: {}", first));
            }
            _ => {
                reporter.error("CMake not found");
                reporter.info("Install CMake from https://cmake.org/download/");
            }
        }
        Ok(())
    }

    fn check_cmake_cache(&self) -> Result<()> {
        let reporter = &self.session.reporter;
        reporter.section("CMake configuration");

        let cache = match find_cmake_cache(&self.project_root) {
            CacheLookup::NoBuildDir => {
                reporter.info("No build directory; run the CMake configure step first");
                return Ok(());
            }
            CacheLookup::NoCache { build_dir } => {
                reporter.warning(&format!(
                    "No CMakeCache.txt in {}; reconfigure may be needed",
                    build_dir.display()
                ));
                return Ok(());
            }
            CacheLookup::Found(cache) => cache,
        };
        reporter.success(&format!("Found CMake cache: {}", cache.display()));

        let content = match std::fs::read_to_string(&cache)
            .with_context(|| format!("Failed to read {}", cache.display()))
        {
            Ok(content) => content,
            Err(e) => {
                reporter.error(&format!("{:#}", e));
                return Ok(());
            }
        };
        let vars = parse_cmake_cache(&content);

        reporter.line("CMake variables:");
        for name in CMAKE_CACHE_VARS {
            match vars.get(*name) {
                Some(value) => {
                    let line = format!("{}: {}", name, value);
                    match classify_cache_value(value) {
                        CacheFlag::Enabled => reporter.success(&line),
                        CacheFlag::Disabled => reporter.error(&line),
                        CacheFlag::Other => reporter.info(&line),
                    }
                }
                None => reporter.warning(&format!("{}: undefined", name)),
            }
        }
        Ok(())
    }

    fn advise(&self) {
        let reporter = &self.session.reporter;
        reporter.blank();
        reporter.banner("Installation advice", 50);

        match (&self.root, &self.report) {
            (None, _) => {
                reporter.warning("libimobiledevice is not installed");
                reporter.blank();
                reporter.line("Recommended:");
                reporter.line("1. Run the dependency installer:");
                reporter.line("   linkc-setup install-deps");
                reporter.line("   or: linkc-setup check-deps --install");
                reporter.blank();
                reporter.line("2. Install with vcpkg:");
                for hint in VCPKG_HINTS {
                    reporter.line(&format!("   {}", hint));
                }
            }
            (Some(_), Some(report)) if !report.is_complete() => {
                reporter.warning("libimobiledevice installation is incomplete");
                reporter.blank();
                report.print_missing(reporter);
                reporter.blank();
                reporter.line("Suggested fixes:");
                reporter.line("1. Reinstall libimobiledevice");
                reporter.line("2. Check that the package is complete");
                reporter.line("3. Check the installation path");
            }
            (Some(_), _) => reporter.success("libimobiledevice installation is complete"),
        }
    }

    fn summarize(&self) {
        let reporter = &self.session.reporter;
        reporter.blank();
        reporter.banner("Check summary", 50);
        reporter.line(&format!("System: {} {}", self.session.platform, self.session.arch));

        match &self.root {
            Some(root) => reporter.success(&format!("libimobiledevice: installed ({})", root.display())),
            None => reporter.error("libimobiledevice: not installed"),
        }
        if self.pkg_config_available {
            reporter.success("pkg-config: available");
        } else {
            reporter.warning("pkg-config: not available");
        }

        reporter.blank();
        reporter.line("Next steps:");
        if self.root.is_none() {
            reporter.line("1. Install libimobiledevice");
            reporter.line("2. Re-run this check");
            reporter.line("3. Build the project");
        } else {
            reporter.line("1. Build the project");
            reporter.line("2. Connect an iOS device to test");
            reporter.line("3. Re-run this check if something fails");
        }
    }

    fn auto_install(&mut self) -> Result<bool> {
        let reporter = self.session.reporter;
        reporter.section("Installing libimobiledevice");

        let work_dir = WorkDir::create(None)?;
        let installed =
            windows::install_libimobiledevice(self.session, &self.project_root, work_dir.path())?;
        if installed {
            reporter.success("Automatic installation finished");
            self.locate();
            Ok(self.root.is_some())
        } else {
            reporter.error("Automatic installation failed");
            Ok(false)
        }
    }

    fn full_check(&mut self) -> Result<bool> {
        self.session.reporter.banner("iOS device manager - dependency check", 50);
        if !self.detect_system() {
            return Ok(false);
        }
        self.check_privileges();
        self.locate();
        self.check_files();
        self.check_pkg_config()?;
        self.query_pkg_config()?;
        self.test_devices()?;
        self.check_build_tools()?;
        self.check_cmake_cache()?;
        self.advise();
        self.summarize();
        Ok(true)
    }
}

/// Runs `check-deps`. Returns `false` when the command should exit with failure.
pub fn run_check(session: &Session, options: &CheckOptions) -> Result<bool> {
    let mut checker = Checker::new(session, &options.project_root);

    if options.install {
        if !checker.detect_system() {
            return Ok(false);
        }
        if checker.locate().is_some() {
            return Ok(true);
        }
        return checker.auto_install();
    }

    if !checker.full_check()? {
        return Ok(false);
    }

    if checker.root.is_none() && options.interactive && !session.reporter.is_quiet() {
        session.reporter.blank();
        if session
            .prompt
            .confirm("Install libimobiledevice automatically?", false)?
        {
            return checker.auto_install();
        }
        session
            .reporter
            .info("Install libimobiledevice manually, then re-run this check");
    }
    Ok(true)
}
