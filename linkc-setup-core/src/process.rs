//! Subprocess invocation with timeouts
//!
//! Every external command (package managers, native installers, probes such as
//! `pkg-config --version`) goes through a [`CommandRunner`]. The system runner
//! kills a child that outlives its timeout and reports it as
//! [`CommandOutput::timed_out`] instead of an error, so callers can treat it
//! as a failed step.

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crate::cancel::Cancellation;
use crate::error::SetupError;

/// Timeout for quick probes (`--version`, `--help`, device listing)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for a single package-manager invocation
pub const PACKAGE_TIMEOUT: Duration = Duration::from_secs(300);
/// Timeout for the Apple driver installer and the auto-install run
pub const DRIVER_INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Timeout for the interactive Qt installer
pub const INTERACTIVE_INSTALL_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long pipes may stay open after the child exited on its own
const EXITED_READER_GRACE: Duration = Duration::from_secs(5);
/// How long pipes may stay open after the child was killed
const KILLED_READER_GRACE: Duration = Duration::from_millis(300);

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// stdout/stderr are captured; stdin stays on the terminal so `sudo` can ask for a password
    Capture,
    /// The child owns the terminal (interactive installers)
    Inherit,
}

/// A command to run
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    pub output: Output,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            timeout: PROBE_TIMEOUT,
            output: Output::Capture,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.output = Output::Inherit;
        self
    }

    /// Prefix the command with `sudo`
    pub fn with_sudo(mut self) -> Self {
        self.args.insert(0, std::mem::replace(&mut self.program, OsString::from("sudo")));
        self
    }

    /// Command line for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command that could be started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal or on timeout
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Short description of why the command failed
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let code = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            code
        } else {
            format!("{}: {}", code, stderr)
        }
    }
}

/// Runs external commands
///
/// `Err` means the command could not be run at all (not found, not
/// executable) or the user cancelled; a non-zero exit or a timeout is an
/// `Ok` output.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Resolves a program on `PATH`
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Runs commands on the host
pub struct SystemRunner {
    cancel: Cancellation,
}

impl SystemRunner {
    pub fn new(cancel: Cancellation) -> Self {
        Self { cancel }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.cancel.check()?;
        log::debug!("Running: {} (timeout {:?})", spec.display(), spec.timeout);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        match spec.output {
            Output::Capture => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            Output::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start '{}'", spec.display()))?;

        // Drain pipes while waiting so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let waited = wait_with_timeout(&mut child, spec.timeout, &self.cancel);

        // A killed child's own children may still hold the pipes open
        let grace = match &waited {
            Ok((_, false)) => EXITED_READER_GRACE,
            _ => KILLED_READER_GRACE,
        };
        let stdout = stdout.map(|r| collect_reader(r, grace)).unwrap_or_default();
        let stderr = stderr.map(|r| collect_reader(r, grace)).unwrap_or_default();

        let (code, timed_out) = waited?;
        let output = CommandOutput {
            code,
            stdout,
            stderr,
            timed_out,
        };
        log::debug!(
            "'{}' finished: code={:?} timed_out={}",
            spec.display(),
            output.code,
            output.timed_out
        );
        Ok(output)
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    cancel: &Cancellation,
) -> Result<(Option<i32>, bool)> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("Failed to wait for child process")? {
            return Ok((status.code(), false));
        }
        if cancel.is_cancelled() {
            kill_quietly(child);
            return Err(SetupError::Cancelled.into());
        }
        if started.elapsed() >= timeout {
            log::warn!("Command exceeded {:?}, killing it", timeout);
            kill_quietly(child);
            return Ok((None, true));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill child process: {}", e);
    }
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        let _ = tx.send(String::from_utf8_lossy(&bytes).into_owned());
    });
    rx
}

/// Waits up to `grace` for a pipe to reach EOF; the reader thread is abandoned after that
fn collect_reader(rx: Receiver<String>, grace: Duration) -> String {
    match rx.recv_timeout(grace) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("Output pipe still open after {:?}, dropping it", grace);
            String::new()
        }
    }
}
