//! Operator-facing status output
//!
//! Every command prints through a [`Reporter`] so `--quiet` can suppress
//! everything except errors in one place.

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Progress,
}

impl Status {
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Error => "✗",
            Status::Warning => "⚠",
            Status::Info => "ℹ",
            Status::Progress => "►",
        }
    }
}

/// Centralized status reporting for all commands
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Print a status line with its symbol
    pub fn status(&self, status: Status, message: &str) {
        if self.quiet && status != Status::Error {
            return;
        }
        println!("{} {}", status.symbol(), message);
    }

    /// Status line followed by an indented detail line
    pub fn status_with_detail(&self, status: Status, message: &str, detail: &str) {
        self.status(status, message);
        if self.quiet && status != Status::Error {
            return;
        }
        println!("    {}", detail);
    }

    pub fn success(&self, message: &str) {
        self.status(Status::Success, message);
    }

    pub fn error(&self, message: &str) {
        self.status(Status::Error, message);
    }

    pub fn warning(&self, message: &str) {
        self.status(Status::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.status(Status::Info, message);
    }

    pub fn progress(&self, message: &str) {
        self.status(Status::Progress, message);
    }

    /// Indented free-form line under the previous status
    pub fn detail(&self, message: &str) {
        if !self.quiet {
            println!("    {}", message);
        }
    }

    /// Plain line without a symbol
    pub fn line(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// `=== title ===` heading preceded by a blank line
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!();
            println!("=== {} ===", title);
        }
    }

    /// Boxed banner used for command headers and summaries
    pub fn banner(&self, title: &str, width: usize) {
        if !self.quiet {
            let rule = "=".repeat(width);
            println!("{}", rule);
            println!("{}", title);
            println!("{}", rule);
        }
    }

    pub fn rule(&self, width: usize) {
        if !self.quiet {
            println!("{}", "=".repeat(width));
        }
    }

    pub fn blank(&self) {
        if !self.quiet {
            println!();
        }
    }
}

/// Human-readable byte count (`512 B`, `1.5 MB`, `4.2 GB`)
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
