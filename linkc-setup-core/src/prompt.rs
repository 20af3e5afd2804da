use anyhow::{Context, Result};
use std::io::Write;

use crate::cancel::Cancellation;
use crate::error::SetupError;

/// Yes/no questions asked during installation
pub trait Prompt {
    /// Ask `question`; an empty answer selects `default`
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;
}

/// Reads answers from stdin
pub struct TerminalPrompt {
    cancel: Cancellation,
}

impl TerminalPrompt {
    pub fn new(cancel: Cancellation) -> Self {
        Self { cancel }
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{} {}: ", question, hint);
        std::io::stdout().flush()?;

        let mut response = String::new();
        let read = std::io::stdin()
            .read_line(&mut response)
            .context("Failed to read answer from stdin")?;

        // Ctrl+C while waiting on stdin only lands once the line is submitted
        self.cancel.check()?;
        if read == 0 {
            // EOF: nobody is there to answer
            println!();
            return Err(SetupError::Cancelled.into());
        }

        Ok(parse_answer(&response, default))
    }
}

/// Answers every question with its default. Used by `--no-interactive`.
pub struct Unattended;

impl Prompt for Unattended {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        log::debug!("Unattended answer to '{}': {}", question, default);
        Ok(default)
    }
}

fn parse_answer(response: &str, default: bool) -> bool {
    match response.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n", false));
        assert!(parse_answer("  YES ", false));
        assert!(!parse_answer("n\n", true));
        assert!(!parse_answer("maybe", true));
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("", false));
    }

    #[test]
    fn test_unattended_uses_defaults() -> Result<()> {
        assert!(Unattended.confirm("Proceed?", true)?);
        assert!(!Unattended.confirm("Delete files?", false)?);
        Ok(())
    }
}
