//! Installer and dependency tooling for the linkc iOS device manager
//!
//! Three commands are built on the pieces in this crate:
//! - `install-qt` downloads the Qt online installer from the first mirror that answers
//! - `check-deps` diagnoses the libimobiledevice toolchain and can install it
//! - `install-deps` installs the device-communication stack with the platform's package manager

pub mod archive;
pub mod download;
pub mod env_config;
pub mod hash;
pub mod locate;
pub mod mirrors;
pub mod platform;
pub mod process;
pub mod verify;

// Internal modules (private)
mod cancel;
mod deps;
mod deps_check;
mod error;
mod prompt;
mod qt;
mod report;
mod session;

pub use cancel::Cancellation;
pub use deps::{run_install, InstallOptions};
pub use deps_check::{run_check, CheckOptions};
pub use download::{DownloadEvent, HttpTransport, Transport};
pub use error::{is_cancelled, SetupError};
pub use platform::{Arch, Platform};
pub use process::{CommandRunner, SystemRunner};
pub use prompt::{Prompt, TerminalPrompt, Unattended};
pub use qt::{run_install_qt, QtInstallOptions};
pub use report::{format_size, Reporter, Status};
pub use session::Session;
