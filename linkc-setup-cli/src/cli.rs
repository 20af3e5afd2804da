use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sets up Qt and libimobiledevice for the linkc device manager
#[derive(Parser, Debug)]
#[command(name = "linkc-setup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Installs Qt and the iOS device-communication toolchain", long_about = None)]
pub struct Args {
    /// Verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download and launch the Qt online installer
    InstallQt,

    /// Check the libimobiledevice installation and build configuration
    CheckDeps {
        /// Install libimobiledevice when it is not found, skipping diagnostics
        #[arg(long = "install")]
        install: bool,

        /// Never ask questions
        #[arg(long = "no-interactive")]
        no_interactive: bool,

        /// Only print errors
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,
    },

    /// Install the device-communication dependencies for this platform
    InstallDeps {
        /// Do not install the Apple Mobile Device driver (Windows)
        #[arg(long = "skip-itunes")]
        skip_itunes: bool,

        /// Work directory for downloads and extraction; kept afterwards
        #[arg(long = "temp-dir", value_name = "PATH")]
        temp_dir: Option<PathBuf>,

        /// Skip the post-install device tests
        #[arg(long = "no-tests")]
        no_tests: bool,
    },
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
