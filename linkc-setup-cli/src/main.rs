use anyhow::{Context, Result};
use linkc_setup_core::{
    is_cancelled, run_check, run_install, run_install_qt, Cancellation, CheckOptions,
    DownloadEvent, HttpTransport, InstallOptions, Platform, Prompt, QtInstallOptions, Reporter,
    Session, SystemRunner, TerminalPrompt, Unattended,
};

mod cli;
mod progress;

use cli::Command;
use progress::DownloadBar;

fn main() {
    let args = cli::parse_args();

    // Initialize logger with appropriate level based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let code = match run(args.command) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) if is_cancelled(&e) => {
            eprintln!("\nCancelled by user");
            1
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run(command: Command) -> Result<bool> {
    let cancel = Cancellation::new();
    install_interrupt_handler(&cancel)?;

    let platform = Platform::detect()?;
    let (quiet, interactive) = match &command {
        Command::CheckDeps {
            quiet,
            no_interactive,
            ..
        } => (*quiet, !*no_interactive),
        Command::InstallQt | Command::InstallDeps { .. } => (false, true),
    };

    let prompt: Box<dyn Prompt> = if interactive {
        Box::new(TerminalPrompt::new(cancel.clone()))
    } else {
        Box::new(Unattended)
    };
    let runner = SystemRunner::new(cancel.clone());
    let transport = HttpTransport::new()?;
    let bar = DownloadBar::new(!quiet);
    let on_event = |event: &DownloadEvent| bar.handle(event);

    let session = Session::new(
        platform,
        Reporter::new(quiet),
        cancel,
        prompt.as_ref(),
        &runner,
        &transport,
    )
    .with_progress(&on_event);
    log::debug!(
        "Platform: {} ({}), elevated: {}",
        session.platform,
        session.arch,
        session.elevated
    );

    let project_root = std::env::current_dir().context("Failed to read the current directory")?;

    match command {
        Command::InstallQt => run_install_qt(&session, &QtInstallOptions::default()),
        Command::CheckDeps {
            install,
            no_interactive,
            ..
        } => {
            let mut options = CheckOptions::new(project_root);
            options.install = install;
            options.interactive = !no_interactive;
            run_check(&session, &options)
        }
        Command::InstallDeps {
            skip_itunes,
            temp_dir,
            no_tests,
        } => {
            let mut options = InstallOptions::new(project_root);
            options.skip_itunes = skip_itunes;
            options.temp_dir = temp_dir;
            options.run_tests = !no_tests;
            let installed = run_install(&session, &options)?;
            if installed {
                println!("\nRun 'linkc-setup check-deps' to verify installation.");
            }
            Ok(installed)
        }
    }
}

/// First Ctrl+C raises the cancellation flag, a second one exits immediately
fn install_interrupt_handler(cancel: &Cancellation) -> Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(1);
        }
        cancel.cancel();
        eprintln!("\nInterrupted, stopping after the current step...");
    })
    .context("Failed to install the Ctrl+C handler")
}
