//! CLI: boot a machine into Nautilus over its SOL console.

use anyhow::{Context, Result};
use clap::Parser;
use solboot::{
    BootScript, CancellationToken, ConsoleCommand, EchoTarget, SessionBuilder, SessionLifecycle,
    MENU_DOWN_PRESSES,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "solboot")]
#[command(author, version, about = "Drive a SOL console through the boot menu into Nautilus", long_about = None)]
struct Args {
    /// Console command; receives this process's full environment
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        default_values_t = ["./scripts/ipmi_helper.sh".to_string(), "console".to_string()]
    )]
    command: Vec<String>,

    /// Write console output to this file instead of stdout
    #[arg(long, env = "SOLBOOT_CONSOLE_LOG")]
    console_log: Option<PathBuf>,

    /// Do not echo console output
    #[arg(short, long)]
    quiet: bool,

    /// Seconds to wait for the console to exit after the quit sequence
    #[arg(long, env = "SOLBOOT_EXIT_TIMEOUT", default_value_t = 30)]
    exit_timeout: u64,

    /// Cap on buffered, unmatched console output, in bytes
    #[arg(long, env = "SOLBOOT_MAX_BUFFER", default_value_t = 64 * 1024)]
    max_buffer: usize,

    /// Cursor-down presses from the default GRUB entry to Nautilus
    #[arg(long, env = "SOLBOOT_DOWN_PRESSES", default_value_t = MENU_DOWN_PRESSES)]
    down_presses: usize,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "solboot=info",
        1 => "solboot=debug",
        _ => "solboot=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the raw console echo
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let command = ConsoleCommand::from_argv(args.command.as_slice())
        .context("no console command given")?
        .inherit_env();

    let echo = match (&args.console_log, args.quiet) {
        (_, true) => EchoTarget::Off,
        (Some(path), false) => EchoTarget::File(path.clone()),
        (None, false) => EchoTarget::Stdout,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("keyboard interrupt");
            on_signal.cancel();
        }
    });

    let builder = SessionBuilder::new()
        .echo(echo)
        .exit_timeout(Duration::from_secs(args.exit_timeout))
        .max_buffer_size(args.max_buffer);

    let report = SessionLifecycle::new(command)
        .session_builder(builder)
        .cancel_token(cancel)
        .run(&BootScript::nautilus_with_down_presses(args.down_presses))
        .await
        .with_context(|| format!("failed to start console command {:?}", args.command))?;

    match &report.outcome {
        Ok(_) => eprintln!("✓ boot reached the Nautilus shell"),
        Err(e) => eprintln!("✗ {e}"),
    }
    if let Some(e) = &report.teardown_error {
        eprintln!("  (console did not close cleanly: {e})");
    }

    std::process::exit(report.exit_code());
}
