//! Scribe CLI - wiki document lifecycle engine.
//!
//! Every command opens the JSON snapshot store, runs one lifecycle
//! operation and writes the snapshot back:
//! - `create`, `edit`, `revert`, `clean`: revision ledger
//! - `show`, `history`: inspection
//! - `render`, `schedule`, `sweep`, `work`: render scheduler
//! - `move`, `conflicts`, `repair-breadcrumbs`: tree and translation links
//! - `delete`, `restore`, `purge`: document removal

mod commands;
mod error;
mod output;
mod session;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Command;
use output::Output;
use session::GlobalArgs;

/// Scribe - wiki document lifecycle engine.
#[derive(Parser)]
#[command(name = "scribe", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.command.execute(&cli.global, &output) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
