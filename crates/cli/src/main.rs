// creatio-fs CLI entry point.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod connect;
mod exit_code;
mod output;

use connect::ConnectArgs;
use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "creatio-fs", about = "Browse and edit Creatio schemas as files")]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();

    match commands::run(cli.command, &cli.connect) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => ExitCode::from_error(&error).into(),
    }
}
