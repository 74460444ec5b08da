//! pandeps CLI binary.
//!
//! This is the entry point for the `pandeps` command-line tool. It initializes
//! logging via `tracing`, parses arguments with `clap`, and dispatches to
//! the appropriate command handler.

mod cli;
mod commands;

use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse();

    let level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
    tracing::debug!("pandeps {}", env!("CARGO_PKG_VERSION"));

    commands::dispatch(args).await
}
