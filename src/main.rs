//! ted - The Entertainment District
//!
//! Find torrent streams and resolve them: play through Real-Debrid, or
//! queue on a self-hosted RDT Client.
//!
//! # Usage
//!
//! ```bash
//! ted streams tt1856101 --json
//! ted watch "magnet:?xt=urn:btih:..."
//! ted download "magnet:?xt=urn:btih:..." --type series
//! ted status
//! ```

mod cli;
mod commands;

use clap::Parser;

use ted::logging::init_logging;
use ted::Config;

use crate::cli::{Cli, Command, ExitCode, Output};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // best effort: a subscriber may already be installed
    let _ = init_logging(cli.verbose);

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match cli.config.as_deref() {
        Some(path) => match Config::load_from(path) {
            Ok(c) => c,
            Err(e) => return output.error(format!("{:#}", e), ExitCode::ConfigError),
        },
        None => Config::load(),
    };

    match cli.command {
        Command::Streams(cmd) => commands::streams_cmd(cmd, &config, &output).await,

        Command::Download(cmd) => commands::download_cmd(cmd, &config, &output).await,

        Command::Debrid(cmd) => commands::debrid_cmd(cmd, &config, &output).await,

        Command::Watch(cmd) => commands::watch_cmd(cmd, &config, &output).await,

        Command::Files(cmd) => commands::files_cmd(cmd, &config, &output).await,

        Command::PlayFile(cmd) => commands::play_file_cmd(cmd, &config, &output).await,

        Command::Downloads(cmd) => commands::downloads_cmd(cmd, &config, &output).await,

        Command::Status(cmd) => commands::status_cmd(cmd, &config, &output).await,

        Command::Config(cmd) => {
            commands::config_cmd(cmd, &config, cli.config.as_deref(), &output).await
        }
    }
}
