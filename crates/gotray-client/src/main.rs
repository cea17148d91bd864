//! gotray CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use gotray_client::cli::{Cli, Command, ConfigAction};
use gotray_client::commands::{self, run::DaemonPaths};
use gotray_client::config::ClientConfig;
use gotray_client::error::ClientResult;
use gotray_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(tracing_config(&cli)) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// The daemon logs at INFO in the configured format; other commands only
/// surface warnings.
fn tracing_config(cli: &Cli) -> TracingConfig {
    let config = if cli.is_run() {
        let format = ClientConfig::load_from(&cli.config_path())
            .and_then(|c| c.log_format())
            .unwrap_or_default();
        TracingConfig::daemon().with_format(format)
    } else {
        TracingConfig::cli()
    };

    if cli.debug {
        config.with_level(Level::DEBUG)
    } else {
        config
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config_path();

    match cli.command {
        None | Some(Command::Run) => {
            let paths = DaemonPaths {
                config: config_path,
                pid: cli.pid_path(),
                status: cli.status_path(),
            };
            commands::run::run(&paths).await
        }
        Some(Command::Status { json }) => {
            commands::control::status(&cli.pid_path(), &cli.status_path(), json)
        }
        Some(Command::Silence) => commands::control::silence(&cli.pid_path()),
        Some(Command::Unsilence) => commands::control::unsilence(&cli.pid_path()),
        Some(Command::Reload) => commands::control::reload(&cli.pid_path()),
        Some(Command::Endpoints { hosts }) => {
            let config = ClientConfig::load_from(&config_path)?;
            commands::endpoints::list(&config, hosts)
        }
        Some(Command::Open { ref target }) => {
            let config = ClientConfig::load_from(&config_path)?;
            commands::endpoints::open(&config, target)
        }
        Some(Command::Config { ref action }) => {
            let config = if config_path.exists() {
                ClientConfig::load_from(&config_path)?
            } else {
                ClientConfig::default()
            };
            match action {
                ConfigAction::Dump => commands::config::dump(&config, &config_path),
                ConfigAction::Validate => commands::config::validate(&config),
                ConfigAction::Path => commands::config::path(&config_path),
            }
        }
    }
}
