//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ClientConfig;

/// gotray - desktop notifications from push servers
#[derive(Debug, Parser)]
#[command(name = "gotray")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "GOTRAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Path to the daemon PID file
    #[arg(long, env = "GOTRAY_PID_FILE", global = true)]
    pub pid_file: Option<PathBuf>,

    /// Path to the daemon status file
    #[arg(long, env = "GOTRAY_STATUS_FILE", global = true)]
    pub status_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Configuration file path, falling back to the default location.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ClientConfig::default_path)
    }

    /// PID file path, falling back to the default location.
    pub fn pid_path(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(gotray_server::default_pid_path)
    }

    /// Status file path, falling back to the default location.
    pub fn status_path(&self) -> PathBuf {
        self.status_file
            .clone()
            .unwrap_or_else(gotray_server::default_status_path)
    }

    /// True when the daemon should run (explicit `run` or no subcommand).
    pub fn is_run(&self) -> bool {
        matches!(self.command, None | Some(Command::Run))
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground (default)
    Run,

    /// Show connection health reported by the daemon
    Status {
        /// Print the raw status JSON
        #[arg(long)]
        json: bool,
    },

    /// Mute notifications for the configured silent duration
    Silence,

    /// Unmute notifications
    Unsilence,

    /// Reload the configuration and restart all connections
    Reload,

    /// List configured endpoints
    Endpoints {
        /// Only print the distinct server hosts
        #[arg(long)]
        hosts: bool,
    },

    /// Open a server's web page in the browser
    Open {
        /// Endpoint display name or host
        target: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_runs_daemon() {
        let cli = Cli::try_parse_from(["gotray"]).unwrap();
        assert!(cli.is_run());
        assert!(!cli.debug);
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["gotray", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Status { json: true })));
        assert!(!cli.is_run());

        let cli = Cli::try_parse_from(["gotray", "open", "Home"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Open { ref target }) if target == "Home"));

        let cli = Cli::try_parse_from(["gotray", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Validate
            })
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["gotray", "silence", "--pid-file", "/tmp/x.pid", "-v"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.pid_path(), PathBuf::from("/tmp/x.pid"));
    }

    #[test]
    fn explicit_config_path_wins() {
        let cli = Cli::try_parse_from(["gotray", "--config", "/etc/gotray.toml"]).unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/etc/gotray.toml"));
    }
}
