//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    println!("# config.toml ({})", path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let problems = config.problems();
    if problems.is_empty() {
        println!(
            "Configuration is valid ({} endpoints).",
            config.endpoint_configs().len()
        );
        return Ok(());
    }

    for problem in &problems {
        println!("- {}", problem);
    }
    Err(ClientError::Config(format!(
        "{} problem(s) found",
        problems.len()
    )))
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}
