//! Endpoint listing and server pages.

use gotray_core::{EndpointConfig, server_hosts};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Lists configured endpoints, or only their distinct hosts.
pub fn list(config: &ClientConfig, hosts_only: bool) -> ClientResult<()> {
    let endpoints = config.endpoint_configs();
    if endpoints.is_empty() {
        println!("No endpoints configured.");
        return Ok(());
    }
    let lines = if hosts_only {
        server_hosts(&endpoints)
    } else {
        endpoints.iter().map(describe).collect()
    };
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// One-line description of an endpoint. The token itself is never shown.
fn describe(endpoint: &EndpointConfig) -> String {
    let token = if endpoint.token().is_some() {
        "token"
    } else {
        "no token"
    };
    if endpoint.display_name == endpoint.address {
        format!("{} ({})", endpoint.host(), token)
    } else {
        format!("{}: {} ({})", endpoint.display_name, endpoint.host(), token)
    }
}

/// The page opened for an endpoint matching `target`.
fn server_page(endpoints: &[EndpointConfig], target: &str) -> ClientResult<String> {
    endpoints
        .iter()
        .find(|endpoint| endpoint.matches(target))
        .map(|endpoint| format!("https://{}", endpoint.host()))
        .ok_or_else(|| ClientError::Config(format!("no endpoint matches {:?}", target)))
}

/// Opens the web page of the server behind an endpoint.
pub fn open(config: &ClientConfig, target: &str) -> ClientResult<()> {
    let url = server_page(&config.endpoint_configs(), target)?;
    info!(url = %url, "Opening server page");
    open::that(&url)?;
    Ok(())
}
