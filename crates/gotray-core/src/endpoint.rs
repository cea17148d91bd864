//! Endpoint descriptors.
//!
//! Each configured line names one push server. A line may carry an optional
//! bracketed display name in front of the address:
//!
//! ```text
//! [Home]wss://push.example.org/stream?token=abc
//! wss://other.example.org/stream?token=def
//! ```
//!
//! No validation of the address happens here; a malformed address simply
//! fails when the worker tries to connect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

/// One configured endpoint, derived from a single configuration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The trimmed line this descriptor was parsed from.
    pub raw_line: String,
    /// Name shown as the notification source. Defaults to the address.
    pub display_name: String,
    /// Target address (a `ws://` or `wss://` URL).
    pub address: String,
}

impl EndpointConfig {
    /// Parses one configuration line.
    ///
    /// Returns `None` for empty or whitespace-only lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (display_name, address) = match split_bracketed(line) {
            Some((name, rest)) => (name.to_string(), rest.trim().to_string()),
            None => (line.to_string(), line.to_string()),
        };

        Some(Self {
            raw_line: line.to_string(),
            display_name,
            address,
        })
    }

    /// Parses every non-empty line, preserving order.
    pub fn parse_all<I, S>(lines: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| Self::parse(line.as_ref()))
            .collect()
    }

    /// Returns the `host[:port]` part of the address, or the raw address
    /// when it is not a URL.
    pub fn host(&self) -> String {
        match Url::parse(&self.address) {
            Ok(url) => match url.host_str() {
                Some(host) => match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                },
                None => self.address.clone(),
            },
            Err(_) => self.address.clone(),
        }
    }

    /// Returns the `token` query parameter, if present and non-empty.
    pub fn token(&self) -> Option<String> {
        let url = Url::parse(&self.address).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// Returns true if the descriptor matches a name or host given by the user.
    pub fn matches(&self, needle: &str) -> bool {
        self.display_name == needle || self.host() == needle || self.address == needle
    }
}

/// Splits `[Name]rest` into `("Name", "rest")`.
fn split_bracketed(line: &str) -> Option<(&str, &str)> {
    let inner = line.strip_prefix('[')?;
    let close = inner.find(']')?;
    Some((&inner[..close], &inner[close + 1..]))
}

/// Returns the distinct hosts of the given endpoints, sorted.
pub fn server_hosts(endpoints: &[EndpointConfig]) -> Vec<String> {
    endpoints
        .iter()
        .map(EndpointConfig::host)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
