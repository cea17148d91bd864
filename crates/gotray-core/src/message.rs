//! Decoding of pushed notification frames.
//!
//! Every text frame received from a push server is a JSON object describing
//! one notification. Only `title` and `message` are used; all other fields
//! (ids, priority, extras) are ignored.

use serde::Deserialize;
use thiserror::Error;

/// Title used when a frame carries none.
pub const DEFAULT_TITLE: &str = "Gotify";

/// Errors produced while decoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a JSON object of the expected shape.
    #[error("invalid message payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// A notification decoded from one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DecodedMessage {
    /// Decodes the raw bytes of one received frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_slice(bytes)?;
        Ok(Self {
            title: wire.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: wire.message.unwrap_or_default(),
        })
    }
}
