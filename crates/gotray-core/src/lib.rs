//! Core types: endpoint descriptors, message decoding, duration labels, health

pub mod endpoint;
pub mod health;
pub mod labels;
pub mod message;
pub mod tracing;

pub use endpoint::{EndpointConfig, server_hosts};
pub use health::{ConnectionState, Health, HealthSummary, aggregate, aggregate_states};
pub use labels::{LabelError, format_label, parse_label};
pub use message::{DEFAULT_TITLE, DecodeError, DecodedMessage};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
