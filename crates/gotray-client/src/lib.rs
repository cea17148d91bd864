//! CLI, config file, daemon control
//!
//! This crate provides the `gotray` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
