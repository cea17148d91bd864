//! Subcommand implementations.

pub mod config;
pub mod control;
pub mod endpoints;
pub mod run;
