//! CLI, configuration, source registry, calendar output
//!
//! This crate provides the `kinocal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;
pub mod sources;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
