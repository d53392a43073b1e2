//! Command implementations.

pub mod cache;
pub mod config;
pub mod fetch;
