//! CLI, configuration and bulk runner
//!
//! This crate provides the `calsweep` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod runner;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use runner::{BulkOperationRunner, CopySummary, DeleteSummary, RecolorSummary, RunError};
