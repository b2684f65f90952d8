//! Subcommand implementations.
//!
//! - [`run`] - the bulk recolor, delete and copy run (no subcommand)
//! - [`auth`] - `calsweep auth google`
//! - [`config`] - `calsweep config dump|validate|path`

#[cfg(feature = "google")]
pub mod auth;
pub mod config;
pub mod run;
