//! # herald-cli
//!
//! Command-line interface for the Herald runtime.
//!
//! ## Commands
//!
//! - `herald run <requirement>`: parse a request, write its crawler, and serve the subscription
//! - `herald watch`: subscribe an existing crawler code blob to a cron schedule
//! - `herald next <cron>`: print upcoming fire instants
//! - `herald config`: show the resolved configuration

pub mod commands;

pub use commands::Cli;
