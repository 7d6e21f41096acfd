//! Core domain + application logic for the Rollbar watch bot.
//!
//! This crate is intentionally framework-agnostic. Rollbar and Telegram live
//! behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod exclusion;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod routing;
pub mod scan;
pub mod scheduler;
pub mod status;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
