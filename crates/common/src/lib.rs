//! Common utilities for uboat
//!
//! This crate provides functionality shared by the server binary and the test
//! suites: the common error type, tracing setup, and USB/IP test helpers.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
