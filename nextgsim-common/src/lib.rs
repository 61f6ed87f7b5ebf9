//! Common types and utilities for nextgsim
//!
//! This crate provides the identifier types, configuration structures,
//! error type and logging helpers shared by the CU-UP crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{CuUpConfig, NetworkInterfaceConfig};
pub use error::{Error, Result};
pub use logging::{init_logging, init_logging_with_filter, Direction, HexDump, LogLevel};
pub use types::*;
