//! Logging utilities.
//!
//! Centralizes logger initialization. The crate logs through the standard
//! `log` facade; embedders with their own logger can skip [`init_logging`]
//! entirely.

mod init;

pub use init::{init_logging, LoggingConfig};
