//! Hatch library exports for testing.
//!
//! The binary in `main.rs` is a thin shell over these modules.

pub mod clean;
pub mod commands;
pub mod config;
pub mod error;
pub mod process;
pub mod router;
#[cfg(unix)]
pub mod signals;

pub use error::{Error, Result};
