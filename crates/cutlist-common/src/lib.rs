//! Cutlist Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the cutlist workspace.
//!
//! - **Error Handling**: [`CutlistError`] and the [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//!
//! # Example
//!
//! ```no_run
//! use cutlist_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("tracker starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CutlistError, Result};
