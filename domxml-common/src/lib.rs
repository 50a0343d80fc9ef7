//! # domxml Common
//!
//! Shared utilities for the domxml tools.
//!
//! ## Logging
//!
//! ```rust,no_run
//! use domxml_common::init_logging;
//!
//! init_logging("info").unwrap();
//! tracing::info!("ready");
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, LogFormat};
