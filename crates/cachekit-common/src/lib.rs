//! # CacheKit Common
//!
//! Shared logging configuration for the CacheKit offline cache engine.
//!
//! All crates in the workspace emit through `tracing`; the hosting
//! application decides once, at startup, how verbose the worker should be
//! by constructing a [`LogConfig`] and calling [`init_logging`]. There is
//! no process-wide debug flag.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
