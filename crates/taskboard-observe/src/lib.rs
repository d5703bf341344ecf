//! Logging setup for taskboard binaries.
//!
//! Libraries only emit `tracing` events; a binary calls [`logger_init`] once at startup.

mod logger;
pub use logger::*;
