//! Common utilities for the tagloom resolver.
//!
//! This crate provides shared infrastructure used by all tagloom components:
//! - **Logger** - the append-only diagnostic trail produced by a resolution
//! - **Warning System** - colored, deduplicated console warnings for
//!   configuration problems

pub mod logger;
pub mod warning;

pub use logger::{LogEntry, Logger, Severity};
