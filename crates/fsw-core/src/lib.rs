//! Core types, flag tables, and path utilities for the fsw file watcher.
//!
//! This crate provides the platform-independent pieces used by the FSEvents
//! backend in `fsw-fsevents` and by the `fsw-watch` binary:
//!
//! - [`NotifyFilters`] - the high-level "what do I care about" filter set
//! - [`EventFlags`] - the native FSEvents per-event flag bitmask
//! - [`translate_filter`] - the fixed lookup table from filters to native bits
//! - [`ChangeTypes`] / [`ChangeKind`] - classification of a native event
//! - Configuration structures ([`Config`], [`WatchConfig`])
//! - Path helpers for root resolution, existence checks, and
//!   case-insensitive prefix handling
//!
//! # Crate Dependencies
//!
//! ```text
//! fsw-cli ──► fsw-fsevents ──► fsw-core
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod change;
pub mod config;
pub mod error;
pub mod filters;
pub mod flags;
pub mod paths;

pub use change::{ChangeKind, ChangeTypes};
pub use config::{Config, WatchConfig};
pub use error::ConfigError;
pub use filters::NotifyFilters;
pub use flags::{EventFlags, translate_filter};
