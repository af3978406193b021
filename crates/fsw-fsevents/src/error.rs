//! Error types for the fsw-fsevents crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while setting up or running a watch session.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use fsw_core::ConfigError;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Setup errors** ([`WatchError::Root`], [`WatchError::NotADirectory`],
///   [`WatchError::StreamCreate`], [`WatchError::PumpStart`],
///   [`WatchError::NoRuntime`], [`WatchError::Config`]): Fatal - returned from
///   construction or `start`
/// - **Start failure** ([`WatchError::StartFailed`]): Fatal - delivered to the
///   owner's error sink after the session has been torn down
/// - **Buffer overflow** ([`WatchError::BufferOverflow`]): Recoverable - the
///   stream keeps running, but the consumer should rescan
///
/// # Examples
///
/// ```
/// use fsw_fsevents::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_recoverable() {
///         eprintln!("rescan needed: {err}");
///     } else {
///         eprintln!("watch failed: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The watch root could not be resolved to an absolute, existing path.
    #[error("cannot resolve watch root {path}: {source}")]
    Root {
        /// The path as given by the caller.
        path: Utf8PathBuf,
        /// The underlying I/O error, carrying the OS error code.
        #[source]
        source: io::Error,
    },

    /// The watch root exists but is not a directory.
    #[error("watch root is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// The native event stream could not be created.
    #[error("failed to create event stream for {0}")]
    StreamCreate(Utf8PathBuf),

    /// The shared event pump thread could not be started.
    #[error("failed to start event pump thread: {0}")]
    PumpStart(#[source] io::Error),

    /// Native event delivery could not be started.
    #[error("failed to start event stream for {path} (os error {code})")]
    StartFailed {
        /// The watch root.
        path: Utf8PathBuf,
        /// The last OS error code observed after the failure.
        code: i32,
    },

    /// The native stream lost track of individual changes.
    ///
    /// Carries the raw flag bits of the offending event. The rest of the
    /// batch is discarded; the consumer should rescan the watched tree.
    #[error("event buffer overflow; consumer should rescan (flags {flags:#010x})")]
    BufferOverflow {
        /// Raw native flag bits.
        flags: u32,
    },

    /// `start` was called outside a tokio runtime.
    ///
    /// The cancellation binding is a task on the caller's runtime.
    #[error("no tokio runtime available to bind cancellation")]
    NoRuntime,

    /// The watch configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WatchError {
    /// Creates a new [`WatchError::Root`] error.
    #[inline]
    pub fn root(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Root {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    ///
    /// Only buffer overflows are recoverable: the stream keeps running and the
    /// consumer is expected to rescan.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::BufferOverflow { .. })
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Root { path, .. }
            | Self::NotADirectory(path)
            | Self::StreamCreate(path)
            | Self::StartFailed { path, .. } => Some(path),
            Self::PumpStart(_)
            | Self::BufferOverflow { .. }
            | Self::NoRuntime
            | Self::Config(_) => None,
        }
    }

    /// Returns the numeric code carried by this error, if any.
    ///
    /// Overflows report their raw flag bits; OS failures report the OS error
    /// code.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::BufferOverflow { flags } => Some(i64::from(*flags)),
            Self::StartFailed { code, .. } => Some(i64::from(*code)),
            Self::Root { source, .. } | Self::PumpStart(source) => {
                source.raw_os_error().map(i64::from)
            }
            Self::NotADirectory(_)
            | Self::StreamCreate(_)
            | Self::NoRuntime
            | Self::Config(_) => None,
        }
    }
}
