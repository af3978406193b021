//! Event types flowing through the backend.
//!
//! # Event Flow
//!
//! ```text
//! FSEvents callback (pump thread)
//!        │  count + parallel arrays
//!        ▼
//!   Vec<RawEvent>
//!        │  BatchProcessor
//!        ▼
//!   FsEvent / WatchError
//!        │  EventSink
//!        ▼
//!   Sent via channel to the consumer
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use fsw_core::{ChangeKind, EventFlags};
use serde::Serialize;

use crate::error::WatchError;

/// One entry of a native callback batch, before any interpretation.
///
/// `path` is in the native byte encoding and must be non-empty with no
/// trailing separator; violations are rejected by the batch processor.
/// `id` is monotonic per stream and only meaningful for adjacency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Absolute path in native encoding.
    pub path: Vec<u8>,
    /// Native flag bits.
    pub flags: EventFlags,
    /// Native event id.
    pub id: u64,
}

impl RawEvent {
    /// Creates a raw event.
    #[must_use]
    pub fn new(path: impl Into<Vec<u8>>, flags: EventFlags, id: u64) -> Self {
        Self {
            path: path.into(),
            flags,
            id,
        }
    }
}

/// A high-level change notification.
///
/// Paths are relative to the watch root.
///
/// # Examples
///
/// ```
/// use fsw_fsevents::FsEvent;
/// use fsw_core::ChangeKind;
///
/// let event = FsEvent::Created { path: "docs/a.txt".into() };
/// assert_eq!(event.kind(), ChangeKind::Created);
/// assert_eq!(event.path().as_str(), "docs/a.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FsEvent {
    /// Contents or metadata changed.
    Changed {
        /// Relative path.
        path: Utf8PathBuf,
    },
    /// An item appeared.
    Created {
        /// Relative path.
        path: Utf8PathBuf,
    },
    /// An item disappeared.
    Deleted {
        /// Relative path.
        path: Utf8PathBuf,
    },
    /// An item moved within the watched tree.
    Renamed {
        /// Relative path before the rename.
        old_path: Utf8PathBuf,
        /// Relative path after the rename.
        new_path: Utf8PathBuf,
    },
}

impl FsEvent {
    /// Builds a single-path event of the given kind.
    ///
    /// Returns `None` for [`ChangeKind::Renamed`], which needs both paths.
    #[must_use]
    pub fn new(kind: ChangeKind, path: Utf8PathBuf) -> Option<Self> {
        match kind {
            ChangeKind::Changed => Some(Self::Changed { path }),
            ChangeKind::Created => Some(Self::Created { path }),
            ChangeKind::Deleted => Some(Self::Deleted { path }),
            ChangeKind::Renamed => None,
        }
    }

    /// Returns the kind of change.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Changed { .. } => ChangeKind::Changed,
            Self::Created { .. } => ChangeKind::Created,
            Self::Deleted { .. } => ChangeKind::Deleted,
            Self::Renamed { .. } => ChangeKind::Renamed,
        }
    }

    /// Returns the affected path; the new path for renames.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Changed { path } | Self::Created { path } | Self::Deleted { path } => path,
            Self::Renamed { new_path, .. } => new_path,
        }
    }
}

impl std::fmt::Display for FsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Renamed { old_path, new_path } => write!(f, "renamed {old_path} -> {new_path}"),
            other => write!(f, "{} {}", other.kind(), other.path()),
        }
    }
}

/// Running counts of delivered notifications.
///
/// Useful for summaries when a consumer shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    /// Number of changed notifications.
    pub changed: usize,
    /// Number of created notifications.
    pub created: usize,
    /// Number of deleted notifications.
    pub deleted: usize,
    /// Number of renamed notifications.
    pub renamed: usize,
    /// Number of overflow (rescan) errors.
    pub overflows: usize,
    /// Number of other errors.
    pub errors: usize,
}

impl EventStats {
    /// Records one channel item.
    pub fn record(&mut self, item: &Result<FsEvent, WatchError>) {
        match item {
            Ok(event) => match event.kind() {
                ChangeKind::Changed => self.changed += 1,
                ChangeKind::Created => self.created += 1,
                ChangeKind::Deleted => self.deleted += 1,
                ChangeKind::Renamed => self.renamed += 1,
            },
            Err(WatchError::BufferOverflow { .. }) => self.overflows += 1,
            Err(_) => self.errors += 1,
        }
    }

    /// Total number of successful notifications.
    #[must_use]
    pub const fn total_events(&self) -> usize {
        self.changed + self.created + self.deleted + self.renamed
    }
}
