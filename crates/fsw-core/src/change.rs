//! Classification of native events into high-level change types.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::flags::EventFlags;

/// A single kind of high-level change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Contents or metadata changed.
    Changed,
    /// An item appeared.
    Created,
    /// An item disappeared.
    Deleted,
    /// An item was renamed.
    Renamed,
}

impl ChangeKind {
    /// Returns a short lowercase label, suitable for log lines and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// The set of change kinds a single native event maps to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeTypes: u8 {
        /// See [`ChangeKind::Changed`].
        const CHANGED = 0b0001;
        /// See [`ChangeKind::Created`].
        const CREATED = 0b0010;
        /// See [`ChangeKind::Deleted`].
        const DELETED = 0b0100;
        /// See [`ChangeKind::Renamed`].
        const RENAMED = 0b1000;
    }
}

impl ChangeTypes {
    /// Computes the change types for `event` as seen through `filter`.
    ///
    /// `Changed` requires the event and the filter to share at least one
    /// "changed" sub-reason. `Created`, `Deleted`, and `Renamed` require the
    /// event's file/directory class to be allowed by the filter, or the event to
    /// be a link while files or directories are allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsw_core::{ChangeTypes, EventFlags};
    ///
    /// let event = EventFlags::ITEM_CREATED | EventFlags::IS_FILE;
    /// assert_eq!(ChangeTypes::classify(event, EventFlags::IS_FILE), ChangeTypes::CREATED);
    /// assert!(ChangeTypes::classify(event, EventFlags::IS_DIR).is_empty());
    /// ```
    #[must_use]
    pub fn classify(event: EventFlags, filter: EventFlags) -> Self {
        let mut types = Self::empty();

        if (filter & EventFlags::CHANGED).intersects(event & EventFlags::CHANGED) {
            types |= Self::CHANGED;
        }

        let allow_dirs = filter.is_dir();
        let allow_files = filter.is_file();
        let correct_class = (event.is_dir() && allow_dirs) || (event.is_file() && allow_files);
        let allowed_link = event.is_link() && (allow_dirs || allow_files);

        if correct_class || allowed_link {
            if event.contains(EventFlags::ITEM_CREATED) {
                types |= Self::CREATED;
            }
            if event.contains(EventFlags::ITEM_REMOVED) {
                types |= Self::DELETED;
            }
            if event.contains(EventFlags::ITEM_RENAMED) {
                types |= Self::RENAMED;
            }
        }

        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILES_AND_WRITES: EventFlags = EventFlags::IS_FILE
        .union(EventFlags::ITEM_MODIFIED)
        .union(EventFlags::INODE_META_MOD);

    #[test]
    fn test_changed_requires_shared_sub_reason() {
        let event = EventFlags::ITEM_XATTR_MOD | EventFlags::IS_FILE;
        assert!(ChangeTypes::classify(event, FILES_AND_WRITES).is_empty());

        let event = EventFlags::ITEM_MODIFIED | EventFlags::IS_FILE;
        assert_eq!(
            ChangeTypes::classify(event, FILES_AND_WRITES),
            ChangeTypes::CHANGED
        );
    }

    #[test]
    fn test_changed_ignores_class() {
        // Changed depends only on the sub-reasons, not on file/dir filters.
        let event = EventFlags::ITEM_MODIFIED | EventFlags::IS_DIR;
        assert_eq!(
            ChangeTypes::classify(event, EventFlags::ITEM_MODIFIED),
            ChangeTypes::CHANGED
        );
    }

    #[test]
    fn test_created_deleted_renamed_together() {
        let event = EventFlags::ITEM_CREATED
            | EventFlags::ITEM_REMOVED
            | EventFlags::ITEM_RENAMED
            | EventFlags::IS_FILE;
        assert_eq!(
            ChangeTypes::classify(event, EventFlags::IS_FILE),
            ChangeTypes::CREATED | ChangeTypes::DELETED | ChangeTypes::RENAMED
        );
    }

    #[test]
    fn test_directory_filtered_out_by_file_filter() {
        let event = EventFlags::ITEM_CREATED | EventFlags::IS_DIR;
        assert!(ChangeTypes::classify(event, EventFlags::IS_FILE).is_empty());
        assert_eq!(
            ChangeTypes::classify(event, EventFlags::IS_DIR),
            ChangeTypes::CREATED
        );
    }

    #[test]
    fn test_links_pass_when_any_name_filter_is_set() {
        let event = EventFlags::ITEM_CREATED | EventFlags::IS_SYMLINK;
        assert_eq!(
            ChangeTypes::classify(event, EventFlags::IS_DIR),
            ChangeTypes::CREATED
        );
        assert!(ChangeTypes::classify(event, EventFlags::ITEM_MODIFIED).is_empty());

        let event = EventFlags::ITEM_REMOVED | EventFlags::IS_LAST_HARDLINK;
        assert_eq!(
            ChangeTypes::classify(event, EventFlags::IS_FILE),
            ChangeTypes::DELETED
        );
    }

    #[test]
    fn test_change_kind_labels() {
        assert_eq!(ChangeKind::Created.to_string(), "created");
        assert_eq!(ChangeKind::Renamed.label(), "renamed");
        assert_eq!(
            serde_json::to_string(&ChangeKind::Deleted).expect("serialize"),
            r#""deleted""#
        );
    }
}
