//! High-level notification filters.
//!
//! [`NotifyFilters`] is the caller-facing description of which kinds of change
//! a watch is interested in. It is independent of any platform; the FSEvents
//! backend turns it into native bits with [`crate::translate_filter`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Kinds of change a watch reports.
    ///
    /// Serialized in the human-readable `bitflags` text form, for example
    /// `"FILE_NAME | DIRECTORY_NAME | LAST_WRITE"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsw_core::NotifyFilters;
    ///
    /// let filters = NotifyFilters::default();
    /// assert!(filters.contains(NotifyFilters::FILE_NAME));
    /// assert!(filters.contains(NotifyFilters::LAST_WRITE));
    /// assert!(!filters.contains(NotifyFilters::SECURITY));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NotifyFilters: u32 {
        /// Files being created, deleted, or renamed.
        const FILE_NAME = 0x0001;
        /// Directories being created, deleted, or renamed.
        const DIRECTORY_NAME = 0x0002;
        /// Attribute (inode metadata, Finder info) changes.
        const ATTRIBUTES = 0x0004;
        /// File size changes.
        const SIZE = 0x0008;
        /// Content writes.
        const LAST_WRITE = 0x0010;
        /// Access time updates.
        const LAST_ACCESS = 0x0020;
        /// Creation time updates.
        const CREATION_TIME = 0x0040;
        /// Ownership and extended attribute changes.
        const SECURITY = 0x0100;
    }
}

impl Default for NotifyFilters {
    fn default() -> Self {
        Self::FILE_NAME | Self::DIRECTORY_NAME | Self::LAST_WRITE
    }
}

impl NotifyFilters {
    /// Returns `true` if the filter asks for create/delete/rename reporting.
    #[inline]
    #[must_use]
    pub const fn wants_names(self) -> bool {
        self.intersects(Self::FILE_NAME.union(Self::DIRECTORY_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters() {
        let filters = NotifyFilters::default();
        assert_eq!(
            filters,
            NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME | NotifyFilters::LAST_WRITE
        );
        assert!(filters.wants_names());
    }

    #[test]
    fn test_wants_names() {
        assert!(!NotifyFilters::SIZE.wants_names());
        assert!(NotifyFilters::DIRECTORY_NAME.wants_names());
    }

    #[test]
    fn test_filters_serde_roundtrip() {
        let filters = NotifyFilters::SECURITY | NotifyFilters::FILE_NAME;
        let json = serde_json::to_string(&filters).expect("serialize");
        let parsed: NotifyFilters = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, filters);
    }

    #[test]
    fn test_filters_parse_text_form() {
        let parsed: NotifyFilters =
            serde_json::from_str(r#""FILE_NAME | SIZE""#).expect("deserialize");
        assert_eq!(parsed, NotifyFilters::FILE_NAME | NotifyFilters::SIZE);
    }
}
