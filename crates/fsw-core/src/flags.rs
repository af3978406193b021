//! Native FSEvents event flags and the filter translation table.
//!
//! The bit values mirror `kFSEventStreamEventFlag*` from
//! `CoreServices/FSEvents.framework/Headers/FSEvents.h`, so a raw `u32` from the
//! native callback converts with [`EventFlags::from_bits_retain`].

use bitflags::bitflags;

use crate::filters::NotifyFilters;

bitflags! {
    /// Per-event flag bitmask reported by FSEvents.
    ///
    /// Also used as the session filter mask: the filter produced by
    /// [`translate_filter`] lives in the same bit space, so classification is a
    /// matter of intersecting the two.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        /// Coalesced events below this path; the subtree must be rescanned.
        const MUST_SCAN_SUBDIRS = 0x0000_0001;
        /// Events were dropped in user space.
        const USER_DROPPED = 0x0000_0002;
        /// Events were dropped in the kernel.
        const KERNEL_DROPPED = 0x0000_0004;
        /// The 64-bit event id counter wrapped.
        const IDS_WRAPPED = 0x0000_0008;
        /// Sentinel marking the end of historical events.
        const HISTORY_DONE = 0x0000_0010;
        /// The watched root (or one of its ancestors) changed.
        const ROOT_CHANGED = 0x0000_0020;
        /// A volume was mounted under the watched path.
        const MOUNT = 0x0000_0040;
        /// A volume was unmounted under the watched path.
        const UNMOUNT = 0x0000_0080;
        /// The item was created.
        const ITEM_CREATED = 0x0000_0100;
        /// The item was removed.
        const ITEM_REMOVED = 0x0000_0200;
        /// Inode metadata changed.
        const INODE_META_MOD = 0x0000_0400;
        /// The item was renamed (either half of the pair).
        const ITEM_RENAMED = 0x0000_0800;
        /// File contents changed.
        const ITEM_MODIFIED = 0x0000_1000;
        /// Finder info changed.
        const FINDER_INFO_MOD = 0x0000_2000;
        /// Ownership changed.
        const ITEM_CHANGE_OWNER = 0x0000_4000;
        /// Extended attributes changed.
        const ITEM_XATTR_MOD = 0x0000_8000;
        /// The item is a regular file.
        const IS_FILE = 0x0001_0000;
        /// The item is a directory.
        const IS_DIR = 0x0002_0000;
        /// The item is a symbolic link.
        const IS_SYMLINK = 0x0004_0000;
        /// The change was made by this process.
        const OWN_EVENT = 0x0008_0000;
        /// The item is a hard link.
        const IS_HARDLINK = 0x0010_0000;
        /// The item was the last hard link.
        const IS_LAST_HARDLINK = 0x0020_0000;
        /// The item is a clone.
        const ITEM_CLONED = 0x0040_0000;
    }
}

impl EventFlags {
    /// Signals that the stream lost track of individual changes.
    pub const RESCAN: Self = Self::MUST_SCAN_SUBDIRS
        .union(Self::USER_DROPPED)
        .union(Self::KERNEL_DROPPED)
        .union(Self::ROOT_CHANGED)
        .union(Self::MOUNT)
        .union(Self::UNMOUNT);

    /// Sub-reasons that make up a "changed" notification.
    pub const CHANGED: Self = Self::INODE_META_MOD
        .union(Self::FINDER_INFO_MOD)
        .union(Self::ITEM_MODIFIED)
        .union(Self::ITEM_CHANGE_OWNER)
        .union(Self::ITEM_XATTR_MOD);

    /// Link classifications.
    pub const LINK: Self = Self::IS_SYMLINK
        .union(Self::IS_HARDLINK)
        .union(Self::IS_LAST_HARDLINK);

    /// Returns `true` if the event carries any rescan-required signal.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsw_core::EventFlags;
    ///
    /// assert!(EventFlags::KERNEL_DROPPED.requires_rescan());
    /// assert!((EventFlags::ITEM_CREATED | EventFlags::UNMOUNT).requires_rescan());
    /// assert!(!(EventFlags::ITEM_CREATED | EventFlags::IS_FILE).requires_rescan());
    /// ```
    #[inline]
    #[must_use]
    pub const fn requires_rescan(self) -> bool {
        self.intersects(Self::RESCAN)
    }

    /// Returns `true` if the event is classified as a regular file.
    #[inline]
    #[must_use]
    pub const fn is_file(self) -> bool {
        self.contains(Self::IS_FILE)
    }

    /// Returns `true` if the event is classified as a directory.
    #[inline]
    #[must_use]
    pub const fn is_dir(self) -> bool {
        self.contains(Self::IS_DIR)
    }

    /// Returns `true` if the event is classified as a symbolic or hard link.
    #[inline]
    #[must_use]
    pub const fn is_link(self) -> bool {
        self.intersects(Self::LINK)
    }
}

/// Translates high-level filters into the native filter mask.
///
/// The result is a stateless, deterministic lookup:
///
/// | filter | native bits |
/// |--------|-------------|
/// | `FILE_NAME` | `IS_FILE` |
/// | `DIRECTORY_NAME` | `IS_DIR` |
/// | `ATTRIBUTES` | `INODE_META_MOD`, `FINDER_INFO_MOD` |
/// | `SIZE`, `LAST_WRITE`, `LAST_ACCESS`, `CREATION_TIME` | `ITEM_MODIFIED`, `INODE_META_MOD` |
/// | `SECURITY` | `ITEM_CHANGE_OWNER`, `ITEM_XATTR_MOD` |
///
/// # Examples
///
/// ```
/// use fsw_core::{EventFlags, NotifyFilters, translate_filter};
///
/// let mask = translate_filter(NotifyFilters::FILE_NAME | NotifyFilters::LAST_WRITE);
/// assert!(mask.contains(EventFlags::IS_FILE | EventFlags::ITEM_MODIFIED));
/// assert!(!mask.contains(EventFlags::IS_DIR));
/// ```
#[must_use]
pub fn translate_filter(filters: NotifyFilters) -> EventFlags {
    let mut mask = EventFlags::empty();

    if filters.contains(NotifyFilters::FILE_NAME) {
        mask |= EventFlags::IS_FILE;
    }
    if filters.contains(NotifyFilters::DIRECTORY_NAME) {
        mask |= EventFlags::IS_DIR;
    }
    if filters.contains(NotifyFilters::ATTRIBUTES) {
        mask |= EventFlags::INODE_META_MOD | EventFlags::FINDER_INFO_MOD;
    }
    if filters.intersects(
        NotifyFilters::SIZE
            | NotifyFilters::LAST_WRITE
            | NotifyFilters::LAST_ACCESS
            | NotifyFilters::CREATION_TIME,
    ) {
        mask |= EventFlags::ITEM_MODIFIED | EventFlags::INODE_META_MOD;
    }
    if filters.contains(NotifyFilters::SECURITY) {
        mask |= EventFlags::ITEM_CHANGE_OWNER | EventFlags::ITEM_XATTR_MOD;
    }

    mask
}
