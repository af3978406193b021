//! Conversion of raw native batches into high-level notifications.
//!
//! A batch is walked left to right. For each entry:
//!
//! 1. the path is decoded; empty, non-UTF-8, or separator-terminated paths
//!    are rejected and logged,
//! 2. the watch root itself is suppressed,
//! 3. any rescan signal ends the batch with one [`WatchError::BufferOverflow`],
//! 4. the second half of an already paired rename is skipped,
//! 5. non-recursive sessions skip anything not directly inside the root,
//! 6. flags are classified against the session filter,
//! 7. `Changed`, `Created`, `Deleted` are emitted in that order,
//! 8. renames are paired with the next entry when its id is exactly one
//!    higher; a lone rename becomes `Created` or `Deleted` depending on
//!    whether the path still exists.
//!
//! The result is a lazy iterator that is consumed once per batch.

use camino::{Utf8Path, Utf8PathBuf};
use fsw_core::paths::{self, SEPARATOR};
use fsw_core::{ChangeTypes, EventFlags, NotifyFilters, translate_filter};
use smallvec::SmallVec;

use crate::error::WatchError;
use crate::events::{FsEvent, RawEvent};

type Pending = SmallVec<[FsEvent; 4]>;

/// Per-session state the processor needs: root, recursion, filter.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    root: Utf8PathBuf,
    recursive: bool,
    filter: EventFlags,
}

impl BatchProcessor {
    /// Creates a processor for an already resolved root.
    ///
    /// `root` is normalized to end in exactly one separator.
    #[must_use]
    pub fn new(root: &Utf8Path, recursive: bool, filters: NotifyFilters) -> Self {
        Self {
            root: paths::with_trailing_separator(root),
            recursive,
            filter: translate_filter(filters),
        }
    }

    /// The watch root, with its trailing separator.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether subdirectories are reported.
    #[must_use]
    pub const fn recursive(&self) -> bool {
        self.recursive
    }

    /// The native filter mask.
    #[must_use]
    pub const fn filter(&self) -> EventFlags {
        self.filter
    }

    /// Returns the notifications for one native batch, lazily.
    pub fn process<'a>(&'a self, events: &'a [RawEvent]) -> Batch<'a> {
        Batch {
            processor: self,
            events,
            index: 0,
            paired: None,
            pending: Pending::new().into_iter(),
            done: false,
        }
    }

    fn is_root(&self, path: &str) -> bool {
        paths::eq_ignore_case(path, paths::trim_root(self.root.as_str()))
    }

    fn is_direct_child(&self, path: &str) -> bool {
        let parent = match path.rfind(SEPARATOR) {
            Some(0) => "/",
            Some(index) => &path[..index],
            None => return false,
        };
        paths::eq_ignore_case(parent, paths::trim_root(self.root.as_str()))
    }

    fn relative<'p>(&self, path: &'p str) -> Option<&'p str> {
        paths::strip_root(path, self.root.as_str()).filter(|rel| !rel.is_empty())
    }
}

/// Lazy notifications for one batch. See [`BatchProcessor::process`].
pub struct Batch<'a> {
    processor: &'a BatchProcessor,
    events: &'a [RawEvent],
    index: usize,
    paired: Option<usize>,
    pending: smallvec::IntoIter<[FsEvent; 4]>,
    done: bool,
}

enum Step {
    Skip,
    Emit(Pending),
    Overflow(WatchError),
}

impl Iterator for Batch<'_> {
    type Item = Result<FsEvent, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.next() {
                return Some(Ok(event));
            }
            if self.done || self.index >= self.events.len() {
                self.done = true;
                return None;
            }

            let index = self.index;
            self.index += 1;
            match self.step(index) {
                Step::Skip => {}
                Step::Emit(events) => self.pending = events.into_iter(),
                Step::Overflow(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

impl Batch<'_> {
    fn step(&mut self, index: usize) -> Step {
        let processor = self.processor;
        let events = self.events;
        let event = &events[index];

        let Some(path) = decode_path(&event.path) else {
            return Step::Skip;
        };

        if processor.is_root(path) {
            tracing::trace!(path = %path, "Skipping event for the watch root");
            return Step::Skip;
        }

        if event.flags.requires_rescan() {
            tracing::debug!(path = %path, flags = ?event.flags, "Event stream requires rescan");
            return Step::Overflow(WatchError::BufferOverflow {
                flags: event.flags.bits(),
            });
        }

        if self.paired == Some(index) {
            tracing::trace!(path = %path, "Skipping second half of rename pair");
            return Step::Skip;
        }

        if !processor.recursive && !processor.is_direct_child(path) {
            tracing::trace!(path = %path, "Skipping event outside non-recursive root");
            return Step::Skip;
        }

        let types = ChangeTypes::classify(event.flags, processor.filter);
        if types.is_empty() {
            tracing::trace!(path = %path, flags = ?event.flags, "Event filtered out");
            return Step::Skip;
        }

        let Some(relative) = processor.relative(path) else {
            tracing::trace!(path = %path, root = %processor.root, "Event outside watch root");
            return Step::Skip;
        };
        let relative = Utf8PathBuf::from(relative);

        let mut out = Pending::new();
        if types.contains(ChangeTypes::CHANGED) {
            out.push(FsEvent::Changed {
                path: relative.clone(),
            });
        }
        if types.contains(ChangeTypes::CREATED) {
            out.push(FsEvent::Created {
                path: relative.clone(),
            });
        }
        if types.contains(ChangeTypes::DELETED) {
            out.push(FsEvent::Deleted {
                path: relative.clone(),
            });
        }

        if types.contains(ChangeTypes::RENAMED) {
            if let Some((pair, new_path)) = self.rename_pair(index) {
                self.paired = Some(pair);
                out.push(FsEvent::Renamed {
                    old_path: relative,
                    new_path,
                });
            } else if paths::path_exists(Utf8Path::new(path), event.flags.is_file()) {
                if !types.contains(ChangeTypes::CREATED) {
                    out.push(FsEvent::Created { path: relative });
                }
            } else if !types.contains(ChangeTypes::DELETED) {
                out.push(FsEvent::Deleted { path: relative });
            }
        }

        Step::Emit(out)
    }

    /// Finds the other half of a rename at `index + 1`, if the ids are
    /// adjacent and it lands inside the watched tree.
    fn rename_pair(&self, index: usize) -> Option<(usize, Utf8PathBuf)> {
        let current = &self.events[index];
        let candidate_index = index + 1;
        let candidate = self.events.get(candidate_index)?;

        if current.id.checked_add(1) != Some(candidate.id)
            || !candidate.flags.contains(EventFlags::ITEM_RENAMED)
        {
            return None;
        }

        let path = std::str::from_utf8(&candidate.path).ok()?;
        let relative = self.processor.relative(path)?;
        Some((candidate_index, Utf8PathBuf::from(relative)))
    }
}

/// Decodes a native path, rejecting contract violations.
fn decode_path(raw: &[u8]) -> Option<&str> {
    if raw.is_empty() {
        tracing::error!("Rejected event with an empty path");
        return None;
    }
    let Ok(path) = std::str::from_utf8(raw) else {
        tracing::error!(
            path = %String::from_utf8_lossy(raw),
            "Rejected event with a non-UTF-8 path"
        );
        return None;
    };
    if path.len() > 1 && path.ends_with(SEPARATOR) {
        tracing::error!(path = %path, "Rejected event path with a trailing separator");
        return None;
    }
    Some(path)
}
