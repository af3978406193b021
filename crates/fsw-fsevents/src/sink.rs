//! The owner-side interface a session delivers into.

use camino::Utf8Path;
use fsw_core::ChangeKind;

use crate::error::WatchError;
use crate::events::FsEvent;

/// Receives notifications from a watch session.
///
/// Every method is called synchronously on the pump thread, which services
/// all sessions in the process, so implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    /// A single-path change, relative to the watch root.
    fn notify(&self, kind: ChangeKind, path: &Utf8Path);

    /// A rename within the watched tree.
    fn notify_rename(&self, new_path: &Utf8Path, old_path: &Utf8Path);

    /// An error; overflows arrive here as [`WatchError::BufferOverflow`].
    fn notify_error(&self, error: WatchError);
}

/// Routes one processor output to the matching sink method.
pub(crate) fn deliver(sink: &dyn EventSink, item: Result<FsEvent, WatchError>) {
    match item {
        Ok(FsEvent::Renamed { old_path, new_path }) => sink.notify_rename(&new_path, &old_path),
        Ok(event) => sink.notify(event.kind(), event.path()),
        Err(error) => sink.notify_error(error),
    }
}
