//! The native operations the pump and sessions are written against.
//!
//! [`Backend`] is the seam between the platform-independent lifecycle code
//! (pump, session, bridge) and the CoreFoundation/FSEvents calls. The macOS
//! implementation lives in [`crate::macos`].

use camino::Utf8Path;

use crate::error::WatchError;

/// Native stream and run-loop operations.
///
/// A `Stream` value is a non-owning reference to a native stream: cloning it
/// does not retain anything, and exactly one [`Backend::release_stream`] call
/// ends its life. A `RunLoop` value keeps its run loop alive for as long as it
/// exists, so stopping a loop whose thread is exiting stays sound.
pub trait Backend: Send + Sync + 'static {
    /// Non-owning stream reference.
    type Stream: Clone + Send + Sync + 'static;
    /// Retained run-loop reference.
    type RunLoop: Clone + Send + 'static;

    /// Flushes file-system buffers so pending writes are not reported as new.
    fn flush_filesystem(&self);

    /// Creates a stream for `root` with per-file events, starting now, with no
    /// coalescing delay. `token` is handed back to the callback bridge on every
    /// batch and once more when the stream releases it.
    fn create_stream(&self, root: &Utf8Path, token: usize) -> Result<Self::Stream, WatchError>;

    /// Returns the calling thread's run loop.
    fn current_run_loop(&self) -> Self::RunLoop;

    /// Attaches `stream` to `run_loop`.
    fn schedule(&self, stream: &Self::Stream, run_loop: &Self::RunLoop);

    /// Detaches `stream` from `run_loop`.
    fn unschedule(&self, stream: &Self::Stream, run_loop: &Self::RunLoop);

    /// Runs `run_loop` on the calling thread until it is stopped.
    fn run(&self, run_loop: &Self::RunLoop);

    /// Asks `run_loop` to return from [`Backend::run`]. Never blocks.
    fn stop_run_loop(&self, run_loop: &Self::RunLoop);

    /// Starts event delivery. Returns `false` on failure.
    fn start_stream(&self, stream: &Self::Stream) -> bool;

    /// Stops event delivery.
    fn stop_stream(&self, stream: &Self::Stream);

    /// Invalidates and releases the native stream.
    fn release_stream(&self, stream: Self::Stream);
}
