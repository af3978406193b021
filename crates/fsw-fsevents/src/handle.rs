//! Owning wrapper around one native stream.

use std::sync::Arc;

use crate::backend::Backend;

/// Owns exactly one native stream and releases it once.
///
/// Closing is idempotent; dropping an open handle closes it.
pub struct NativeStreamHandle<B: Backend> {
    backend: Arc<B>,
    stream: Option<B::Stream>,
}

impl<B: Backend> NativeStreamHandle<B> {
    /// Takes ownership of `stream`.
    pub fn new(backend: Arc<B>, stream: B::Stream) -> Self {
        Self {
            backend,
            stream: Some(stream),
        }
    }

    /// Returns the stream while the handle is open.
    #[must_use]
    pub const fn stream(&self) -> Option<&B::Stream> {
        self.stream.as_ref()
    }

    /// Returns `true` until [`NativeStreamHandle::close`] has run.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Invalidates and releases the native stream. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.backend.release_stream(stream);
        }
    }
}

impl<B: Backend> Drop for NativeStreamHandle<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B: Backend> std::fmt::Debug for NativeStreamHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeStreamHandle")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
