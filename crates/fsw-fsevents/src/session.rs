//! One active watch: its stream, pump registration, and correlation token.
//!
//! # Lifecycle
//!
//! ```text
//! new()   resolve root (absolute, symlinks resolved, trailing separator)
//! start() flush ─► token ─► create stream ─► register with pump
//!         ─► start delivery ─► bind cancellation
//! stop()  take state once ─► unbind ─► stop delivery ─► unregister
//!         ─► release stream ─► invalidate token
//! ```
//!
//! Teardown can be triggered by [`WatchSession::stop`], by the cancellation
//! token passed to [`WatchSession::start`], by dropping the session, or by the
//! pump thread when a batch arrives after the owner has gone away. Whichever
//! runs first does the work; the rest find nothing to do.

use std::io;
use std::sync::{Arc, Weak};

use camino::Utf8Path;
use fsw_core::NotifyFilters;
use fsw_core::paths;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::batch::BatchProcessor;
use crate::bridge::{BatchTarget, ContextSnapshot, CorrelationToken};
use crate::error::WatchError;
use crate::events::RawEvent;
use crate::handle::NativeStreamHandle;
use crate::pump::{EventPump, Registration};
use crate::sink::{self, EventSink};

/// A watch over one directory, delivering into a weakly held sink.
pub struct WatchSession<B: Backend> {
    shared: Arc<SessionShared<B>>,
}

struct SessionShared<B: Backend> {
    pump: Arc<EventPump<B>>,
    processor: BatchProcessor,
    owner: Weak<dyn EventSink>,
    context: Mutex<ContextSnapshot>,
    active: Mutex<Option<Active<B>>>,
}

struct Active<B: Backend> {
    token: CorrelationToken,
    handle: NativeStreamHandle<B>,
    registration: Registration<B>,
    unbind: CancellationToken,
}

impl<B: Backend> WatchSession<B> {
    /// Creates an idle session for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Root`] if the path cannot be resolved and
    /// [`WatchError::NotADirectory`] if it is not a directory.
    pub fn new(
        pump: Arc<EventPump<B>>,
        path: &Utf8Path,
        recursive: bool,
        filters: NotifyFilters,
        owner: Weak<dyn EventSink>,
    ) -> Result<Self, WatchError> {
        let root = paths::resolve_watch_root(path).map_err(|source| WatchError::root(path, source))?;
        if !paths::path_exists(&root, false) {
            return Err(WatchError::NotADirectory(path.to_owned()));
        }

        Ok(Self {
            shared: Arc::new(SessionShared {
                pump,
                processor: BatchProcessor::new(&root, recursive, filters),
                owner,
                context: Mutex::new(ContextSnapshot::capture()),
                active: Mutex::new(None),
            }),
        })
    }

    /// The resolved root, with its trailing separator.
    #[must_use]
    pub fn root_path(&self) -> &Utf8Path {
        self.shared.processor.root()
    }

    /// Returns `true` between a successful start and teardown.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.lock().is_some()
    }

    /// Starts native delivery. A no-op while already active.
    ///
    /// Cancelling `cancellation` tears the session down. If native delivery
    /// cannot be started, the session is torn down and the failure is sent
    /// to the owner's error sink; `start` itself still returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NoRuntime`] outside a tokio runtime,
    /// [`WatchError::StreamCreate`] if the stream cannot be created, and
    /// [`WatchError::PumpStart`] if the pump thread cannot be started.
    pub fn start(&self, cancellation: CancellationToken) -> Result<(), WatchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let shared = &self.shared;
        let root = shared.processor.root();

        let mut active = shared.active.lock();
        if active.is_some() {
            tracing::debug!(path = %root, "Watch session already started");
            return Ok(());
        }

        let backend = Arc::clone(shared.pump.backend());
        backend.flush_filesystem();
        *shared.context.lock() = ContextSnapshot::capture();

        let target: Arc<dyn BatchTarget> = Arc::clone(shared) as Arc<dyn BatchTarget>;
        let token = CorrelationToken::register(target);

        let stream = match backend.create_stream(root, token.id()) {
            Ok(stream) => stream,
            Err(error) => {
                token.invalidate();
                return Err(error);
            }
        };
        let mut handle = NativeStreamHandle::new(Arc::clone(&backend), stream.clone());

        let registration = match shared.pump.register(&stream) {
            Ok(registration) => registration,
            Err(error) => {
                handle.close();
                token.invalidate();
                return Err(error);
            }
        };

        if !backend.start_stream(&stream) {
            let code = io::Error::last_os_error().raw_os_error().unwrap_or_default();
            drop(registration);
            handle.close();
            token.invalidate();
            drop(active);

            tracing::error!(path = %root, code, "Failed to start event stream");
            if let Some(owner) = shared.owner.upgrade() {
                owner.notify_error(WatchError::StartFailed {
                    path: root.to_owned(),
                    code,
                });
            }
            return Ok(());
        }

        let unbind = CancellationToken::new();
        let binding = unbind.clone();
        let weak = Arc::downgrade(shared);
        runtime.spawn(async move {
            tokio::select! {
                () = cancellation.cancelled() => {
                    if let Some(shared) = weak.upgrade() {
                        shared.teardown();
                    }
                }
                () = binding.cancelled() => {}
            }
        });

        *active = Some(Active {
            token,
            handle,
            registration,
            unbind,
        });
        tracing::info!(
            path = %root,
            recursive = shared.processor.recursive(),
            "Watch session started"
        );
        Ok(())
    }

    /// Tears the session down. Idempotent and safe from any thread.
    pub fn stop(&self) {
        self.shared.teardown();
    }
}

impl<B: Backend> Drop for WatchSession<B> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl<B: Backend> std::fmt::Debug for WatchSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("root", &self.root_path())
            .field("recursive", &self.shared.processor.recursive())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> SessionShared<B> {
    fn teardown(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };
        let Active {
            token,
            mut handle,
            registration,
            unbind,
        } = active;

        unbind.cancel();
        if let Some(stream) = handle.stream() {
            self.pump.backend().stop_stream(stream);
        }
        drop(registration);
        handle.close();
        token.invalidate();

        tracing::info!(path = %self.processor.root(), "Watch session stopped");
    }
}

impl<B: Backend> BatchTarget for SessionShared<B> {
    fn on_batch(&self, events: &[RawEvent]) {
        let Some(owner) = self.owner.upgrade() else {
            tracing::debug!(path = %self.processor.root(), "Watch owner dropped, tearing down session");
            self.teardown();
            return;
        };

        let context = self.context.lock().clone();
        let _ambient = context.restore();

        let span = tracing::debug_span!(
            "fsevents_batch",
            root = %self.processor.root(),
            events = events.len()
        );
        span.in_scope(|| {
            for item in self.processor.process(events) {
                sink::deliver(owner.as_ref(), item);
            }
        });

        *self.context.lock() = ContextSnapshot::capture();
    }
}
