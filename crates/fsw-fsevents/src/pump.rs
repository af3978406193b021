//! The shared event pump.
//!
//! One background thread per pump runs a native run loop that services every
//! registered stream. The thread is spawned by the first registration and told
//! to stop when the last registration goes away; a later registration spins up
//! a fresh one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ EventPump (one mutex)                                        │
//! │   thread: Option<PumpThread>   registered: usize             │
//! │   invariant: thread.is_some() <=> registered > 0             │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ first register: spawn + wait for ready
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ "fsw-event-pump" thread                                      │
//! │   capture run loop ─► schedule stream ─► signal ─► run loop  │
//! │   (returns after stop_run_loop; then releases loop, exits)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::{io, thread};

use parking_lot::Mutex;

use crate::backend::Backend;
use crate::error::WatchError;

/// Name given to the pump thread.
pub const PUMP_THREAD_NAME: &str = "fsw-event-pump";

/// A process-wide registry of streams serviced by one background run loop.
pub struct EventPump<B: Backend> {
    backend: Arc<B>,
    state: Mutex<PumpState<B>>,
    live_threads: Arc<AtomicUsize>,
}

struct PumpState<B: Backend> {
    thread: Option<PumpThread<B>>,
    registered: usize,
}

struct PumpThread<B: Backend> {
    run_loop: B::RunLoop,
}

impl<B: Backend> EventPump<B> {
    /// Creates an idle pump over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            state: Mutex::new(PumpState {
                thread: None,
                registered: 0,
            }),
            live_threads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the backend the pump drives.
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Attaches `stream` to the pump's run loop.
    ///
    /// Spawns the pump thread if none is running and blocks until that thread
    /// has captured its run loop and attached the stream.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PumpStart`] if the thread cannot be spawned or
    /// dies before signalling readiness. Nothing stays registered in that case.
    pub fn register(self: &Arc<Self>, stream: &B::Stream) -> Result<Registration<B>, WatchError> {
        let mut state = self.state.lock();

        if let Some(thread) = &state.thread {
            self.backend.schedule(stream, &thread.run_loop);
        } else {
            let run_loop = self.spawn_thread(stream)?;
            state.thread = Some(PumpThread { run_loop });
        }
        state.registered += 1;

        tracing::debug!(registered = state.registered, "Stream registered with event pump");

        Ok(Registration {
            pump: Arc::clone(self),
            stream: Some(stream.clone()),
        })
    }

    /// Detaches a stream; stops the pump thread when it was the last one.
    ///
    /// Equivalent to dropping the registration.
    pub fn unregister(&self, registration: Registration<B>) {
        debug_assert!(std::ptr::eq(self, Arc::as_ptr(&registration.pump)));
        drop(registration);
    }

    /// Number of currently registered streams.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.state.lock().registered
    }

    /// Returns `true` while the pump holds a thread reference.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().thread.is_some()
    }

    /// Number of pump threads that have not exited yet.
    ///
    /// A stopped thread may still be winding down for a short while after
    /// [`EventPump::is_running`] turns `false`.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.live_threads.load(Ordering::Acquire)
    }

    fn spawn_thread(&self, stream: &B::Stream) -> Result<B::RunLoop, WatchError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let backend = Arc::clone(&self.backend);
        let stream = stream.clone();
        // Dropped on every exit path: normal return, unwind, or a closure
        // that never ran because the spawn failed.
        let live = LiveThread::new(Arc::clone(&self.live_threads));

        let spawned = thread::Builder::new()
            .name(PUMP_THREAD_NAME.to_owned())
            .spawn(move || {
                let _live = live;
                let run_loop = backend.current_run_loop();
                backend.schedule(&stream, &run_loop);

                if ready_tx.send(run_loop.clone()).is_ok() {
                    tracing::info!("Event pump thread started");
                    backend.run(&run_loop);
                }

                drop(run_loop);
                tracing::info!("Event pump thread exited");
            });

        if let Err(error) = spawned {
            tracing::error!(error = %error, "Failed to spawn event pump thread");
            return Err(WatchError::PumpStart(error));
        }

        ready_rx.recv().map_err(|_| {
            tracing::error!("Event pump thread exited before becoming ready");
            WatchError::PumpStart(io::Error::other(
                "event pump thread exited before becoming ready",
            ))
        })
    }

    fn release(&self, stream: &B::Stream) {
        let mut state = self.state.lock();
        let Some(thread) = &state.thread else {
            tracing::warn!("Unregister called on an idle event pump");
            return;
        };

        self.backend.unschedule(stream, &thread.run_loop);
        state.registered = state.registered.saturating_sub(1);
        tracing::debug!(registered = state.registered, "Stream unregistered from event pump");

        if state.registered == 0 {
            if let Some(thread) = state.thread.take() {
                self.backend.stop_run_loop(&thread.run_loop);
            }
            tracing::debug!("Last stream unregistered, stopping event pump thread");
        }
    }
}

/// Counts one pump thread as live until dropped.
struct LiveThread(Arc<AtomicUsize>);

impl LiveThread {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for LiveThread {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<B: Backend> std::fmt::Debug for EventPump<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventPump")
            .field("registered", &state.registered)
            .field("running", &state.thread.is_some())
            .field("live_threads", &self.live_threads())
            .finish_non_exhaustive()
    }
}

/// Proof that a stream is attached to a pump.
///
/// Dropping it detaches the stream.
#[must_use = "dropping a registration detaches the stream immediately"]
pub struct Registration<B: Backend> {
    pump: Arc<EventPump<B>>,
    stream: Option<B::Stream>,
}

impl<B: Backend> Drop for Registration<B> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.pump.release(&stream);
        }
    }
}

impl<B: Backend> std::fmt::Debug for Registration<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}

#[cfg(target_os = "macos")]
static SHARED: std::sync::LazyLock<Arc<EventPump<crate::macos::FsEventsBackend>>> =
    std::sync::LazyLock::new(|| Arc::new(EventPump::new(crate::macos::FsEventsBackend)));

/// Returns the process-wide FSEvents pump.
#[cfg(target_os = "macos")]
#[must_use]
pub fn shared() -> Arc<EventPump<crate::macos::FsEventsBackend>> {
    Arc::clone(&SHARED)
}
