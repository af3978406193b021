//! In-process backend used by the unit tests.
//!
//! Run loops are channels: `run` drains messages until it sees a stop, and
//! injected batches are delivered through the bridge exactly as the native
//! callback would deliver them, on the pump thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::backend::Backend;
use crate::bridge;
use crate::error::WatchError;
use crate::events::RawEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimStream(u64);

enum LoopMsg {
    Stop,
    Deliver {
        stream: u64,
        events: Vec<RawEvent>,
        ack: Option<mpsc::Sender<()>>,
    },
}

#[derive(Clone)]
pub struct SimRunLoop {
    tx: mpsc::Sender<LoopMsg>,
    rx: Arc<Mutex<mpsc::Receiver<LoopMsg>>>,
}

struct StreamState {
    token: usize,
    root: Utf8PathBuf,
    started: bool,
    released: bool,
    run_loop: Option<SimRunLoop>,
}

#[derive(Default)]
pub struct SimBackend {
    streams: Mutex<FxHashMap<u64, StreamState>>,
    next_stream: AtomicU64,
    flushes: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
    loop_threads: Mutex<Vec<String>>,
    fail_create: AtomicBool,
    fail_start: AtomicBool,
    fail_loop: AtomicBool,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Makes the next pump thread die before it signals readiness.
    pub fn fail_loop(&self, fail: bool) {
        self.fail_loop.store(fail, Ordering::SeqCst);
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn loop_thread_names(&self) -> Vec<String> {
        self.loop_threads.lock().clone()
    }

    pub fn is_scheduled(&self, stream: &SimStream) -> bool {
        self.streams
            .lock()
            .get(&stream.0)
            .is_some_and(|state| state.run_loop.is_some())
    }

    /// Correlation token of the most recently created stream for `root`.
    pub fn token_for(&self, root: &Utf8Path) -> Option<usize> {
        let streams = self.streams.lock();
        streams
            .iter()
            .filter(|(_, state)| state.root == root)
            .max_by_key(|(id, _)| **id)
            .map(|(_, state)| state.token)
    }

    /// Number of streams created and not yet released.
    pub fn open_streams(&self) -> usize {
        self.streams
            .lock()
            .values()
            .filter(|state| !state.released)
            .count()
    }

    /// Queues `events` on the run loop of the live stream watching `root`.
    ///
    /// Returns `false` if no such stream is attached to a run loop.
    pub fn inject(&self, root: &Utf8Path, events: Vec<RawEvent>) -> bool {
        self.send(root, events, None)
    }

    /// Like [`SimBackend::inject`], but waits until the pump thread has
    /// finished delivering the batch.
    pub fn inject_and_wait(&self, root: &Utf8Path, events: Vec<RawEvent>) -> bool {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(root, events, Some(ack_tx)) && ack_rx.recv_timeout(Duration::from_secs(5)).is_ok()
    }

    fn send(&self, root: &Utf8Path, events: Vec<RawEvent>, ack: Option<mpsc::Sender<()>>) -> bool {
        let target = self.streams.lock().iter().find_map(|(id, state)| {
            (!state.released && state.root == root)
                .then(|| state.run_loop.as_ref().map(|rl| (*id, rl.tx.clone())))
                .flatten()
        });
        let Some((stream, tx)) = target else {
            return false;
        };
        tx.send(LoopMsg::Deliver {
            stream,
            events,
            ack,
        })
        .is_ok()
    }

    fn deliverable(&self, stream: u64) -> Option<usize> {
        self.streams
            .lock()
            .get(&stream)
            .filter(|state| state.started && !state.released && state.run_loop.is_some())
            .map(|state| state.token)
    }
}

impl Backend for SimBackend {
    type Stream = SimStream;
    type RunLoop = SimRunLoop;

    fn flush_filesystem(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn create_stream(&self, root: &Utf8Path, token: usize) -> Result<SimStream, WatchError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WatchError::StreamCreate(root.to_owned()));
        }
        let id = self.next_stream.fetch_add(1, Ordering::SeqCst);
        self.streams.lock().insert(
            id,
            StreamState {
                token,
                root: root.to_owned(),
                started: false,
                released: false,
                run_loop: None,
            },
        );
        Ok(SimStream(id))
    }

    #[allow(clippy::panic)]
    fn current_run_loop(&self) -> SimRunLoop {
        if self.fail_loop.load(Ordering::SeqCst) {
            panic!("run loop unavailable");
        }
        if let Some(name) = thread::current().name() {
            self.loop_threads.lock().push(name.to_owned());
        }
        let (tx, rx) = mpsc::channel();
        SimRunLoop {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    fn schedule(&self, stream: &SimStream, run_loop: &SimRunLoop) {
        if let Some(state) = self.streams.lock().get_mut(&stream.0) {
            state.run_loop = Some(run_loop.clone());
        }
    }

    fn unschedule(&self, stream: &SimStream, _run_loop: &SimRunLoop) {
        if let Some(state) = self.streams.lock().get_mut(&stream.0) {
            state.run_loop = None;
        }
    }

    fn run(&self, run_loop: &SimRunLoop) {
        let rx = run_loop.rx.lock();
        while let Ok(msg) = rx.recv() {
            match msg {
                LoopMsg::Stop => break,
                LoopMsg::Deliver {
                    stream,
                    events,
                    ack,
                } => {
                    if let Some(token) = self.deliverable(stream) {
                        bridge::dispatch(token, &events);
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
            }
        }
    }

    fn stop_run_loop(&self, run_loop: &SimRunLoop) {
        let _ = run_loop.tx.send(LoopMsg::Stop);
    }

    fn start_stream(&self, stream: &SimStream) -> bool {
        if self.fail_start.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(state) = self.streams.lock().get_mut(&stream.0) {
            state.started = true;
        }
        true
    }

    fn stop_stream(&self, stream: &SimStream) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(state) = self.streams.lock().get_mut(&stream.0) {
            state.started = false;
        }
    }

    fn release_stream(&self, stream: SimStream) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let token = self.streams.lock().get_mut(&stream.0).map(|state| {
            state.released = true;
            state.run_loop = None;
            state.token
        });
        // Native streams hand their context back once they are deallocated.
        if let Some(token) = token {
            bridge::release(token);
        }
    }
}
