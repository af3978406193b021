//! File watcher with async event streaming.
//!
//! This module provides the [`FsWatcher`] type that bridges a
//! [`WatchSession`] running on the shared event pump to the async tokio
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Pump Thread (one per process)                │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐   │
//! │  │ FSEvents stream  │ -> │ BatchProcessor │ -> │ ChannelSink│   │
//! │  │ (native run loop)│    │ (pair/filter)  │    │ (try_send) │   │
//! │  └──────────────────┘    └────────────────┘    └─────┬──────┘   │
//! └──────────────────────────────────────────────────────│──────────┘
//!                                                        │
//!                                              try_send  │
//!                                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ FsWatcher        │    │ mpsc::Receiver │ -> consumer loop    │
//! │  │ (cancellation)   │    │ (events)       │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! # #[cfg(target_os = "macos")]
//! # async fn example() -> Result<(), fsw_fsevents::WatchError> {
//! use camino::Utf8Path;
//! use fsw_core::WatchConfig;
//! use fsw_fsevents::FsWatcher;
//!
//! let mut watcher = FsWatcher::new(Utf8Path::new("./src"), &WatchConfig::default()).await?;
//!
//! while let Some(item) = watcher.recv().await {
//!     match item {
//!         Ok(event) => println!("{event}"),
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use camino::{Utf8Path, Utf8PathBuf};
use fsw_core::{ChangeKind, WatchConfig, paths};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::error::WatchError;
use crate::events::FsEvent;
use crate::pump::EventPump;
use crate::session::WatchSession;
use crate::sink::EventSink;

/// Item type carried by the watcher channel.
pub type WatchItem = Result<FsEvent, WatchError>;

/// A file watcher that streams events to an async context.
///
/// `FsWatcher` is the owner of a [`WatchSession`]: it holds the sink the
/// session delivers into, so dropping the watcher also makes any in-flight
/// batch tear the session down.
///
/// # Lifecycle
///
/// 1. **Creation**: validates the configuration, resolves the path, and
///    starts a session on the event pump.
///
/// 2. **Event Reception**: use `recv()` or `try_recv()`. Overflows and start
///    failures arrive as `Err` items.
///
/// 3. **Shutdown**: call `shutdown()`, or simply drop the watcher. Both cancel
///    the session's cancellation token.
///
/// # Backpressure
///
/// The sink runs on the shared pump thread and never waits: when the channel
/// is full, the notification is dropped and a warning is logged.
pub struct FsWatcher<B: Backend> {
    /// Cancels the session; shared with its cancellation binding.
    cancellation: CancellationToken,

    /// The running session.
    session: WatchSession<B>,

    /// Keeps the session's weak owner reference alive.
    _sink: Arc<ChannelSink>,

    /// Event receiver for async consumption.
    event_rx: mpsc::Receiver<WatchItem>,

    /// The resolved root, without its trailing separator.
    watch_path: Utf8PathBuf,
}

impl<B: Backend> std::fmt::Debug for FsWatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("watch_path", &self.watch_path)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(target_os = "macos")]
impl FsWatcher<crate::macos::FsEventsBackend> {
    /// Creates a watcher on the process-wide FSEvents pump.
    ///
    /// # Errors
    ///
    /// See [`FsWatcher::with_pump`].
    #[allow(clippy::unused_async)] // Async for API consistency with recv()
    pub async fn new(path: &Utf8Path, config: &WatchConfig) -> Result<Self, WatchError> {
        Self::with_pump(crate::pump::shared(), path, config)
    }
}

impl<B: Backend> FsWatcher<B> {
    /// Creates a watcher on a specific pump.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] for an invalid configuration,
    /// [`WatchError::Root`] / [`WatchError::NotADirectory`] for a bad path,
    /// and any setup error from [`WatchSession::start`].
    pub fn with_pump(
        pump: Arc<EventPump<B>>,
        path: &Utf8Path,
        config: &WatchConfig,
    ) -> Result<Self, WatchError> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let sink = Arc::new(ChannelSink {
            tx: event_tx,
            root: path.to_owned(),
        });
        let owner: Weak<dyn EventSink> = Arc::downgrade(&sink) as Weak<dyn EventSink>;

        let session = WatchSession::new(pump, path, config.recursive, config.notify_filters, owner)?;
        let watch_path = Utf8PathBuf::from(paths::trim_root(session.root_path().as_str()));

        let cancellation = CancellationToken::new();
        session.start(cancellation.clone())?;

        Ok(Self {
            cancellation,
            session,
            _sink: sink,
            event_rx,
            watch_path,
        })
    }

    /// Receives the next item asynchronously.
    ///
    /// Returns `None` once the watcher has been shut down and the channel
    /// has drained.
    pub async fn recv(&mut self) -> Option<WatchItem> {
        self.event_rx.recv().await
    }

    /// Tries to receive an item without waiting.
    pub fn try_recv(&mut self) -> Result<WatchItem, mpsc::error::TryRecvError> {
        self.event_rx.try_recv()
    }

    /// Returns a mutable reference to the event receiver.
    ///
    /// This is useful with `tokio::select!` or other channel operations.
    pub fn events(&mut self) -> &mut mpsc::Receiver<WatchItem> {
        &mut self.event_rx
    }

    /// Returns the resolved path being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns `true` while the session is delivering events.
    ///
    /// Turns `false` after shutdown, or if native delivery failed to start.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancellation.is_cancelled() && self.session.is_active()
    }

    /// Stops the session and closes the watcher.
    pub fn shutdown(self) {
        self.cancellation.cancel();
        self.session.stop();
        tracing::debug!(path = %self.watch_path, "File watcher shut down");
    }
}

impl<B: Backend> Drop for FsWatcher<B> {
    fn drop(&mut self) {
        // The session's own Drop tears down synchronously; cancelling also
        // ends its cancellation binding.
        self.cancellation.cancel();
    }
}

/// Sink forwarding notifications into the watcher channel.
struct ChannelSink {
    tx: mpsc::Sender<WatchItem>,
    root: Utf8PathBuf,
}

impl ChannelSink {
    fn send(&self, item: WatchItem) {
        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    root = %self.root,
                    item = ?dropped,
                    "Event channel full, dropping notification"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(root = %self.root, "Event channel closed");
            }
        }
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, kind: ChangeKind, path: &Utf8Path) {
        tracing::trace!(kind = %kind, path = %path, "File event");
        match FsEvent::new(kind, path.to_owned()) {
            Some(event) => self.send(Ok(event)),
            None => tracing::error!(path = %path, "Rename notification without an old path"),
        }
    }

    fn notify_rename(&self, new_path: &Utf8Path, old_path: &Utf8Path) {
        tracing::trace!(old = %old_path, new = %new_path, "Rename event");
        self.send(Ok(FsEvent::Renamed {
            old_path: old_path.to_owned(),
            new_path: new_path.to_owned(),
        }));
    }

    fn notify_error(&self, error: WatchError) {
        self.send(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawEvent;
    use crate::sim::SimBackend;
    use fsw_core::{EventFlags, NotifyFilters};
    use std::time::Duration;
    use tempfile::TempDir;

    // Helper to create a temp directory for testing
    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp directory")
    }

    fn sim_pump() -> Arc<EventPump<SimBackend>> {
        Arc::new(EventPump::new(SimBackend::new()))
    }

    fn root_of(watcher: &FsWatcher<SimBackend>) -> Utf8PathBuf {
        paths::with_trailing_separator(watcher.watch_path())
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();

        let watcher = FsWatcher::with_pump(Arc::clone(&pump), path, &WatchConfig::default())
            .expect("Watcher should be created");

        assert!(watcher.is_running());
        assert!(!watcher.watch_path().as_str().ends_with('/'));
        assert_eq!(pump.registered_count(), 1);
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let path = Utf8Path::new("/nonexistent/path/that/does/not/exist");
        let result = FsWatcher::with_pump(sim_pump(), path, &WatchConfig::default());

        match result {
            Err(WatchError::Root { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Root error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watcher_rejects_invalid_config() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let config = WatchConfig {
            notify_filters: NotifyFilters::empty(),
            ..WatchConfig::default()
        };

        let result = FsWatcher::with_pump(sim_pump(), path, &config);
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[tokio::test]
    async fn test_watcher_receives_events() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();
        let mut watcher = FsWatcher::with_pump(Arc::clone(&pump), path, &WatchConfig::default())
            .expect("Failed to create watcher");

        let root = root_of(&watcher);
        pump.backend().inject(
            &root,
            vec![RawEvent::new(
                format!("{root}test.txt"),
                EventFlags::ITEM_CREATED | EventFlags::IS_FILE,
                1,
            )],
        );

        let item = tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("timed out")
            .expect("channel open");
        let event = item.expect("event, not error");
        assert_eq!(event, FsEvent::Created { path: "test.txt".into() });
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();
        let config = WatchConfig {
            channel_capacity: 1,
            ..WatchConfig::default()
        };
        let mut watcher =
            FsWatcher::with_pump(Arc::clone(&pump), path, &config).expect("Failed to create watcher");

        let root = root_of(&watcher);
        let flags = EventFlags::ITEM_CREATED | EventFlags::IS_FILE;
        assert!(pump.backend().inject_and_wait(
            &root,
            vec![
                RawEvent::new(format!("{root}a"), flags, 1),
                RawEvent::new(format!("{root}b"), flags, 3),
            ],
        ));

        let first = watcher.try_recv().expect("first item").expect("event");
        assert_eq!(first.path().as_str(), "a");
        assert!(matches!(
            watcher.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));

        // The pump kept going: a later batch is delivered normally.
        assert!(pump.backend().inject_and_wait(
            &root,
            vec![RawEvent::new(format!("{root}c"), flags, 5)],
        ));
        let next = watcher.try_recv().expect("next item").expect("event");
        assert_eq!(next.path().as_str(), "c");
    }

    #[tokio::test]
    async fn test_watcher_shutdown() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();
        let watcher = FsWatcher::with_pump(Arc::clone(&pump), path, &WatchConfig::default())
            .expect("Failed to create watcher");

        watcher.shutdown();

        assert_eq!(pump.registered_count(), 0);
        assert_eq!(pump.backend().release_count(), 1);
    }

    #[tokio::test]
    async fn test_watcher_drop_stops_session() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();
        let watcher = FsWatcher::with_pump(Arc::clone(&pump), path, &WatchConfig::default())
            .expect("Failed to create watcher");

        drop(watcher);

        assert_eq!(pump.registered_count(), 0);
        assert!(!pump.is_running());
    }

    #[tokio::test]
    async fn test_start_failure_is_delivered_on_channel() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");
        let pump = sim_pump();
        pump.backend().fail_start(true);

        let mut watcher = FsWatcher::with_pump(Arc::clone(&pump), path, &WatchConfig::default())
            .expect("start failures are asynchronous");

        assert!(!watcher.is_running());
        match watcher.try_recv() {
            Ok(Err(WatchError::StartFailed { .. })) => {}
            other => panic!("Expected StartFailed, got {other:?}"),
        }
    }
}
