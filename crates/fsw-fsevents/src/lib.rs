//! macOS FSEvents backend with a shared event pump and async event streaming.
//!
//! This crate watches a directory tree through FSEvents and turns native
//! batches into change notifications relative to the watch root: changed,
//! created, deleted, and paired renames.
//!
//! # Overview
//!
//! - One process-wide [`EventPump`] thread runs a native run loop that every
//!   stream is attached to. The thread starts with the first session and
//!   exits when the last one detaches.
//! - A [`WatchSession`] owns one stream for one root and delivers into an
//!   [`EventSink`] held weakly, so a dropped owner tears the session down on
//!   its next batch.
//! - Native callbacks find their session through an integer correlation token
//!   resolved in the [`bridge`] side table; a stale token is a silent no-op.
//! - The [`BatchProcessor`] filters, pairs renames, and reports buffer
//!   overflows as [`WatchError::BufferOverflow`].
//! - [`FsWatcher`] is the async owner: it bridges a session to a tokio
//!   channel.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────── fsw-event-pump thread ─────────────────────────────┐
//! │  run loop ──► native callback ──► bridge::dispatch(token)                       │
//! │                                        │                                        │
//! │                                        ▼                                        │
//! │                     WatchSession::on_batch ──► BatchProcessor ──► EventSink     │
//! └─────────────────────────────────────────────────────────────────────────│───────┘
//!                                                                           │ try_send
//!                                                                           ▼
//!                                                   FsWatcher (tokio mpsc::Receiver)
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! fsw-cli ──► fsw-fsevents ──► fsw-core
//! ```
//!
//! # Usage
//!
//! ## Basic File Watching
//!
//! ```no_run
//! # #[cfg(target_os = "macos")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use camino::Utf8Path;
//! use fsw_core::WatchConfig;
//! use fsw_fsevents::FsWatcher;
//!
//! let mut watcher = FsWatcher::new(Utf8Path::new("/path/to/project"), &WatchConfig::default()).await?;
//!
//! while let Some(item) = watcher.recv().await {
//!     match item {
//!         Ok(event) => println!("{event}"),
//!         Err(error) if error.is_recoverable() => eprintln!("rescan needed: {error}"),
//!         Err(error) => return Err(error.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Sinks
//!
//! Implement [`EventSink`] and drive a [`WatchSession`] directly when a
//! channel is not the right shape. Sink methods run on the pump thread and
//! must not block.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod batch;
pub mod bridge;
pub mod error;
pub mod events;
pub mod handle;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod pump;
pub mod session;
pub mod sink;
pub mod watcher;

#[cfg(test)]
mod sim;

// Re-export the native seam
pub use backend::Backend;
#[cfg(target_os = "macos")]
pub use macos::FsEventsBackend;

// Re-export lifecycle types
pub use bridge::{BatchTarget, ContextSnapshot, CorrelationToken};
pub use handle::NativeStreamHandle;
#[cfg(target_os = "macos")]
pub use pump::shared;
pub use pump::{EventPump, Registration};
pub use session::WatchSession;

// Re-export event processing types
pub use batch::{Batch, BatchProcessor};
pub use error::WatchError;
pub use events::{EventStats, FsEvent, RawEvent};
pub use sink::EventSink;

// Re-export watcher types
pub use watcher::{FsWatcher, WatchItem};
