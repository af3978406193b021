//! CoreFoundation/FSEvents implementation of [`Backend`].
//!
//! Every native call in the crate lives in this module. Streams are created
//! with per-file events, `kFSEventStreamEventIdSinceNow` and zero latency, and
//! carry their correlation token in the context `info` pointer as a plain
//! integer. The stream's `release` callback frees the token's side-table entry
//! once the stream is deallocated.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::ptr;
use std::slice;

use camino::Utf8Path;
use fsevent_sys as fs;
use fsevent_sys::core_foundation as cf;
use fsw_core::EventFlags;

use crate::backend::Backend;
use crate::bridge;
use crate::error::WatchError;
use crate::events::RawEvent;

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRetain(cf: cf::CFRef) -> cf::CFRef;
}

/// The FSEvents backend. Stateless; all state lives in the native objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsEventsBackend;

/// Non-owning `FSEventStreamRef`.
#[derive(Debug, Clone, Copy)]
pub struct NativeStream(fs::FSEventStreamRef);

// SAFETY: FSEventStreamRef is an opaque CoreFoundation object. The pump only
// touches it from one thread at a time (the session lock serializes start,
// stop and release; the pump lock serializes scheduling).
unsafe impl Send for NativeStream {}
// SAFETY: see above; shared references never mutate the pointer.
unsafe impl Sync for NativeStream {}

/// Retained `CFRunLoopRef`.
#[derive(Debug)]
pub struct RunLoop(cf::CFRunLoopRef);

// SAFETY: CFRunLoopStop and stream (un)scheduling are documented as callable
// from any thread, and the reference is retained for as long as this exists.
unsafe impl Send for RunLoop {}

impl Clone for RunLoop {
    fn clone(&self) -> Self {
        // SAFETY: self.0 is a live run loop we hold a retain on.
        unsafe { CFRetain(self.0) };
        Self(self.0)
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        // SAFETY: balances the retain taken in current_run_loop or clone.
        unsafe { cf::CFRelease(self.0) };
    }
}

impl Backend for FsEventsBackend {
    type Stream = NativeStream;
    type RunLoop = RunLoop;

    fn flush_filesystem(&self) {
        // SAFETY: sync(2) has no preconditions.
        unsafe { libc::sync() };
    }

    fn create_stream(&self, root: &Utf8Path, token: usize) -> Result<NativeStream, WatchError> {
        // SAFETY: every CF object created here is released on all paths; the
        // array retains the path string it is given.
        let paths = unsafe {
            let paths = cf::CFArrayCreateMutable(cf::kCFAllocatorDefault, 0, &cf::kCFTypeArrayCallBacks);
            let mut err: cf::CFErrorRef = ptr::null_mut();
            let cf_path = cf::str_path_to_cfstring_ref(root.as_str(), &mut err);
            if cf_path.is_null() {
                if !err.is_null() {
                    cf::CFRelease(err as cf::CFRef);
                }
                cf::CFRelease(paths);
                return Err(WatchError::StreamCreate(root.to_owned()));
            }
            cf::CFArrayAppendValue(paths, cf_path);
            cf::CFRelease(cf_path);
            paths
        };

        let context = fs::FSEventStreamContext {
            version: 0,
            info: ptr::without_provenance_mut(token),
            retain: None,
            release: Some(release_token),
            copy_description: None,
        };

        // SAFETY: `context` is copied by FSEventStreamCreate; `paths` is a
        // valid CFArray of CFStrings and is released once the stream holds it.
        let stream = unsafe {
            let stream = fs::FSEventStreamCreate(
                cf::kCFAllocatorDefault,
                event_callback,
                &context,
                paths,
                fs::kFSEventStreamEventIdSinceNow,
                0.0,
                fs::kFSEventStreamCreateFlagFileEvents | fs::kFSEventStreamCreateFlagNoDefer,
            );
            cf::CFRelease(paths);
            stream
        };

        if stream.is_null() {
            tracing::error!(root = %root, "FSEventStreamCreate returned null");
            return Err(WatchError::StreamCreate(root.to_owned()));
        }
        Ok(NativeStream(stream))
    }

    fn current_run_loop(&self) -> RunLoop {
        // SAFETY: CFRunLoopGetCurrent never fails; the extra retain is
        // balanced by RunLoop's Drop.
        unsafe {
            let run_loop = cf::CFRunLoopGetCurrent();
            CFRetain(run_loop);
            RunLoop(run_loop)
        }
    }

    fn schedule(&self, stream: &NativeStream, run_loop: &RunLoop) {
        // SAFETY: both objects are live; the default mode is a CF constant.
        unsafe { fs::FSEventStreamScheduleWithRunLoop(stream.0, run_loop.0, cf::kCFRunLoopDefaultMode) };
    }

    fn unschedule(&self, stream: &NativeStream, run_loop: &RunLoop) {
        // SAFETY: as in schedule.
        unsafe { fs::FSEventStreamUnscheduleFromRunLoop(stream.0, run_loop.0, cf::kCFRunLoopDefaultMode) };
    }

    fn run(&self, _run_loop: &RunLoop) {
        // SAFETY: runs the calling thread's loop, which is the one passed in.
        unsafe { cf::CFRunLoopRun() };
    }

    fn stop_run_loop(&self, run_loop: &RunLoop) {
        // SAFETY: the loop is retained, so this is sound even if its thread
        // has already returned from CFRunLoopRun.
        unsafe { cf::CFRunLoopStop(run_loop.0) };
    }

    fn start_stream(&self, stream: &NativeStream) -> bool {
        // SAFETY: the stream is live and scheduled.
        unsafe { fs::FSEventStreamStart(stream.0) != 0 }
    }

    fn stop_stream(&self, stream: &NativeStream) {
        // SAFETY: stopping an already stopped stream is a no-op.
        unsafe { fs::FSEventStreamStop(stream.0) };
    }

    fn release_stream(&self, stream: NativeStream) {
        // SAFETY: called exactly once per stream by NativeStreamHandle.
        unsafe {
            fs::FSEventStreamInvalidate(stream.0);
            fs::FSEventStreamRelease(stream.0);
        }
    }
}

extern "C" fn event_callback(
    _stream: fs::FSEventStreamRef,
    info: *mut libc::c_void,
    num_events: libc::size_t,
    event_paths: *mut libc::c_void,
    event_flags: *const fs::FSEventStreamEventFlags,
    event_ids: *const fs::FSEventStreamEventId,
) {
    if num_events == 0 || event_paths.is_null() || event_flags.is_null() || event_ids.is_null() {
        return;
    }

    // SAFETY: without kFSEventStreamCreateFlagUseCFTypes, FSEvents passes
    // `num_events` C strings and matching flag and id arrays.
    let (paths, flags, ids) = unsafe {
        (
            slice::from_raw_parts(event_paths as *const *const libc::c_char, num_events),
            slice::from_raw_parts(event_flags, num_events),
            slice::from_raw_parts(event_ids, num_events),
        )
    };

    let events: Vec<RawEvent> = paths
        .iter()
        .zip(flags)
        .zip(ids)
        .filter(|((path, _), _)| !path.is_null())
        .map(|((&path, &flags), &id)| {
            // SAFETY: non-null, NUL-terminated, valid for the callback.
            let bytes = unsafe { CStr::from_ptr(path) }.to_bytes().to_vec();
            RawEvent::new(bytes, EventFlags::from_bits_retain(flags), id)
        })
        .collect();

    bridge::dispatch(info.addr(), &events);
}

extern "C" fn release_token(info: *const libc::c_void) {
    bridge::release(info.addr());
}
