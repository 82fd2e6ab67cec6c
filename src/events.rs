//! Fan-out bridge between native background callbacks and Rust handlers.
//!
//! The native library reports asynchronous failures and trace messages by
//! invoking registered function pointers on threads it owns. The
//! [`CallbackBridge`] is the stable anchor those pointers target: the loop
//! registers one trampoline per channel with a context pointer derived
//! from an `Arc<CallbackBridge>`, and the bridge fans each delivery out to
//! the currently subscribed handlers.
//!
//! The error channel is wired at loop construction and stays registered
//! for the life of the loop, so error subscription is thread-safe at any
//! time. The trace channel is only registered while it has subscribers;
//! the owning loop toggles the native registration on the first-subscriber
//! and last-unsubscriber transitions.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use libc::{c_char, c_int, c_void};

use crate::error::RlError;
use crate::ffi::RawHandle;
use crate::status::ApiStatus;
use crate::util::decode_borrowed_str;

/// Severity of a native trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl TraceLevel {
    pub(crate) fn from_raw(level: c_int) -> Self {
        match level {
            c_int::MIN..=0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            _ => Self::Error,
        }
    }

    pub(crate) fn raw(self) -> c_int {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
        }
    }
}

/// Handler for asynchronous failures raised on the loop's background
/// threads.
pub type BackgroundErrorHandler = dyn Fn(&RlError) + Send + Sync;

/// Handler for native trace messages.
pub type TraceHandler = dyn Fn(TraceLevel, &str) + Send + Sync;

/// Receipt for a subscription; pass it back to the matching unsubscribe
/// method to stop deliveries.
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

pub(crate) struct CallbackBridge {
    errors: Mutex<Vec<(u64, Arc<BackgroundErrorHandler>)>>,
    traces: Mutex<Vec<(u64, Arc<TraceHandler>)>>,
    next_token: AtomicU64,
}

impl CallbackBridge {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            errors: Mutex::new(Vec::new()),
            traces: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        })
    }

    fn fresh_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn subscribe_error(&self, handler: Arc<BackgroundErrorHandler>) -> SubscriptionToken {
        let token = self.fresh_token();
        self.errors.lock().unwrap().push((token, handler));
        SubscriptionToken(token)
    }

    pub(crate) fn unsubscribe_error(&self, token: SubscriptionToken) {
        self.errors.lock().unwrap().retain(|(id, _)| *id != token.0);
    }

    /// Adds a trace subscriber. `on_first` runs under the subscriber-list
    /// lock when this was the first subscriber, so the native registration
    /// cannot race a concurrent last-unsubscribe.
    pub(crate) fn subscribe_trace(
        &self,
        handler: Arc<TraceHandler>,
        on_first: impl FnOnce(),
    ) -> SubscriptionToken {
        let token = self.fresh_token();
        let mut traces = self.traces.lock().unwrap();
        if traces.is_empty() {
            on_first();
        }
        traces.push((token, handler));
        SubscriptionToken(token)
    }

    /// Removes a trace subscriber. `on_empty` runs under the
    /// subscriber-list lock when no subscribers remain.
    pub(crate) fn unsubscribe_trace(&self, token: SubscriptionToken, on_empty: impl FnOnce()) {
        let mut traces = self.traces.lock().unwrap();
        traces.retain(|(id, _)| *id != token.0);
        if traces.is_empty() {
            on_empty();
        }
    }

    /// Fans one background error out to every subscriber. With no
    /// subscribers the error must not vanish silently: it is escalated as
    /// a panic on a dedicated thread.
    pub(crate) fn dispatch_error(&self, error: &RlError) {
        let handlers: Vec<_> = self
            .errors
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        if handlers.is_empty() {
            escalate_unobserved(error.clone());
            return;
        }
        for handler in handlers {
            handler(error);
        }
    }

    pub(crate) fn dispatch_trace(&self, level: TraceLevel, message: &str) {
        let handlers: Vec<_> = self
            .traces
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(level, message);
        }
    }
}

fn escalate_unobserved(error: RlError) {
    let spawned = std::thread::Builder::new()
        .name("rlclient-background-error".into())
        .spawn(move || {
            panic!(
                "unobserved background error (code {}): {}",
                error.code(),
                error.message()
            );
        });
    // Nothing to do if the thread cannot be spawned; the process is in a
    // worse state than an unobserved error can express.
    drop(spawned);
}

/// Native error-channel trampoline. `ctx` is the bridge anchor produced by
/// `Arc::into_raw`; the status handle is owned by the native caller.
pub(crate) unsafe extern "C" fn error_trampoline(ctx: *mut c_void, status: RawHandle) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let bridge = unsafe { &*(ctx as *const CallbackBridge) };
        let status = unsafe { ApiStatus::borrowed(status) };
        bridge.dispatch_error(&RlError::from_status(&status));
    }));
}

/// Native trace-channel trampoline; the message is borrowed for the
/// duration of the call.
pub(crate) unsafe extern "C" fn trace_trampoline(ctx: *mut c_void, level: c_int, msg: *const c_char) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let bridge = unsafe { &*(ctx as *const CallbackBridge) };
        let message = unsafe { decode_borrowed_str(msg) };
        bridge.dispatch_trace(TraceLevel::from_raw(level), &message);
    }));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn error_fanout_reaches_every_subscriber() {
        let bridge = CallbackBridge::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = {
            let first = first.clone();
            bridge.subscribe_error(Arc::new(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let _b = {
            let second = second.clone();
            bridge.subscribe_error(Arc::new(move |_| {
                second.fetch_add(1, Ordering::SeqCst);
            }))
        };

        bridge.dispatch_error(&RlError::new(3, "background failure"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        bridge.unsubscribe_error(a);
        bridge.dispatch_error(&RlError::new(3, "background failure"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn trace_toggles_fire_only_on_edge_transitions() {
        let registered = AtomicUsize::new(0);
        let cleared = AtomicUsize::new(0);

        let bridge = CallbackBridge::new();
        let a = bridge.subscribe_trace(Arc::new(|_, _| {}), || {
            registered.fetch_add(1, Ordering::SeqCst);
        });
        let b = bridge.subscribe_trace(Arc::new(|_, _| {}), || {
            registered.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registered.load(Ordering::SeqCst), 1);

        bridge.unsubscribe_trace(a, || {
            cleared.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cleared.load(Ordering::SeqCst), 0);
        bridge.unsubscribe_trace(b, || {
            cleared.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trace_levels_round_trip_and_clamp() {
        for level in [TraceLevel::Debug, TraceLevel::Info, TraceLevel::Warn, TraceLevel::Error] {
            assert_eq!(TraceLevel::from_raw(level.raw()), level);
        }
        assert_eq!(TraceLevel::from_raw(-5), TraceLevel::Debug);
        assert_eq!(TraceLevel::from_raw(99), TraceLevel::Error);
    }
}
