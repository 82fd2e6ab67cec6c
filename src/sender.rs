//! Pluggable event senders.
//!
//! A [`Sender`] receives the batched event payloads a loop produces. The
//! adapter in this module packages a boxed `Sender` behind the C-compatible
//! [`SenderVTable`](crate::ffi::SenderVTable) dispatch table, converting
//! panics inside user code into opaque binding-layer status failures so an
//! unwind never crosses the native boundary.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;

use libc::{c_int, c_void};

use crate::buffer::SharedBuffer;
use crate::error::{Result, RlError, panic_message};
use crate::ffi::{self, ErrorCallbackFn, RawHandle, SenderVTable};
use crate::status::{ApiStatus, ApiStatusBuilder, BINDING_ERROR_CODE, SUCCESS_CODE};

/// Destination for batched event payloads.
///
/// Implementations may be called from the loop's background threads;
/// `send` must be safe to call concurrently with itself.
pub trait Sender: Send + Sync {
    /// Called once before the first payload is delivered.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Delivers one payload.
    fn send(&self, buffer: SharedBuffer) -> Result<()>;
}

/// Funnel for failures a sender detects after `send` has returned,
/// e.g. on its own delivery thread. Reports flow into the owning loop's
/// background-error channel.
#[derive(Clone)]
pub struct ErrorCallback {
    callback: Option<ErrorCallbackFn>,
    // Owned by the native side for the lifetime of the sender.
    ctx: *mut c_void,
}

unsafe impl Send for ErrorCallback {}
unsafe impl Sync for ErrorCallback {}

impl ErrorCallback {
    pub(crate) fn new(callback: Option<ErrorCallbackFn>, ctx: *mut c_void) -> Self {
        Self { callback, ctx }
    }

    /// Reports an asynchronous failure. A funnel without a registered
    /// native callback drops the report.
    pub fn report(&self, error: &RlError) {
        let Some(callback) = self.callback else {
            return;
        };
        let mut status = ApiStatus::new();
        status.update(error.code(), error.message());
        unsafe { callback(self.ctx, status.raw()) };
    }
}

/// Factory invoked when a loop configured with the binding sender
/// implementation needs a sender for one of its event channels.
///
/// Receives the loop configuration and the error funnel the produced
/// sender should use for asynchronous failures.
pub trait SenderFactory: Send + Sync {
    fn create(&self, config: &crate::Configuration, error: ErrorCallback) -> Result<Box<dyn Sender>>;
}

impl<F> SenderFactory for F
where
    F: Fn(&crate::Configuration, ErrorCallback) -> Result<Box<dyn Sender>> + Send + Sync,
{
    fn create(&self, config: &crate::Configuration, error: ErrorCallback) -> Result<Box<dyn Sender>> {
        self(config, error)
    }
}

/// Heap cell handed to the native side as the opaque sender pointer.
pub(crate) struct SenderAdapter {
    sender: Box<dyn Sender>,
}

impl SenderAdapter {
    pub(crate) fn into_raw(sender: Box<dyn Sender>) -> *mut c_void {
        Box::into_raw(Box::new(SenderAdapter { sender })) as *mut c_void
    }
}

/// Runs `f`, mapping an `Err` or a panic into `status` and a non-zero
/// code. The unwind never reaches the native caller.
unsafe fn guard_call(status: RawHandle, f: impl FnOnce() -> Result<()>) -> c_int {
    let err = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return SUCCESS_CODE,
        Ok(Err(err)) => err,
        Err(payload) => ApiStatusBuilder::new(BINDING_ERROR_CODE)
            .append(&panic_message(payload))
            .into_error(),
    };
    if !status.is_null() {
        let mut status = unsafe { ApiStatus::borrowed(status) };
        err.update_status(&mut status);
    }
    err.code()
}

unsafe extern "C" fn adapter_init(sender: *mut c_void, status: RawHandle) -> c_int {
    let adapter = unsafe { &*(sender as *const SenderAdapter) };
    unsafe { guard_call(status, || adapter.sender.init()) }
}

unsafe extern "C" fn adapter_send(sender: *mut c_void, buffer: RawHandle, status: RawHandle) -> c_int {
    let adapter = unsafe { &*(sender as *const SenderAdapter) };
    unsafe {
        guard_call(status, || {
            // Take our own reference; the caller's reference is released
            // when this entry point returns.
            let cloned = (ffi::api().clone_buffer)(buffer);
            adapter.sender.send(SharedBuffer::from_raw(cloned))
        })
    }
}

unsafe extern "C" fn adapter_release(sender: *mut c_void) {
    drop(unsafe { Box::from_raw(sender as *mut SenderAdapter) });
}

pub(crate) const SENDER_VTABLE: SenderVTable = SenderVTable {
    init: adapter_init,
    send: adapter_send,
    release: adapter_release,
};

enum Delivery {
    Payload(SharedBuffer),
    Shutdown,
}

/// Decorator that moves delivery onto a dedicated worker thread.
///
/// `send` enqueues and returns immediately; delivery failures are reported
/// through the error funnel. The worker drains the queue and joins when
/// the `AsyncSender` is dropped.
pub struct AsyncSender {
    queue: crossbeam_channel::Sender<Delivery>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncSender {
    pub fn new(inner: Box<dyn Sender>, error: ErrorCallback) -> Self {
        let (queue, incoming) = crossbeam_channel::unbounded::<Delivery>();
        let inner = Arc::new(inner);
        let worker = std::thread::Builder::new()
            .name("rlclient-async-sender".into())
            .spawn(move || {
                while let Ok(Delivery::Payload(buffer)) = incoming.recv() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| inner.send(buffer)));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => error.report(&err),
                        Err(payload) => error.report(
                            &ApiStatusBuilder::new(BINDING_ERROR_CODE)
                                .append(&panic_message(payload))
                                .into_error(),
                        ),
                    }
                }
            });
        match worker {
            Ok(worker) => Self {
                queue,
                worker: Some(worker),
            },
            Err(err) => panic!("failed to spawn async sender worker: {err}"),
        }
    }
}

impl Sender for AsyncSender {
    fn send(&self, buffer: SharedBuffer) -> Result<()> {
        self.queue
            .send(Delivery::Payload(buffer))
            .map_err(|_| RlError::binding("async sender worker has shut down"))
    }
}

impl Drop for AsyncSender {
    fn drop(&mut self) {
        let _ = self.queue.send(Delivery::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Recording {
        payloads: Mutex<Vec<Vec<u8>>>,
    }

    impl Sender for Recording {
        fn send(&self, buffer: SharedBuffer) -> Result<()> {
            self.payloads.lock().unwrap().push(buffer.as_bytes().to_vec());
            Ok(())
        }
    }

    struct Failing;

    impl Sender for Failing {
        fn send(&self, _buffer: SharedBuffer) -> Result<()> {
            Err(RlError::new(7, "delivery refused"))
        }
    }

    #[test]
    fn async_sender_delivers_in_order_and_drains_on_drop() {
        let recording = Arc::new(Recording {
            payloads: Mutex::new(Vec::new()),
        });

        struct Forward(Arc<Recording>);
        impl Sender for Forward {
            fn send(&self, buffer: SharedBuffer) -> Result<()> {
                self.0.send(buffer)
            }
        }

        let error = ErrorCallback::new(None, std::ptr::null_mut());
        let sender = AsyncSender::new(Box::new(Forward(recording.clone())), error);
        for i in 0..3u8 {
            sender.send(crate::shim::test_buffer(&[i, i, i])).unwrap();
        }
        drop(sender);

        let payloads = recording.payloads.lock().unwrap();
        assert_eq!(payloads.as_slice(), &[vec![0, 0, 0], vec![1, 1, 1], vec![2, 2, 2]]);
    }

    #[test]
    fn async_sender_reports_failures_through_funnel() {
        static REPORTS: AtomicUsize = AtomicUsize::new(0);

        unsafe extern "C" fn count_report(_ctx: *mut c_void, status: RawHandle) {
            let status = unsafe { ApiStatus::borrowed(status) };
            assert_eq!(status.error_code(), 7);
            assert_eq!(status.error_message(), "delivery refused");
            REPORTS.fetch_add(1, Ordering::SeqCst);
        }

        let error = ErrorCallback::new(Some(count_report), std::ptr::null_mut());
        let sender = AsyncSender::new(Box::new(Failing), error);
        sender.send(crate::shim::test_buffer(b"payload")).unwrap();
        drop(sender);

        assert_eq!(REPORTS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn vtable_send_converts_panics_into_binding_status() {
        struct Panicking;
        impl Sender for Panicking {
            fn send(&self, _buffer: SharedBuffer) -> Result<()> {
                panic!("boom");
            }
        }

        let adapter = SenderAdapter::into_raw(Box::new(Panicking));
        let status = ApiStatus::new();
        let buffer = crate::shim::test_buffer(b"x");
        let code = unsafe { (SENDER_VTABLE.send)(adapter, buffer_raw(&buffer), status.raw()) };
        assert_eq!(code, BINDING_ERROR_CODE);
        assert_eq!(status.error_code(), BINDING_ERROR_CODE);
        assert_eq!(
            status.error_message(),
            format!("{}boom", crate::status::BINDING_ERROR_PREFIX)
        );
        unsafe { (SENDER_VTABLE.release)(adapter) };
    }

    fn buffer_raw(buffer: &SharedBuffer) -> RawHandle {
        // Tests hand the adapter a borrowed reference, mirroring the
        // native caller.
        buffer.raw()
    }
}
