//! Safe wrapper around an opaque native handle.
//!
//! [`NativeHandle`] guarantees at-most-once release of the native resource,
//! tolerates disposal from any thread, and defers destruction while
//! in-flight native calls hold a liveness guard. Every typed object in this
//! crate owns exactly one `NativeHandle`.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::RlError;
use crate::ffi::RawHandle;

/// Destructor invoked exactly once when an owned handle is released.
pub(crate) type Destructor = unsafe extern "C" fn(RawHandle);

const DISPOSED: usize = 0b01;
const DESTROYED: usize = 0b10;
const REF_UNIT: usize = 0b100;

/// An opaque native handle plus its lifecycle state.
///
/// The state word packs a disposed bit (set exactly once, by the first call
/// to [`dispose`](Self::dispose) or by `Drop`), a destroyed bit (claimed by
/// whichever thread actually runs the destructor), and an in-flight-use
/// counter. Destruction happens when the handle is disposed *and* the
/// counter is zero, whichever of the two conditions becomes true last.
///
/// # Thread safety
///
/// The native side is assumed to accept concurrent calls against one live
/// handle; this wrapper only guarantees that the destructor never runs
/// while a [`HandleGuard`] is outstanding.
#[derive(Debug)]
pub(crate) struct NativeHandle {
    raw: RawHandle,
    destructor: Option<Destructor>,
    state: AtomicUsize,
}

// Handles are tokens into a reentrant native layer; the raw pointer is
// never dereferenced on the Rust side.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    /// Runs `factory` and binds the produced handle.
    ///
    /// Fails fast if the factory returns null: an invalid handle is never
    /// wrapped silently.
    pub(crate) fn create(
        factory: impl FnOnce() -> RawHandle,
        destructor: Destructor,
    ) -> Result<Self, RlError> {
        let raw = factory();
        if raw.is_null() {
            return Err(RlError::binding("native constructor returned a null handle"));
        }
        Ok(Self {
            raw,
            destructor: Some(destructor),
            state: AtomicUsize::new(0),
        })
    }

    /// Wraps a handle whose ownership the native side has transferred to
    /// the wrapper, without a null check. Used for reference-counted
    /// resources where the "constructor" is an add-ref.
    pub(crate) fn adopted(raw: RawHandle, destructor: Destructor) -> Self {
        Self {
            raw,
            destructor: Some(destructor),
            state: AtomicUsize::new(0),
        }
    }

    /// Wraps a handle owned by someone else; no destructor will ever run.
    ///
    /// The caller is responsible for not using the wrapper past the owner's
    /// lifetime; this is a documented contract, not enforced here.
    pub(crate) fn borrowed(raw: RawHandle) -> Self {
        Self {
            raw,
            destructor: None,
            state: AtomicUsize::new(0),
        }
    }

    /// The raw handle for a single, delimited native call.
    ///
    /// The `&self` borrow keeps the wrapper from being dropped mid-call;
    /// callers racing an explicit [`dispose`](Self::dispose) from another
    /// thread must hold a [`HandleGuard`] instead.
    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Increments the in-flight-use counter.
    ///
    /// Returns `false` once the handle is disposed or disposing; on `true`,
    /// the caller must pair with [`release`](Self::release).
    pub(crate) fn add_ref(&self) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & DISPOSED != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                state + REF_UNIT,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Decrements the in-flight-use counter; runs the deferred destructor
    /// if this was the last use of an already-disposed handle.
    pub(crate) fn release(&self) {
        let prev = self.state.fetch_sub(REF_UNIT, Ordering::AcqRel);
        debug_assert!(prev / REF_UNIT > 0, "release without matching add_ref");
        if prev & DISPOSED != 0 && prev / REF_UNIT == 1 {
            self.destroy();
        }
    }

    /// RAII form of [`add_ref`](Self::add_ref)/[`release`](Self::release);
    /// `None` once the handle is disposed.
    pub(crate) fn guard(&self) -> Option<HandleGuard<'_>> {
        self.add_ref().then(|| HandleGuard { handle: self })
    }

    /// Like [`guard`](Self::guard), but treats use after dispose as the
    /// contract violation it is.
    ///
    /// # Panics
    ///
    /// Panics when the handle is already disposed.
    pub(crate) fn live_guard(&self, object: &str) -> HandleGuard<'_> {
        match self.guard() {
            Some(guard) => guard,
            None => panic!("{object} used after dispose"),
        }
    }

    /// Marks the handle disposed; idempotent and safe from any thread.
    ///
    /// The native destructor runs at most once, either here (no guards
    /// outstanding) or when the last outstanding guard is released.
    pub(crate) fn dispose(&self) {
        let prev = self.state.fetch_or(DISPOSED, Ordering::AcqRel);
        if prev & DISPOSED != 0 {
            return;
        }
        if prev / REF_UNIT == 0 {
            self.destroy();
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) & DISPOSED != 0
    }

    fn destroy(&self) {
        // Claim the destroyed bit so exactly one thread runs the destructor
        // even when dispose() races the draining release().
        let prev = self.state.fetch_or(DESTROYED, Ordering::AcqRel);
        if prev & DESTROYED != 0 {
            return;
        }
        if let Some(destructor) = self.destructor {
            // Safety: the handle came from the paired factory, the
            // destroyed bit guarantees this runs once, and no guard is
            // outstanding.
            unsafe { destructor(self.raw) };
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        // Last-resort path when dispose() was never called; must not panic.
        self.dispose();
    }
}

/// Liveness guard holding one in-flight-use reference.
pub(crate) struct HandleGuard<'a> {
    handle: &'a NativeHandle,
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // The "handle" points at a per-test destruction counter, so parallel
    // tests cannot interfere with each other's counts.
    unsafe extern "C" fn counting_destructor(raw: RawHandle) {
        let counter = unsafe { Box::from_raw(raw as *mut &'static AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn new_counter() -> &'static AtomicUsize {
        Box::leak(Box::new(AtomicUsize::new(0)))
    }

    fn make_handle(counter: &'static AtomicUsize) -> NativeHandle {
        NativeHandle::create(
            || Box::into_raw(Box::new(counter)) as RawHandle,
            counting_destructor,
        )
        .unwrap()
    }

    #[test]
    fn null_factory_result_fails_fast() {
        let result = NativeHandle::create(|| std::ptr::null_mut(), counting_destructor);
        assert!(result.is_err());
    }

    #[test]
    fn dispose_is_idempotent() {
        let destroyed = new_counter();
        let handle = make_handle(destroyed);
        handle.dispose();
        handle.dispose();
        handle.dispose();
        drop(handle);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_destroys_exactly_once() {
        let destroyed = new_counter();
        drop(make_handle(destroyed));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn add_ref_fails_after_dispose() {
        let handle = make_handle(new_counter());
        assert!(handle.add_ref());
        handle.release();
        handle.dispose();
        assert!(!handle.add_ref());
        assert!(handle.guard().is_none());
    }

    #[test]
    fn destruction_deferred_while_guard_outstanding() {
        let destroyed = new_counter();
        let handle = make_handle(destroyed);
        let guard = handle.guard().unwrap();
        handle.dispose();
        assert!(handle.is_disposed());
        // Guard still holds the handle alive.
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn borrowed_handle_never_destroys() {
        let mut value = 7u8;
        let handle = NativeHandle::borrowed(&mut value as *mut u8 as RawHandle);
        handle.dispose();
        drop(handle);
        assert_eq!(value, 7);
    }
}
