//! Registration context for pluggable components.
//!
//! A [`FactoryContext`] is passed to loop construction and carries the
//! sender factory consulted when a configuration selects the binding
//! sender implementation. The factory itself is Rust code; this module
//! anchors it behind a stable heap pointer and a C trampoline so the
//! native side can invoke it on its own threads.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use libc::c_void;

use crate::config::Configuration;
use crate::error::panic_message;
use crate::ffi::{self, ErrorCallbackFn, RawHandle};
use crate::handle::NativeHandle;
use crate::sender::{ErrorCallback, SENDER_VTABLE, SenderFactory};
use crate::status::{ApiStatus, ApiStatusBuilder, BINDING_ERROR_CODE};

struct FactoryHolder {
    factory: Arc<dyn SenderFactory>,
}

/// Pluggable-component registrations for one loop.
pub struct FactoryContext {
    handle: NativeHandle,
    // Anchors the registered factory for as long as the native side may
    // call back into it. Replaced registrations are kept until the context
    // itself is dropped; a create call racing a re-registration may still
    // hold the old pointer.
    anchors: Vec<Box<FactoryHolder>>,
}

impl FactoryContext {
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(
            || unsafe { (api.create_factory_context)() },
            api.delete_factory_context,
        ) {
            Ok(handle) => Self {
                handle,
                anchors: Vec::new(),
            },
            Err(err) => panic!("failed to allocate native factory context: {err}"),
        }
    }

    /// Registers the factory consulted for binding-sender channels. A
    /// later registration supersedes an earlier one.
    pub fn set_sender_factory(&mut self, factory: Arc<dyn SenderFactory>) {
        let _live = self.handle.live_guard("FactoryContext");
        let holder = Box::new(FactoryHolder { factory });
        let ctx = &*holder as *const FactoryHolder as *mut c_void;
        unsafe {
            (ffi::api().set_factory_context_sender_factory)(
                self.handle.raw(),
                sender_create_trampoline,
                ctx,
                SENDER_VTABLE,
            );
        }
        self.anchors.push(holder);
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for FactoryContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Invoked by the native side when a configured channel needs a binding
/// sender. Returns an adapter handle or null with `status` populated; a
/// panic in the factory becomes an opaque binding-error status.
unsafe extern "C" fn sender_create_trampoline(
    factory_ctx: *mut c_void,
    config: RawHandle,
    error_cb: Option<ErrorCallbackFn>,
    error_ctx: *mut c_void,
    status: RawHandle,
) -> *mut c_void {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let holder = unsafe { &*(factory_ctx as *const FactoryHolder) };
        let config = unsafe { Configuration::borrowed(config) };
        let error = ErrorCallback::new(error_cb, error_ctx);
        holder.factory.create(&config, error)
    }));
    let failure = match outcome {
        Ok(Ok(sender)) => return crate::sender::SenderAdapter::into_raw(sender),
        Ok(Err(err)) => err,
        Err(payload) => ApiStatusBuilder::new(BINDING_ERROR_CODE)
            .append(&panic_message(payload))
            .into_error(),
    };
    if !status.is_null() {
        let mut status = unsafe { ApiStatus::borrowed(status) };
        failure.update_status(&mut status);
    }
    std::ptr::null_mut()
}
