//! Status objects: the mutable code/message pair every native call reports
//! through.
//!
//! An [`ApiStatus`] is either owned (created and destroyed by this crate)
//! or borrowed (wrapping a handle the native side owns, e.g. during a
//! background-error callback). Dropping a borrowed status never touches the
//! native resource.

use std::ptr;

use crate::error::{Result, RlError};
use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::util::{decode_borrowed_str, to_cstring};

/// Status code reported by every successful native call.
pub const SUCCESS_CODE: i32 = 0;

/// Invalid argument reported by the native layer (empty event id, context
/// without actions, and similar).
pub const ERR_INVALID_ARGUMENT: i32 = 1;

/// Operation attempted before the loop was initialized.
pub const ERR_NOT_INITIALIZED: i32 = 2;

/// Malformed JSON payload.
pub const ERR_JSON_PARSE: i32 = 3;

/// A configured pluggable component type was never registered.
pub const ERR_TYPE_NOT_REGISTERED: i32 = 10;

/// Reserved code for failures raised inside the binding layer itself
/// (panics in user-supplied senders, adapter wiring faults) rather than by
/// the native library.
pub const BINDING_ERROR_CODE: i32 = -1000;

/// Fixed marker prepended to every opaque-binding-error message.
pub const BINDING_ERROR_PREFIX: &str = "Unexpected error in the binding layer: ";

/// Mutable error-code-and-message pair updated in place by native calls.
pub struct ApiStatus {
    handle: NativeHandle,
}

impl ApiStatus {
    /// Creates an owned, empty (success) status.
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(|| unsafe { (api.create_status)() }, api.delete_status) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native status object: {err}"),
        }
    }

    /// Wraps a status handle owned by the native caller.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid native status handle that outlives the
    /// wrapper; the wrapper never frees it.
    pub(crate) unsafe fn borrowed(raw: RawHandle) -> Self {
        Self {
            handle: NativeHandle::borrowed(raw),
        }
    }

    pub fn error_code(&self) -> i32 {
        let _live = self.handle.live_guard("ApiStatus");
        unsafe { (ffi::api().status_error_code)(self.handle.raw()) }
    }

    /// The current message; empty for a success status.
    ///
    /// The native buffer stays owned by the native side; it is decoded into
    /// an owned string before the call returns.
    pub fn error_message(&self) -> String {
        let _live = self.handle.live_guard("ApiStatus");
        unsafe { decode_borrowed_str((ffi::api().status_error_message)(self.handle.raw())) }
    }

    /// Overwrites the code and message in place. Exclusive access keeps
    /// the replacement from racing a concurrent `error_message` decode.
    pub(crate) fn update(&mut self, code: i32, message: &str) {
        let _live = self.handle.live_guard("ApiStatus");
        let message = to_cstring(message, "message");
        unsafe { (ffi::api().update_status)(self.handle.raw(), code, message.as_ptr()) };
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for ApiStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps an optional out-status argument to the handle the native call
/// expects; absent means a null status pointer, which every entry point
/// tolerates.
pub(crate) fn raw_or_null(status: Option<&mut ApiStatus>) -> RawHandle {
    match status {
        Some(status) => status.raw(),
        None => ptr::null_mut(),
    }
}

/// Accumulator for composing an opaque-binding-error status from several
/// message fragments.
pub struct ApiStatusBuilder {
    code: i32,
    message: String,
}

impl ApiStatusBuilder {
    /// Starts a builder for `code`; the binding-error code seeds the fixed
    /// message prefix.
    pub fn new(code: i32) -> Self {
        let message = if code == BINDING_ERROR_CODE {
            BINDING_ERROR_PREFIX.to_string()
        } else {
            String::new()
        };
        Self { code, message }
    }

    pub fn append(mut self, fragment: &str) -> Self {
        self.message.push_str(fragment);
        self
    }

    pub fn append_line(mut self, fragment: &str) -> Self {
        self.message.push_str(fragment);
        self.message.push('\n');
        self
    }

    /// Finalizes by mutating an existing status; returns the code.
    pub fn update_status(self, target: &mut ApiStatus) -> i32 {
        target.update(self.code, &self.message);
        self.code
    }

    /// Finalizes into a brand-new owned status.
    pub fn build(self) -> ApiStatus {
        let mut status = ApiStatus::new();
        status.update(self.code, &self.message);
        status
    }

    /// Finalizes into the thrown form.
    pub fn into_error(self) -> RlError {
        RlError::new(self.code, self.message)
    }
}

/// Runs the try-form with a fresh status and converts failure into
/// [`RlError`] carrying the same code and message.
pub(crate) fn try_or_error(f: impl FnOnce(Option<&mut ApiStatus>) -> bool) -> Result<()> {
    let mut status = ApiStatus::new();
    if f(Some(&mut status)) {
        Ok(())
    } else {
        Err(RlError::from_status(&status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_reports_success() {
        let status = ApiStatus::new();
        assert_eq!(status.error_code(), SUCCESS_CODE);
        assert_eq!(status.error_message(), "");
    }

    #[test]
    fn update_overwrites_code_and_message() {
        let mut status = ApiStatus::new();
        status.update(7, "first");
        status.update(8, "second");
        assert_eq!(status.error_code(), 8);
        assert_eq!(status.error_message(), "second");
    }

    #[test]
    fn builder_prefixes_binding_errors() {
        let status = ApiStatusBuilder::new(BINDING_ERROR_CODE)
            .append("boom")
            .build();
        assert_eq!(status.error_code(), BINDING_ERROR_CODE);
        assert_eq!(
            status.error_message(),
            format!("{BINDING_ERROR_PREFIX}boom")
        );
    }

    #[test]
    fn builder_updates_existing_status() {
        let mut status = ApiStatus::new();
        let code = ApiStatusBuilder::new(5)
            .append_line("line one")
            .append("line two")
            .update_status(&mut status);
        assert_eq!(code, 5);
        assert_eq!(status.error_code(), 5);
        assert_eq!(status.error_message(), "line one\nline two");
    }

    #[test]
    fn unicode_message_round_trips() {
        let mut status = ApiStatus::new();
        let message = "£ôřè₥ ïƥƨú₥ 冗長 اختبار — mixed script";
        status.update(1, message);
        assert_eq!(status.error_message(), message);
    }
}
