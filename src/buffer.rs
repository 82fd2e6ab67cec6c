//! Reference-counted byte buffers shared with the native library.

use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;

/// A read-only view over a native reference-counted byte buffer.
///
/// Cloning a `SharedBuffer` bumps the native reference count; dropping the
/// last clone releases the underlying storage.
pub struct SharedBuffer {
    handle: NativeHandle,
}

impl SharedBuffer {
    /// Adopts a native buffer handle, taking one reference.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid buffer handle whose reference the caller is
    /// transferring to the wrapper.
    pub(crate) unsafe fn from_raw(raw: RawHandle) -> Self {
        Self {
            handle: NativeHandle::adopted(raw, ffi::api().release_buffer),
        }
    }

    /// The buffer contents. Empty when the native side handed out a
    /// zero-length buffer.
    pub fn as_bytes(&self) -> &[u8] {
        let _live = self.handle.live_guard("SharedBuffer");
        let api = ffi::api();
        let len = unsafe { (api.buffer_len)(self.handle.raw()) };
        if len == 0 {
            return &[];
        }
        let data = unsafe { (api.buffer_data)(self.handle.raw()) };
        if data.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(data, len) }
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl Clone for SharedBuffer {
    fn clone(&self) -> Self {
        let _live = self.handle.live_guard("SharedBuffer");
        let raw = unsafe { (ffi::api().clone_buffer)(self.handle.raw()) };
        unsafe { Self::from_raw(raw) }
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .finish()
    }
}
