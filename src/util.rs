//! String marshalling helpers for the native boundary.
//!
//! Outbound strings are encoded to NUL-terminated UTF-8 buffers pinned for
//! the duration of a single call; inbound strings are borrowed pointers
//! owned by the native side and decoded into owned strings before the call
//! returns.

use std::ffi::{CStr, CString};
use std::ptr;

use libc::c_char;

/// Encodes `value` for a single native call.
///
/// # Panics
///
/// Panics when `value` contains an interior NUL byte — caller misuse, the
/// native calling convention cannot represent it.
pub(crate) fn to_cstring(value: &str, param: &str) -> CString {
    match CString::new(value) {
        Ok(encoded) => encoded,
        Err(_) => panic!("{param} contains an interior NUL byte"),
    }
}

/// Encodes an optional string; `None` becomes a null pointer, which several
/// entry points treat as "auto-generate" and must be passed on faithfully
/// (distinct from an empty string).
pub(crate) fn to_opt_cstring(value: Option<&str>, param: &str) -> Option<CString> {
    value.map(|value| to_cstring(value, param))
}

pub(crate) fn opt_ptr(encoded: &Option<CString>) -> *const c_char {
    match encoded {
        Some(encoded) => encoded.as_ptr(),
        None => ptr::null(),
    }
}

/// Decodes a borrowed native string; the native side keeps ownership of the
/// buffer, which must stay valid for the duration of this call only.
///
/// A null pointer decodes to the empty string; invalid UTF-8 is replaced
/// rather than rejected as native messages are advisory.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated buffer valid for the
/// duration of the call.
pub(crate) unsafe fn decode_borrowed_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Rejects empty or whitespace-only JSON payloads before any native call.
///
/// # Panics
///
/// Panics when the payload is empty or whitespace-only.
pub(crate) fn check_json_payload(json: &str, param: &str) {
    if json.trim().is_empty() {
        panic!("{param} must not be empty");
    }
}

/// Rejects empty event ids where one is required.
///
/// # Panics
///
/// Panics when `event_id` is empty.
pub(crate) fn check_event_id(event_id: &str) {
    if event_id.is_empty() {
        panic!("event_id must not be empty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_script_strings() {
        for s in [
            "",
            "plain ascii",
            "Dvořák's Íslensk þjóð",
            "日本語のテキスト 中文文本",
            "اَلْعَرَبِيَّةُ with تَشْكِيل marks",
            "£ôřè₥ ïƥƨú₥ δôℓôř ƨïƭ á₥èƭ",
        ] {
            let encoded = to_cstring(s, "value");
            let decoded = unsafe { decode_borrowed_str(encoded.as_ptr()) };
            assert_eq!(decoded, s);
        }
    }

    #[test]
    fn null_decodes_to_empty() {
        assert_eq!(unsafe { decode_borrowed_str(std::ptr::null()) }, "");
    }

    #[test]
    fn none_marshals_to_null_pointer() {
        let encoded = to_opt_cstring(None, "event_id");
        assert!(opt_ptr(&encoded).is_null());
        let encoded = to_opt_cstring(Some("evt"), "event_id");
        assert!(!opt_ptr(&encoded).is_null());
    }

    #[test]
    #[should_panic(expected = "interior NUL")]
    fn interior_nul_is_rejected() {
        to_cstring("a\0b", "value");
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn whitespace_json_is_rejected() {
        check_json_payload("   \t\n", "context_json");
    }
}
