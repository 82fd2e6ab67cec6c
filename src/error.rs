//! The crate error type and the try/throw protocol glue.
//!
//! Native-reported failures travel as a code and message pair inside an
//! [`ApiStatus`](crate::status::ApiStatus); [`RlError`] is the thrown form
//! the convenience (non-`try_`) methods produce from it. Errors raised by
//! the binding layer itself carry the reserved opaque-binding-error code
//! and a fixed message prefix.

use crate::status::{ApiStatus, BINDING_ERROR_CODE, BINDING_ERROR_PREFIX};

/// Failure of a native-call-backed operation: the status code and message
/// captured at the point of failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RlError {
    code: i32,
    message: String,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RlError>;

impl RlError {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// An error originating in the binding layer rather than the native
    /// library; tagged with the reserved code and message prefix.
    pub fn binding(message: impl AsRef<str>) -> Self {
        Self {
            code: BINDING_ERROR_CODE,
            message: format!("{BINDING_ERROR_PREFIX}{}", message.as_ref()),
        }
    }

    /// Captures the current code and message of `status`.
    pub fn from_status(status: &ApiStatus) -> Self {
        Self {
            code: status.error_code(),
            message: status.error_message(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Writes this error back into `status`, returning the code; used when
    /// funneling binding failures into a native-owned status object.
    pub(crate) fn update_status(&self, status: &mut ApiStatus) -> i32 {
        status.update(self.code, &self.message);
        self.code
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_error_carries_reserved_code_and_prefix() {
        let err = RlError::binding("boom");
        assert_eq!(err.code(), BINDING_ERROR_CODE);
        assert!(err.message().starts_with(BINDING_ERROR_PREFIX));
        assert!(err.message().ends_with("boom"));
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("boom".to_string())), "boom");
        assert_eq!(panic_message(Box::new(42u32)), "unknown panic");
    }
}
