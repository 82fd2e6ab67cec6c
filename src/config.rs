//! Loop configuration: a native-owned string-to-string map.

use crate::error::{Result, RlError};
use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::status::{self, ApiStatus, SUCCESS_CODE};
use crate::util::{check_json_payload, decode_borrowed_str, to_cstring};

/// Well-known configuration keys and values understood by the native
/// client library.
pub mod keys {
    pub const APPLICATION_ID: &str = "ApplicationID";
    pub const MODEL_SOURCE: &str = "model.source";
    pub const MODEL_IMPLEMENTATION: &str = "model.implementation";
    pub const MODEL_BACKGROUND_REFRESH: &str = "model.backgroundrefresh";
    pub const INITIAL_EXPLORATION_EPSILON: &str = "InitialExplorationEpsilon";
    pub const INTERACTION_SENDER_IMPLEMENTATION: &str = "interaction.sender.implementation";
    pub const OBSERVATION_SENDER_IMPLEMENTATION: &str = "observation.sender.implementation";

    /// Sender implementation value routing events through a factory
    /// registered on a [`FactoryContext`](crate::FactoryContext).
    pub const BINDING_SENDER: &str = "BINDING_SENDER";
    pub const NO_MODEL_DATA: &str = "NO_MODEL_DATA";
    pub const PASSTHROUGH_PDF: &str = "PASSTHROUGH_PDF";
}

/// String-to-string configuration map backing loop construction.
pub struct Configuration {
    handle: NativeHandle,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(|| unsafe { (api.create_config)() }, api.delete_config) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native configuration: {err}"),
        }
    }

    /// Wraps a configuration handle owned by the native caller (used for
    /// the read-only view handed to sender factories).
    ///
    /// # Safety
    ///
    /// `raw` must be a valid native configuration handle that outlives the
    /// wrapper.
    pub(crate) unsafe fn borrowed(raw: RawHandle) -> Self {
        Self {
            handle: NativeHandle::borrowed(raw),
        }
    }

    /// Populates a fresh configuration from a JSON object; `false` leaves
    /// the failure in `status`.
    ///
    /// # Panics
    ///
    /// Panics when `json` is empty or whitespace-only.
    pub fn try_load_from_json(json: &str, status: Option<&mut ApiStatus>) -> Option<Self> {
        check_json_payload(json, "configuration json");
        let config = Self::new();
        let encoded = to_cstring(json, "configuration json");
        let result = unsafe {
            (ffi::api().load_configuration_from_json)(
                encoded.as_ptr(),
                config.handle.raw(),
                status::raw_or_null(status),
            )
        };
        (result == SUCCESS_CODE).then_some(config)
    }

    /// Throwing form of [`try_load_from_json`](Self::try_load_from_json).
    pub fn from_json(json: &str) -> Result<Self> {
        let mut status = ApiStatus::new();
        match Self::try_load_from_json(json, Some(&mut status)) {
            Some(config) => Ok(config),
            None => Err(RlError::from_status(&status)),
        }
    }

    /// The value for `key`, or the empty string when unset.
    pub fn get(&self, key: &str) -> String {
        self.get_or(key, "")
    }

    pub fn get_or(&self, key: &str, default_value: &str) -> String {
        let _live = self.handle.live_guard("Configuration");
        let key = to_cstring(key, "key");
        let default_value = to_cstring(default_value, "default_value");
        unsafe {
            decode_borrowed_str((ffi::api().config_get)(
                self.handle.raw(),
                key.as_ptr(),
                default_value.as_ptr(),
            ))
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let _live = self.handle.live_guard("Configuration");
        let key = to_cstring(key, "key");
        let value = to_cstring(value, "value");
        unsafe { (ffi::api().config_set)(self.handle.raw(), key.as_ptr(), value.as_ptr()) };
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut config = Configuration::new();
        assert_eq!(config.get("missing"), "");
        assert_eq!(config.get_or("missing", "fallback"), "fallback");
        config.set("a.key", "a value");
        assert_eq!(config.get("a.key"), "a value");
        config.set("a.key", "replaced");
        assert_eq!(config.get("a.key"), "replaced");
    }

    #[test]
    fn loads_flat_json_object() {
        let config = Configuration::from_json(
            r#"{"ApplicationID": "app-1", "model.backgroundrefresh": false, "InitialExplorationEpsilon": 1.0}"#,
        )
        .unwrap();
        assert_eq!(config.get(keys::APPLICATION_ID), "app-1");
        assert_eq!(config.get(keys::MODEL_BACKGROUND_REFRESH), "false");
        assert_eq!(config.get(keys::INITIAL_EXPLORATION_EPSILON), "1.0");
    }

    #[test]
    fn pseudolocalized_values_survive() {
        let mut config = Configuration::new();
        config.set(keys::APPLICATION_ID, "ßïϱTèƨƭÂƥƥℓïçáƭïôñNá₥è-ℓôř");
        assert_eq!(config.get(keys::APPLICATION_ID), "ßïϱTèƨƭÂƥƥℓïçáƭïôñNá₥è-ℓôř");
    }

    #[test]
    fn concurrent_reads_return_intact_values() {
        let mut config = Configuration::new();
        let first = "x".repeat(4096);
        let second = "y".repeat(4096);
        config.set("first", &first);
        config.set("second", &second);
        let config = &config;
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        assert_eq!(config.get("first"), first);
                        assert_eq!(config.get("second"), second);
                    }
                });
            }
        });
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let mut status = ApiStatus::new();
        let config = Configuration::try_load_from_json("{not json", Some(&mut status));
        assert!(config.is_none());
        assert_eq!(status.error_code(), crate::status::ERR_JSON_PARSE);
        assert!(!status.error_message().is_empty());
    }
}
