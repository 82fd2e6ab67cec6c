//! The native ABI surface of the reinforcement-learning client library.
//!
//! Every operation in this crate ultimately forwards to one of the entry
//! points collected in [`NativeApi`]: a table of `unsafe extern "C"`
//! function pointers mirroring the shape of the native client library's
//! C interface. Objects are opaque handles created and destroyed by paired
//! factory/destructor entry points; action entry points return an `i32`
//! status code (`0` = success) and optionally populate an out-status
//! handle; string getters return borrowed NUL-terminated UTF-8 pointers
//! owned by the native side.
//!
//! The table is process-wide. A real native library is wired in once via
//! [`install_native_api`]; when nothing is installed, the in-process engine
//! in [`crate::shim`] is used. Installation is init-once: the first call
//! wins and later calls fail.

use libc::{c_char, c_int, c_void};
use once_cell::sync::OnceCell;

use crate::ranking::ActionProbability;

/// Opaque token identifying a native-owned resource.
///
/// A handle is valid only between its create call and its delete call;
/// any use after deletion is undefined behavior on the native side.
pub type RawHandle = *mut c_void;

/// Background error callback: invoked by the native side on a thread it
/// owns, with a status handle the native side owns and frees after the
/// callback returns.
pub type BackgroundErrorFn = unsafe extern "C" fn(ctx: *mut c_void, status: RawHandle);

/// Trace callback: severity level plus a borrowed UTF-8 message valid only
/// for the duration of the call.
pub type TraceFn = unsafe extern "C" fn(ctx: *mut c_void, level: c_int, msg: *const c_char);

/// Error funnel handed to pluggable senders; reports asynchronous failures
/// back into the native background-error path.
pub type ErrorCallbackFn = unsafe extern "C" fn(error_ctx: *mut c_void, status: RawHandle);

/// Factory entry point for pluggable senders.
///
/// Receives the factory registration context, a borrowed configuration
/// handle (valid for the duration of the call), and the error funnel the
/// produced sender should report asynchronous failures through. Returns an
/// adapter handle consumed through [`SenderVTable`], or null on failure
/// (with `status` populated).
pub type SenderCreateFn = unsafe extern "C" fn(
    factory_ctx: *mut c_void,
    config: RawHandle,
    error_cb: Option<ErrorCallbackFn>,
    error_ctx: *mut c_void,
    status: RawHandle,
) -> *mut c_void;

/// Dispatch table for a pluggable sender produced by a [`SenderCreateFn`].
///
/// `init` and `send` follow the status-code protocol; `release` frees the
/// adapter handle and is called exactly once, when the owning loop is
/// destroyed.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SenderVTable {
    pub init: unsafe extern "C" fn(sender: *mut c_void, status: RawHandle) -> c_int,
    pub send: unsafe extern "C" fn(sender: *mut c_void, buffer: RawHandle, status: RawHandle) -> c_int,
    pub release: unsafe extern "C" fn(sender: *mut c_void),
}

/// The native entry-point table.
///
/// # Safety
///
/// Implementations must uphold the contract described on each field group:
/// create/delete pairs manage ownership, and every entry point taking a
/// handle is reentrant (safe to call from multiple threads against the
/// same live handle). String getters return borrowed pointers backed by
/// the handle's stored value: the pointer stays valid until that value is
/// next replaced on the handle or the handle is deleted, and concurrent
/// reads never invalidate each other. `config_get` returns the caller's
/// own `default_value` pointer when the key is unset.
pub struct NativeApi {
    // Status objects: mutable code + message pairs.
    pub create_status: unsafe extern "C" fn() -> RawHandle,
    pub delete_status: unsafe extern "C" fn(status: RawHandle),
    pub status_error_code: unsafe extern "C" fn(status: RawHandle) -> c_int,
    pub status_error_message: unsafe extern "C" fn(status: RawHandle) -> *const c_char,
    /// Takes a copy of `message`; the buffer only needs to live until the
    /// call returns. A null `status` is a no-op.
    pub update_status: unsafe extern "C" fn(status: RawHandle, code: c_int, message: *const c_char),

    // Configuration: string-to-string map.
    pub create_config: unsafe extern "C" fn() -> RawHandle,
    pub delete_config: unsafe extern "C" fn(config: RawHandle),
    pub config_set: unsafe extern "C" fn(config: RawHandle, name: *const c_char, value: *const c_char),
    pub config_get: unsafe extern "C" fn(config: RawHandle, name: *const c_char, default_value: *const c_char) -> *const c_char,
    pub load_configuration_from_json:
        unsafe extern "C" fn(json: *const c_char, config: RawHandle, status: RawHandle) -> c_int,

    // Factory context: pluggable sender wiring.
    pub create_factory_context: unsafe extern "C" fn() -> RawHandle,
    pub delete_factory_context: unsafe extern "C" fn(ctx: RawHandle),
    pub set_factory_context_sender_factory: unsafe extern "C" fn(
        ctx: RawHandle,
        create_fn: SenderCreateFn,
        factory_ctx: *mut c_void,
        vtable: SenderVTable,
    ),

    // Loop lifecycle and callbacks. `factory_ctx` may be null for default
    // sender wiring.
    pub create_loop: unsafe extern "C" fn(config: RawHandle, factory_ctx: RawHandle) -> RawHandle,
    pub delete_loop: unsafe extern "C" fn(rl_loop: RawHandle),
    pub loop_init: unsafe extern "C" fn(rl_loop: RawHandle, status: RawHandle) -> c_int,
    /// A null callback clears the registration. The `ctx` pointer must stay
    /// valid from registration until cleared or until the loop is deleted.
    pub loop_set_error_callback:
        unsafe extern "C" fn(rl_loop: RawHandle, callback: Option<BackgroundErrorFn>, ctx: *mut c_void),
    pub loop_set_trace_callback:
        unsafe extern "C" fn(rl_loop: RawHandle, callback: Option<TraceFn>, ctx: *mut c_void),

    // Decision requests. A null `event_id` asks the native side to generate
    // one; an empty string is rejected.
    pub loop_choose_rank: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        context_json: *const c_char,
        flags: u32,
        response: RawHandle,
        status: RawHandle,
    ) -> c_int,
    pub loop_request_decision: unsafe extern "C" fn(
        rl_loop: RawHandle,
        context_json: *const c_char,
        flags: u32,
        response: RawHandle,
        status: RawHandle,
    ) -> c_int,
    pub loop_request_multi_slot_decision: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        context_json: *const c_char,
        flags: u32,
        response: RawHandle,
        status: RawHandle,
    ) -> c_int,
    pub loop_request_continuous_action: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        context_json: *const c_char,
        flags: u32,
        response: RawHandle,
        status: RawHandle,
    ) -> c_int,

    // Event reporting.
    pub loop_report_action_taken:
        unsafe extern "C" fn(rl_loop: RawHandle, event_id: *const c_char, status: RawHandle) -> c_int,
    pub loop_report_outcome_f: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        outcome: f32,
        status: RawHandle,
    ) -> c_int,
    pub loop_report_outcome_json: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        outcome_json: *const c_char,
        status: RawHandle,
    ) -> c_int,
    pub loop_report_slot_outcome_f: unsafe extern "C" fn(
        rl_loop: RawHandle,
        event_id: *const c_char,
        slot_id: *const c_char,
        outcome: f32,
        status: RawHandle,
    ) -> c_int,

    // Model lifecycle.
    pub loop_refresh_model: unsafe extern "C" fn(rl_loop: RawHandle, status: RawHandle) -> c_int,

    // Ranking response.
    pub create_ranking_response: unsafe extern "C" fn() -> RawHandle,
    pub delete_ranking_response: unsafe extern "C" fn(response: RawHandle),
    pub ranking_event_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub ranking_model_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub ranking_count: unsafe extern "C" fn(response: RawHandle) -> usize,
    pub ranking_chosen_action:
        unsafe extern "C" fn(response: RawHandle, action_index: *mut usize, status: RawHandle) -> c_int,
    pub create_ranking_enumerator: unsafe extern "C" fn(response: RawHandle) -> RawHandle,

    // Shared action-probability enumerator: backs both ranking responses
    // and slot rankings. Forward-only: `init` positions on the first item,
    // `move_next` advances; both return 1 while an item is available.
    pub delete_action_enumerator: unsafe extern "C" fn(enumerator: RawHandle),
    pub action_enumerator_init: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub action_enumerator_move_next: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub action_enumerator_current: unsafe extern "C" fn(enumerator: RawHandle) -> ActionProbability,

    // Decision (CCB) response. The enumerator's current item is a borrowed
    // slot handle owned by the response and valid for the response's
    // lifetime.
    pub create_decision_response: unsafe extern "C" fn() -> RawHandle,
    pub delete_decision_response: unsafe extern "C" fn(response: RawHandle),
    pub decision_model_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub decision_count: unsafe extern "C" fn(response: RawHandle) -> usize,
    pub create_decision_enumerator: unsafe extern "C" fn(response: RawHandle) -> RawHandle,
    pub delete_decision_enumerator: unsafe extern "C" fn(enumerator: RawHandle),
    pub decision_enumerator_init: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub decision_enumerator_move_next: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub decision_enumerator_current: unsafe extern "C" fn(enumerator: RawHandle) -> RawHandle,
    pub slot_id: unsafe extern "C" fn(slot: RawHandle) -> *const c_char,
    pub slot_action_id: unsafe extern "C" fn(slot: RawHandle) -> c_int,
    pub slot_probability: unsafe extern "C" fn(slot: RawHandle) -> f32,

    // Multi-slot response. The enumerator's current item is a borrowed
    // slot-ranking handle owned by the response and valid for the
    // response's lifetime.
    pub create_multi_slot_response: unsafe extern "C" fn() -> RawHandle,
    pub delete_multi_slot_response: unsafe extern "C" fn(response: RawHandle),
    pub multi_slot_event_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub multi_slot_model_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub multi_slot_count: unsafe extern "C" fn(response: RawHandle) -> usize,
    pub create_multi_slot_enumerator: unsafe extern "C" fn(response: RawHandle) -> RawHandle,
    pub delete_multi_slot_enumerator: unsafe extern "C" fn(enumerator: RawHandle),
    pub multi_slot_enumerator_init: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub multi_slot_enumerator_move_next: unsafe extern "C" fn(enumerator: RawHandle) -> c_int,
    pub multi_slot_enumerator_current: unsafe extern "C" fn(enumerator: RawHandle) -> RawHandle,
    pub slot_ranking_id: unsafe extern "C" fn(slot_ranking: RawHandle) -> *const c_char,
    pub slot_ranking_count: unsafe extern "C" fn(slot_ranking: RawHandle) -> usize,
    pub slot_ranking_chosen_action: unsafe extern "C" fn(
        slot_ranking: RawHandle,
        action_index: *mut usize,
        status: RawHandle,
    ) -> c_int,
    pub create_slot_ranking_enumerator: unsafe extern "C" fn(slot_ranking: RawHandle) -> RawHandle,

    // Continuous-action response.
    pub create_continuous_response: unsafe extern "C" fn() -> RawHandle,
    pub delete_continuous_response: unsafe extern "C" fn(response: RawHandle),
    pub continuous_event_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub continuous_model_id: unsafe extern "C" fn(response: RawHandle) -> *const c_char,
    pub continuous_chosen_action: unsafe extern "C" fn(response: RawHandle) -> f32,
    pub continuous_chosen_action_pdf_value: unsafe extern "C" fn(response: RawHandle) -> f32,

    // Episode state.
    pub create_episode_state: unsafe extern "C" fn(episode_id: *const c_char) -> RawHandle,
    pub delete_episode_state: unsafe extern "C" fn(episode: RawHandle),
    pub episode_id: unsafe extern "C" fn(episode: RawHandle) -> *const c_char,
    pub episode_update: unsafe extern "C" fn(
        episode: RawHandle,
        event_id: *const c_char,
        previous_event_id: *const c_char,
        context_json: *const c_char,
        ranking: RawHandle,
        status: RawHandle,
    ) -> c_int,

    // Shared buffers: ref-counted native byte buffers handed to senders.
    pub clone_buffer: unsafe extern "C" fn(buffer: RawHandle) -> RawHandle,
    pub release_buffer: unsafe extern "C" fn(buffer: RawHandle),
    pub buffer_data: unsafe extern "C" fn(buffer: RawHandle) -> *const u8,
    pub buffer_len: unsafe extern "C" fn(buffer: RawHandle) -> usize,
}

static INSTALLED: OnceCell<&'static NativeApi> = OnceCell::new();

/// Error returned when a native API table has already been installed.
#[derive(Debug, thiserror::Error)]
#[error("a native API table is already installed")]
pub struct AlreadyInstalled;

/// Installs the process-wide native entry-point table.
///
/// May be called at most once, and must happen before the first wrapper
/// object is created: entry points are resolved per call, so a handle
/// created against the in-process engine must never be mixed with a table
/// installed later. Without installation the in-process engine is used.
pub fn install_native_api(api: &'static NativeApi) -> Result<(), AlreadyInstalled> {
    INSTALLED.set(api).map_err(|_| AlreadyInstalled)
}

/// The entry-point table in effect for this process.
pub(crate) fn api() -> &'static NativeApi {
    INSTALLED.get().copied().unwrap_or(&crate::shim::SHIM_API)
}
