//! In-process implementation of the native entry-point table.
//!
//! This is the engine behind [`crate::ffi::api`] when no real native
//! library has been installed: boxed opaque structs behind `extern "C"`
//! functions, out-status parameters, the full status-code protocol. It
//! implements the binding contract deterministically and performs no
//! learning; rankings are driven entirely by the request context.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libc::{c_char, c_int, c_void};
use serde_json::Value;

use crate::config::keys;
use crate::ffi::{BackgroundErrorFn, NativeApi, RawHandle, SenderCreateFn, SenderVTable, TraceFn};
use crate::ranking::ActionProbability;
use crate::status::{
    ERR_INVALID_ARGUMENT, ERR_JSON_PARSE, ERR_NOT_INITIALIZED, ERR_TYPE_NOT_REGISTERED,
    SUCCESS_CODE,
};

const MODEL_ID: &str = "N/A";

fn to_owned_cstring(value: &str) -> CString {
    // Interior NULs cannot appear: every string entering the engine came
    // through a NUL-terminated buffer.
    CString::new(value).unwrap_or_default()
}

unsafe fn borrow_str<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

unsafe fn fail(status: RawHandle, code: c_int, message: &str) -> c_int {
    unsafe { shim_update_status(status, code, to_owned_cstring(message).as_ptr()) };
    code
}

// ---------------------------------------------------------------------------
// Status objects.

struct ShimStatus {
    code: c_int,
    // The pointer `error_message` hands out stays valid until the next
    // update on this handle; reads never invalidate each other.
    message: Mutex<CString>,
}

unsafe extern "C" fn shim_create_status() -> RawHandle {
    Box::into_raw(Box::new(ShimStatus {
        code: SUCCESS_CODE,
        message: Mutex::new(CString::default()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_status(status: RawHandle) {
    if !status.is_null() {
        drop(unsafe { Box::from_raw(status as *mut ShimStatus) });
    }
}

unsafe extern "C" fn shim_status_error_code(status: RawHandle) -> c_int {
    unsafe { &*(status as *const ShimStatus) }.code
}

unsafe extern "C" fn shim_status_error_message(status: RawHandle) -> *const c_char {
    let status = unsafe { &*(status as *const ShimStatus) };
    status.message.lock().unwrap().as_ptr()
}

unsafe extern "C" fn shim_update_status(status: RawHandle, code: c_int, message: *const c_char) {
    if status.is_null() {
        return;
    }
    let target = unsafe { &mut *(status as *mut ShimStatus) };
    target.code = code;
    *target.message.lock().unwrap() = to_owned_cstring(unsafe { borrow_str(message) });
}

// ---------------------------------------------------------------------------
// Configuration.

struct ShimConfig {
    // Values are stored NUL-terminated so `config_get` can hand out a
    // pointer into the stored value itself. The heap buffer of a CString
    // is stable across map rehashes; a pointer stays valid until the
    // entry is replaced or the map is deleted, and reads never invalidate
    // each other.
    values: Mutex<HashMap<String, CString>>,
}

unsafe extern "C" fn shim_create_config() -> RawHandle {
    Box::into_raw(Box::new(ShimConfig {
        values: Mutex::new(HashMap::new()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_config(config: RawHandle) {
    if !config.is_null() {
        drop(unsafe { Box::from_raw(config as *mut ShimConfig) });
    }
}

unsafe extern "C" fn shim_config_set(config: RawHandle, name: *const c_char, value: *const c_char) {
    let config = unsafe { &*(config as *const ShimConfig) };
    let name = unsafe { borrow_str(name) }.to_string();
    let value = to_owned_cstring(unsafe { borrow_str(value) });
    config.values.lock().unwrap().insert(name, value);
}

unsafe extern "C" fn shim_config_get(
    config: RawHandle,
    name: *const c_char,
    default_value: *const c_char,
) -> *const c_char {
    let config = unsafe { &*(config as *const ShimConfig) };
    let name = unsafe { borrow_str(name) };
    // Missing key: echo the caller's own default pointer back.
    match config.values.lock().unwrap().get(name) {
        Some(value) => value.as_ptr(),
        None => default_value,
    }
}

unsafe extern "C" fn shim_load_configuration_from_json(
    json: *const c_char,
    config: RawHandle,
    status: RawHandle,
) -> c_int {
    let parsed: Value = match serde_json::from_str(unsafe { borrow_str(json) }) {
        Ok(parsed) => parsed,
        Err(err) => {
            return unsafe {
                fail(status, ERR_JSON_PARSE, &format!("malformed configuration JSON: {err}"))
            };
        }
    };
    let Value::Object(entries) = parsed else {
        return unsafe {
            fail(status, ERR_JSON_PARSE, "configuration JSON must be an object")
        };
    };
    let target = unsafe { &*(config as *const ShimConfig) };
    let mut values = target.values.lock().unwrap();
    for (key, value) in entries {
        let rendered = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        values.insert(key, to_owned_cstring(&rendered));
    }
    SUCCESS_CODE
}

// ---------------------------------------------------------------------------
// Factory context.

#[derive(Clone, Copy)]
struct SenderRegistration {
    create: SenderCreateFn,
    ctx: *mut c_void,
    vtable: SenderVTable,
}

struct ShimFactoryContext {
    sender_factory: Mutex<Option<SenderRegistration>>,
}

unsafe extern "C" fn shim_create_factory_context() -> RawHandle {
    Box::into_raw(Box::new(ShimFactoryContext {
        sender_factory: Mutex::new(None),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_factory_context(ctx: RawHandle) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx as *mut ShimFactoryContext) });
    }
}

unsafe extern "C" fn shim_set_factory_context_sender_factory(
    ctx: RawHandle,
    create_fn: SenderCreateFn,
    factory_ctx: *mut c_void,
    vtable: SenderVTable,
) {
    let target = unsafe { &*(ctx as *const ShimFactoryContext) };
    *target.sender_factory.lock().unwrap() = Some(SenderRegistration {
        create: create_fn,
        ctx: factory_ctx,
        vtable,
    });
}

// ---------------------------------------------------------------------------
// The loop.

struct ShimSender {
    sender: *mut c_void,
    vtable: SenderVTable,
}

struct ShimLoop {
    config: HashMap<String, String>,
    factory: Option<SenderRegistration>,
    initialized: AtomicBool,
    interaction_sender: Mutex<Option<ShimSender>>,
    observation_sender: Mutex<Option<ShimSender>>,
    error_cb: Mutex<Option<(BackgroundErrorFn, *mut c_void)>>,
    trace_cb: Mutex<Option<(TraceFn, *mut c_void)>>,
    trace_registrations: AtomicUsize,
    trace_clears: AtomicUsize,
}

impl ShimLoop {
    fn config_value<'a>(&'a self, key: &str, default_value: &'a str) -> &'a str {
        self.config.get(key).map(String::as_str).unwrap_or(default_value)
    }

    fn trace(&self, level: c_int, message: &str) {
        // Copy the registration out before invoking: a handler may
        // re-enter and change the registration, which needs the lock.
        let registered = *self.trace_cb.lock().unwrap();
        if let Some((callback, ctx)) = registered {
            let message = to_owned_cstring(message);
            unsafe { callback(ctx, level, message.as_ptr()) };
        }
    }

    /// Routes an asynchronous failure into the background-error channel.
    fn background_error(&self, code: c_int, message: &str) {
        let registered = *self.error_cb.lock().unwrap();
        if let Some((callback, ctx)) = registered {
            let status = unsafe { shim_create_status() };
            unsafe {
                shim_update_status(status, code, to_owned_cstring(message).as_ptr());
                callback(ctx, status);
                shim_delete_status(status);
            }
        }
    }

    /// Builds the sender for one event channel, per the channel's
    /// configured implementation.
    unsafe fn build_sender(
        &self,
        implementation_key: &str,
        status: RawHandle,
    ) -> Result<Option<ShimSender>, c_int> {
        let implementation = self.config_value(implementation_key, "");
        if implementation != keys::BINDING_SENDER {
            // Default wiring: events are accepted and dropped.
            return Ok(None);
        }
        let Some(registration) = self.factory else {
            return Err(unsafe {
                fail(
                    status,
                    ERR_TYPE_NOT_REGISTERED,
                    &format!("Type not registered for creation: {}", keys::BINDING_SENDER),
                )
            });
        };
        let config = unsafe { shim_create_config() };
        {
            let target = unsafe { &*(config as *const ShimConfig) };
            *target.values.lock().unwrap() = self
                .config
                .iter()
                .map(|(key, value)| (key.clone(), to_owned_cstring(value)))
                .collect();
        }
        let sender = unsafe {
            (registration.create)(
                registration.ctx,
                config,
                Some(shim_error_funnel),
                self as *const ShimLoop as *mut c_void,
                status,
            )
        };
        unsafe { shim_delete_config(config) };
        if sender.is_null() {
            let code = unsafe { shim_status_error_code(status) };
            return Err(if code == SUCCESS_CODE { ERR_INVALID_ARGUMENT } else { code });
        }
        let init_result = unsafe { (registration.vtable.init)(sender, status) };
        if init_result != SUCCESS_CODE {
            unsafe { (registration.vtable.release)(sender) };
            return Err(init_result);
        }
        Ok(Some(ShimSender {
            sender,
            vtable: registration.vtable,
        }))
    }

    /// Delivers one serialized event through a channel's sender. `true`
    /// when delivery succeeded or the channel has default wiring.
    unsafe fn deliver(
        &self,
        channel: &Mutex<Option<ShimSender>>,
        payload: &[u8],
        status: RawHandle,
    ) -> c_int {
        let channel = channel.lock().unwrap();
        let Some(sender) = channel.as_ref() else {
            return SUCCESS_CODE;
        };
        let buffer = new_buffer(payload.to_vec());
        let result = unsafe { (sender.vtable.send)(sender.sender, buffer, status) };
        unsafe { shim_release_buffer(buffer) };
        result
    }

    fn require_init(&self, status: RawHandle) -> c_int {
        if self.initialized.load(Ordering::Acquire) {
            SUCCESS_CODE
        } else {
            unsafe { fail(status, ERR_NOT_INITIALIZED, "loop has not been initialized") }
        }
    }
}

/// Error funnel handed to binding senders; `error_ctx` is the owning loop.
unsafe extern "C" fn shim_error_funnel(error_ctx: *mut c_void, status: RawHandle) {
    let rl_loop = unsafe { &*(error_ctx as *const ShimLoop) };
    let code = unsafe { shim_status_error_code(status) };
    let message = unsafe { borrow_str(shim_status_error_message(status)) }.to_string();
    rl_loop.background_error(code, &message);
}

unsafe extern "C" fn shim_create_loop(config: RawHandle, factory_ctx: RawHandle) -> RawHandle {
    if config.is_null() {
        return std::ptr::null_mut();
    }
    let config = unsafe { &*(config as *const ShimConfig) }
        .values
        .lock()
        .unwrap()
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string_lossy().into_owned()))
        .collect();
    let factory = if factory_ctx.is_null() {
        None
    } else {
        *unsafe { &*(factory_ctx as *const ShimFactoryContext) }
            .sender_factory
            .lock()
            .unwrap()
    };
    Box::into_raw(Box::new(ShimLoop {
        config,
        factory,
        initialized: AtomicBool::new(false),
        interaction_sender: Mutex::new(None),
        observation_sender: Mutex::new(None),
        error_cb: Mutex::new(None),
        trace_cb: Mutex::new(None),
        trace_registrations: AtomicUsize::new(0),
        trace_clears: AtomicUsize::new(0),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_loop(rl_loop: RawHandle) {
    if rl_loop.is_null() {
        return;
    }
    let rl_loop = unsafe { Box::from_raw(rl_loop as *mut ShimLoop) };
    for channel in [&rl_loop.interaction_sender, &rl_loop.observation_sender] {
        if let Some(sender) = channel.lock().unwrap().take() {
            unsafe { (sender.vtable.release)(sender.sender) };
        }
    }
}

unsafe extern "C" fn shim_loop_init(rl_loop: RawHandle, status: RawHandle) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    if rl_loop.initialized.load(Ordering::Acquire) {
        return unsafe { fail(status, ERR_INVALID_ARGUMENT, "loop is already initialized") };
    }
    let interaction = match unsafe {
        rl_loop.build_sender(keys::INTERACTION_SENDER_IMPLEMENTATION, status)
    } {
        Ok(sender) => sender,
        Err(code) => return code,
    };
    let observation = match unsafe {
        rl_loop.build_sender(keys::OBSERVATION_SENDER_IMPLEMENTATION, status)
    } {
        Ok(sender) => sender,
        Err(code) => {
            if let Some(sender) = interaction {
                unsafe { (sender.vtable.release)(sender.sender) };
            }
            return code;
        }
    };
    *rl_loop.interaction_sender.lock().unwrap() = interaction;
    *rl_loop.observation_sender.lock().unwrap() = observation;
    rl_loop.initialized.store(true, Ordering::Release);
    rl_loop.trace(1, "loop initialized");
    SUCCESS_CODE
}

unsafe extern "C" fn shim_loop_set_error_callback(
    rl_loop: RawHandle,
    callback: Option<BackgroundErrorFn>,
    ctx: *mut c_void,
) {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    *rl_loop.error_cb.lock().unwrap() = callback.map(|callback| (callback, ctx));
}

unsafe extern "C" fn shim_loop_set_trace_callback(
    rl_loop: RawHandle,
    callback: Option<TraceFn>,
    ctx: *mut c_void,
) {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    match callback {
        Some(_) => rl_loop.trace_registrations.fetch_add(1, Ordering::SeqCst),
        None => rl_loop.trace_clears.fetch_add(1, Ordering::SeqCst),
    };
    *rl_loop.trace_cb.lock().unwrap() = callback.map(|callback| (callback, ctx));
}

/// Native set/clear counts for a loop's trace channel.
#[cfg(test)]
pub(crate) unsafe fn loop_trace_toggles(rl_loop: RawHandle) -> (usize, usize) {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    (
        rl_loop.trace_registrations.load(Ordering::SeqCst),
        rl_loop.trace_clears.load(Ordering::SeqCst),
    )
}

unsafe fn resolve_event_id_ptr(event_id: *const c_char, status: RawHandle) -> Result<String, c_int> {
    if event_id.is_null() {
        return Ok(uuid::Uuid::new_v4().to_string());
    }
    let event_id = unsafe { borrow_str(event_id) };
    if event_id.is_empty() {
        return Err(unsafe { fail(status, ERR_INVALID_ARGUMENT, "empty event id") });
    }
    Ok(event_id.to_string())
}

unsafe fn parse_context(context: *const c_char, status: RawHandle) -> Result<Value, c_int> {
    match serde_json::from_str(unsafe { borrow_str(context) }) {
        Ok(value) => Ok(value),
        Err(err) => Err(unsafe {
            fail(status, ERR_JSON_PARSE, &format!("malformed context JSON: {err}"))
        }),
    }
}

/// The `_multi` action list of a decision context; invalid-argument when
/// missing or empty.
unsafe fn context_actions(context: &Value, status: RawHandle) -> Result<usize, c_int> {
    match context.get("_multi").and_then(Value::as_array) {
        Some(actions) if !actions.is_empty() => Ok(actions.len()),
        _ => Err(unsafe {
            fail(
                status,
                ERR_INVALID_ARGUMENT,
                "context must carry a non-empty _multi action array",
            )
        }),
    }
}

/// Ranks `count` actions: explicit `"p"` pdf when present (top action
/// first), uniform with action 0 chosen otherwise.
fn rank_actions(count: usize, context: &Value) -> (Vec<ActionProbability>, usize) {
    let pdf: Option<Vec<f32>> = context.get("p").and_then(Value::as_array).map(|values| {
        values
            .iter()
            .map(|value| value.as_f64().unwrap_or(0.0) as f32)
            .collect()
    });
    match pdf {
        Some(pdf) if pdf.len() == count => {
            let mut order: Vec<usize> = (0..count).collect();
            order.sort_by(|a, b| {
                pdf[*b].partial_cmp(&pdf[*a]).unwrap_or(std::cmp::Ordering::Equal)
            });
            let chosen = order[0];
            let pairs = order
                .into_iter()
                .map(|action_id| ActionProbability {
                    action_id,
                    probability: pdf[action_id],
                })
                .collect();
            (pairs, chosen)
        }
        _ => {
            let probability = 1.0 / count as f32;
            let pairs = (0..count)
                .map(|action_id| ActionProbability {
                    action_id,
                    probability,
                })
                .collect();
            (pairs, 0)
        }
    }
}

#[derive(serde::Serialize)]
struct InteractionEvent<'a> {
    kind: &'a str,
    #[serde(rename = "eventId")]
    event_id: &'a str,
    context: &'a Value,
}

#[derive(serde::Serialize)]
struct ObservationEvent<'a> {
    #[serde(rename = "eventId")]
    event_id: &'a str,
    observation: Value,
}

fn interaction_payload(event_id: &str, context: &Value, kind: &str) -> Vec<u8> {
    serde_json::to_vec(&InteractionEvent {
        kind,
        event_id,
        context,
    })
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Ranking response.

#[derive(Default)]
struct RankingData {
    event_id: CString,
    model_id: CString,
    pairs: Vec<ActionProbability>,
    chosen: Option<usize>,
}

struct ShimRanking {
    data: Mutex<RankingData>,
}

unsafe extern "C" fn shim_create_ranking_response() -> RawHandle {
    Box::into_raw(Box::new(ShimRanking {
        data: Mutex::new(RankingData::default()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_ranking_response(response: RawHandle) {
    if !response.is_null() {
        drop(unsafe { Box::from_raw(response as *mut ShimRanking) });
    }
}

unsafe extern "C" fn shim_ranking_event_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimRanking) }
        .data
        .lock()
        .unwrap()
        .event_id
        .as_ptr()
}

unsafe extern "C" fn shim_ranking_model_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimRanking) }
        .data
        .lock()
        .unwrap()
        .model_id
        .as_ptr()
}

unsafe extern "C" fn shim_ranking_count(response: RawHandle) -> usize {
    unsafe { &*(response as *const ShimRanking) }
        .data
        .lock()
        .unwrap()
        .pairs
        .len()
}

unsafe extern "C" fn shim_ranking_chosen_action(
    response: RawHandle,
    action_index: *mut usize,
    status: RawHandle,
) -> c_int {
    let data = unsafe { &*(response as *const ShimRanking) }.data.lock().unwrap();
    match data.chosen {
        Some(chosen) => {
            unsafe { *action_index = chosen };
            SUCCESS_CODE
        }
        None => unsafe { fail(status, ERR_INVALID_ARGUMENT, "ranking response is empty") },
    }
}

unsafe extern "C" fn shim_create_ranking_enumerator(response: RawHandle) -> RawHandle {
    let pairs = unsafe { &*(response as *const ShimRanking) }
        .data
        .lock()
        .unwrap()
        .pairs
        .clone();
    new_action_enumerator(pairs)
}

unsafe extern "C" fn shim_loop_choose_rank(
    rl_loop: RawHandle,
    event_id: *const c_char,
    context_json: *const c_char,
    flags: u32,
    response: RawHandle,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    let event_id = match unsafe { resolve_event_id_ptr(event_id, status) } {
        Ok(event_id) => event_id,
        Err(code) => return code,
    };
    let context = match unsafe { parse_context(context_json, status) } {
        Ok(context) => context,
        Err(code) => return code,
    };
    let count = match unsafe { context_actions(&context, status) } {
        Ok(count) => count,
        Err(code) => return code,
    };

    let (pairs, chosen) = rank_actions(count, &context);
    {
        let target = unsafe { &*(response as *const ShimRanking) };
        let mut data = target.data.lock().unwrap();
        data.event_id = to_owned_cstring(&event_id);
        data.model_id = to_owned_cstring(MODEL_ID);
        data.pairs = pairs;
        data.chosen = Some(chosen);
    }

    rl_loop.trace(0, &format!("choose_rank {event_id} (flags {flags})"));
    let payload = interaction_payload(&event_id, &context, "rank");
    unsafe { rl_loop.deliver(&rl_loop.interaction_sender, &payload, status) }
}

// ---------------------------------------------------------------------------
// Shared action/probability enumerator.

struct ShimActionEnumerator {
    items: Vec<ActionProbability>,
    position: usize,
    started: bool,
}

fn new_action_enumerator(items: Vec<ActionProbability>) -> RawHandle {
    Box::into_raw(Box::new(ShimActionEnumerator {
        items,
        position: 0,
        started: false,
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_action_enumerator(enumerator: RawHandle) {
    if !enumerator.is_null() {
        drop(unsafe { Box::from_raw(enumerator as *mut ShimActionEnumerator) });
    }
}

unsafe extern "C" fn shim_action_enumerator_init(enumerator: RawHandle) -> c_int {
    let enumerator = unsafe { &mut *(enumerator as *mut ShimActionEnumerator) };
    enumerator.started = true;
    enumerator.position = 0;
    c_int::from(!enumerator.items.is_empty())
}

unsafe extern "C" fn shim_action_enumerator_move_next(enumerator: RawHandle) -> c_int {
    let enumerator = unsafe { &mut *(enumerator as *mut ShimActionEnumerator) };
    if !enumerator.started {
        return unsafe { shim_action_enumerator_init(enumerator as *mut _ as RawHandle) };
    }
    enumerator.position += 1;
    c_int::from(enumerator.position < enumerator.items.len())
}

unsafe extern "C" fn shim_action_enumerator_current(enumerator: RawHandle) -> ActionProbability {
    let enumerator = unsafe { &*(enumerator as *const ShimActionEnumerator) };
    enumerator
        .items
        .get(enumerator.position)
        .copied()
        .unwrap_or(ActionProbability {
            action_id: 0,
            probability: 0.0,
        })
}

// ---------------------------------------------------------------------------
// Decision (per-slot) response.

struct ShimSlot {
    id: CString,
    action_id: c_int,
    probability: f32,
}

#[derive(Default)]
struct DecisionData {
    model_id: CString,
    // Boxed so slot addresses stay stable for the response's lifetime.
    slots: Box<[ShimSlot]>,
}

struct ShimDecision {
    data: Mutex<DecisionData>,
}

unsafe extern "C" fn shim_create_decision_response() -> RawHandle {
    Box::into_raw(Box::new(ShimDecision {
        data: Mutex::new(DecisionData::default()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_decision_response(response: RawHandle) {
    if !response.is_null() {
        drop(unsafe { Box::from_raw(response as *mut ShimDecision) });
    }
}

unsafe extern "C" fn shim_decision_model_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimDecision) }
        .data
        .lock()
        .unwrap()
        .model_id
        .as_ptr()
}

unsafe extern "C" fn shim_decision_count(response: RawHandle) -> usize {
    unsafe { &*(response as *const ShimDecision) }
        .data
        .lock()
        .unwrap()
        .slots
        .len()
}

/// Forward-only cursor over borrowed slot pointers.
struct ShimHandleEnumerator {
    items: Vec<RawHandle>,
    position: usize,
    started: bool,
}

fn new_handle_enumerator(items: Vec<RawHandle>) -> RawHandle {
    Box::into_raw(Box::new(ShimHandleEnumerator {
        items,
        position: 0,
        started: false,
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_handle_enumerator(enumerator: RawHandle) {
    if !enumerator.is_null() {
        drop(unsafe { Box::from_raw(enumerator as *mut ShimHandleEnumerator) });
    }
}

unsafe extern "C" fn shim_handle_enumerator_init(enumerator: RawHandle) -> c_int {
    let enumerator = unsafe { &mut *(enumerator as *mut ShimHandleEnumerator) };
    enumerator.started = true;
    enumerator.position = 0;
    c_int::from(!enumerator.items.is_empty())
}

unsafe extern "C" fn shim_handle_enumerator_move_next(enumerator: RawHandle) -> c_int {
    let enumerator = unsafe { &mut *(enumerator as *mut ShimHandleEnumerator) };
    if !enumerator.started {
        return unsafe { shim_handle_enumerator_init(enumerator as *mut _ as RawHandle) };
    }
    enumerator.position += 1;
    c_int::from(enumerator.position < enumerator.items.len())
}

unsafe extern "C" fn shim_handle_enumerator_current(enumerator: RawHandle) -> RawHandle {
    let enumerator = unsafe { &*(enumerator as *const ShimHandleEnumerator) };
    enumerator
        .items
        .get(enumerator.position)
        .copied()
        .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn shim_create_decision_enumerator(response: RawHandle) -> RawHandle {
    let data = unsafe { &*(response as *const ShimDecision) }.data.lock().unwrap();
    let items = data
        .slots
        .iter()
        .map(|slot| slot as *const ShimSlot as RawHandle)
        .collect();
    new_handle_enumerator(items)
}

unsafe extern "C" fn shim_slot_id(slot: RawHandle) -> *const c_char {
    unsafe { &*(slot as *const ShimSlot) }.id.as_ptr()
}

unsafe extern "C" fn shim_slot_action_id(slot: RawHandle) -> c_int {
    unsafe { &*(slot as *const ShimSlot) }.action_id
}

unsafe extern "C" fn shim_slot_probability(slot: RawHandle) -> f32 {
    unsafe { &*(slot as *const ShimSlot) }.probability
}

/// The `_slots` list of a multi-slot context; invalid-argument when
/// missing or empty. Returns each slot's explicit `_id`, if any.
unsafe fn context_slots(context: &Value, status: RawHandle) -> Result<Vec<Option<String>>, c_int> {
    match context.get("_slots").and_then(Value::as_array) {
        Some(slots) if !slots.is_empty() => Ok(slots
            .iter()
            .map(|slot| {
                slot.get("_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()),
        _ => Err(unsafe {
            fail(
                status,
                ERR_INVALID_ARGUMENT,
                "context must carry a non-empty _slots array",
            )
        }),
    }
}

unsafe extern "C" fn shim_loop_request_decision(
    rl_loop: RawHandle,
    context_json: *const c_char,
    flags: u32,
    response: RawHandle,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    let context = match unsafe { parse_context(context_json, status) } {
        Ok(context) => context,
        Err(code) => return code,
    };
    let action_count = match unsafe { context_actions(&context, status) } {
        Ok(count) => count,
        Err(code) => return code,
    };
    let slot_ids = match unsafe { context_slots(&context, status) } {
        Ok(slot_ids) => slot_ids,
        Err(code) => return code,
    };

    let probability = 1.0 / action_count as f32;
    let slots: Vec<ShimSlot> = slot_ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| ShimSlot {
            id: to_owned_cstring(&id.unwrap_or_else(|| format!("slot_{index}"))),
            action_id: (index % action_count) as c_int,
            probability,
        })
        .collect();

    let event_id = uuid::Uuid::new_v4().to_string();
    {
        let target = unsafe { &*(response as *const ShimDecision) };
        let mut data = target.data.lock().unwrap();
        data.model_id = to_owned_cstring(MODEL_ID);
        data.slots = slots.into_boxed_slice();
    }

    rl_loop.trace(0, &format!("request_decision (flags {flags})"));
    let payload = interaction_payload(&event_id, &context, "decision");
    unsafe { rl_loop.deliver(&rl_loop.interaction_sender, &payload, status) }
}

// ---------------------------------------------------------------------------
// Multi-slot response.

struct ShimSlotRanking {
    id: CString,
    pairs: Vec<ActionProbability>,
    chosen: Option<usize>,
}

#[derive(Default)]
struct MultiSlotData {
    event_id: CString,
    model_id: CString,
    slots: Box<[ShimSlotRanking]>,
}

struct ShimMultiSlot {
    data: Mutex<MultiSlotData>,
}

unsafe extern "C" fn shim_create_multi_slot_response() -> RawHandle {
    Box::into_raw(Box::new(ShimMultiSlot {
        data: Mutex::new(MultiSlotData::default()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_multi_slot_response(response: RawHandle) {
    if !response.is_null() {
        drop(unsafe { Box::from_raw(response as *mut ShimMultiSlot) });
    }
}

unsafe extern "C" fn shim_multi_slot_event_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimMultiSlot) }
        .data
        .lock()
        .unwrap()
        .event_id
        .as_ptr()
}

unsafe extern "C" fn shim_multi_slot_model_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimMultiSlot) }
        .data
        .lock()
        .unwrap()
        .model_id
        .as_ptr()
}

unsafe extern "C" fn shim_multi_slot_count(response: RawHandle) -> usize {
    unsafe { &*(response as *const ShimMultiSlot) }
        .data
        .lock()
        .unwrap()
        .slots
        .len()
}

unsafe extern "C" fn shim_create_multi_slot_enumerator(response: RawHandle) -> RawHandle {
    let data = unsafe { &*(response as *const ShimMultiSlot) }.data.lock().unwrap();
    let items = data
        .slots
        .iter()
        .map(|slot| slot as *const ShimSlotRanking as RawHandle)
        .collect();
    new_handle_enumerator(items)
}

unsafe extern "C" fn shim_slot_ranking_id(slot_ranking: RawHandle) -> *const c_char {
    unsafe { &*(slot_ranking as *const ShimSlotRanking) }.id.as_ptr()
}

unsafe extern "C" fn shim_slot_ranking_count(slot_ranking: RawHandle) -> usize {
    unsafe { &*(slot_ranking as *const ShimSlotRanking) }.pairs.len()
}

unsafe extern "C" fn shim_slot_ranking_chosen_action(
    slot_ranking: RawHandle,
    action_index: *mut usize,
    status: RawHandle,
) -> c_int {
    let slot_ranking = unsafe { &*(slot_ranking as *const ShimSlotRanking) };
    match slot_ranking.chosen {
        Some(chosen) => {
            unsafe { *action_index = chosen };
            SUCCESS_CODE
        }
        None => unsafe { fail(status, ERR_INVALID_ARGUMENT, "slot ranking is empty") },
    }
}

unsafe extern "C" fn shim_create_slot_ranking_enumerator(slot_ranking: RawHandle) -> RawHandle {
    let slot_ranking = unsafe { &*(slot_ranking as *const ShimSlotRanking) };
    new_action_enumerator(slot_ranking.pairs.clone())
}

unsafe extern "C" fn shim_loop_request_multi_slot_decision(
    rl_loop: RawHandle,
    event_id: *const c_char,
    context_json: *const c_char,
    flags: u32,
    response: RawHandle,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    let event_id = match unsafe { resolve_event_id_ptr(event_id, status) } {
        Ok(event_id) => event_id,
        Err(code) => return code,
    };
    let context = match unsafe { parse_context(context_json, status) } {
        Ok(context) => context,
        Err(code) => return code,
    };
    let action_count = match unsafe { context_actions(&context, status) } {
        Ok(count) => count,
        Err(code) => return code,
    };
    let slot_ids = match unsafe { context_slots(&context, status) } {
        Ok(slot_ids) => slot_ids,
        Err(code) => return code,
    };

    let slots: Vec<ShimSlotRanking> = slot_ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| {
            let chosen = index % action_count;
            let probability = 1.0 / action_count as f32;
            let mut pairs: Vec<ActionProbability> = (0..action_count)
                .map(|action_id| ActionProbability {
                    action_id,
                    probability,
                })
                .collect();
            pairs.swap(0, chosen);
            ShimSlotRanking {
                id: to_owned_cstring(&id.unwrap_or_else(|| format!("slot_{index}"))),
                pairs,
                chosen: Some(chosen),
            }
        })
        .collect();

    {
        let target = unsafe { &*(response as *const ShimMultiSlot) };
        let mut data = target.data.lock().unwrap();
        data.event_id = to_owned_cstring(&event_id);
        data.model_id = to_owned_cstring(MODEL_ID);
        data.slots = slots.into_boxed_slice();
    }

    rl_loop.trace(0, &format!("request_multi_slot_decision {event_id} (flags {flags})"));
    let payload = interaction_payload(&event_id, &context, "multi_slot");
    unsafe { rl_loop.deliver(&rl_loop.interaction_sender, &payload, status) }
}

// ---------------------------------------------------------------------------
// Continuous-action response.

#[derive(Default)]
struct ContinuousData {
    event_id: CString,
    model_id: CString,
    action: f32,
    pdf_value: f32,
}

struct ShimContinuous {
    data: Mutex<ContinuousData>,
}

unsafe extern "C" fn shim_create_continuous_response() -> RawHandle {
    Box::into_raw(Box::new(ShimContinuous {
        data: Mutex::new(ContinuousData::default()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_continuous_response(response: RawHandle) {
    if !response.is_null() {
        drop(unsafe { Box::from_raw(response as *mut ShimContinuous) });
    }
}

unsafe extern "C" fn shim_continuous_event_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimContinuous) }
        .data
        .lock()
        .unwrap()
        .event_id
        .as_ptr()
}

unsafe extern "C" fn shim_continuous_model_id(response: RawHandle) -> *const c_char {
    unsafe { &*(response as *const ShimContinuous) }
        .data
        .lock()
        .unwrap()
        .model_id
        .as_ptr()
}

unsafe extern "C" fn shim_continuous_chosen_action(response: RawHandle) -> f32 {
    unsafe { &*(response as *const ShimContinuous) }.data.lock().unwrap().action
}

unsafe extern "C" fn shim_continuous_chosen_action_pdf_value(response: RawHandle) -> f32 {
    unsafe { &*(response as *const ShimContinuous) }
        .data
        .lock()
        .unwrap()
        .pdf_value
}

unsafe extern "C" fn shim_loop_request_continuous_action(
    rl_loop: RawHandle,
    event_id: *const c_char,
    context_json: *const c_char,
    flags: u32,
    response: RawHandle,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    let event_id = match unsafe { resolve_event_id_ptr(event_id, status) } {
        Ok(event_id) => event_id,
        Err(code) => return code,
    };
    let context = match unsafe { parse_context(context_json, status) } {
        Ok(context) => context,
        Err(code) => return code,
    };

    // Midpoint of the configured action range, density uniform over it.
    let min = context.get("min").and_then(Value::as_f64).unwrap_or(0.0) as f32;
    let max = context.get("max").and_then(Value::as_f64).unwrap_or(1.0) as f32;
    if max <= min {
        return unsafe {
            fail(status, ERR_INVALID_ARGUMENT, "continuous action range is empty")
        };
    }
    {
        let target = unsafe { &*(response as *const ShimContinuous) };
        let mut data = target.data.lock().unwrap();
        data.event_id = to_owned_cstring(&event_id);
        data.model_id = to_owned_cstring(MODEL_ID);
        data.action = min + (max - min) / 2.0;
        data.pdf_value = 1.0 / (max - min);
    }

    rl_loop.trace(0, &format!("request_continuous_action {event_id} (flags {flags})"));
    let payload = interaction_payload(&event_id, &context, "continuous");
    unsafe { rl_loop.deliver(&rl_loop.interaction_sender, &payload, status) }
}

// ---------------------------------------------------------------------------
// Event reporting.

unsafe fn queue_observation(
    rl_loop: &ShimLoop,
    event_id: *const c_char,
    body: Value,
    status: RawHandle,
) -> c_int {
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    let event_id = unsafe { borrow_str(event_id) };
    if event_id.is_empty() {
        return unsafe { fail(status, ERR_INVALID_ARGUMENT, "empty event id") };
    }
    let payload = serde_json::to_vec(&ObservationEvent {
        event_id,
        observation: body,
    })
    .unwrap_or_default();
    // Observation delivery is asynchronous in spirit: a sender failure is
    // surfaced through the background-error channel, not the call status.
    let scratch = unsafe { shim_create_status() };
    let result = unsafe { rl_loop.deliver(&rl_loop.observation_sender, &payload, scratch) };
    if result != SUCCESS_CODE {
        let message = unsafe { borrow_str(shim_status_error_message(scratch)) }.to_string();
        rl_loop.background_error(result, &message);
    }
    unsafe { shim_delete_status(scratch) };
    SUCCESS_CODE
}

unsafe extern "C" fn shim_loop_report_action_taken(
    rl_loop: RawHandle,
    event_id: *const c_char,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    unsafe { queue_observation(rl_loop, event_id, Value::String("action_taken".into()), status) }
}

unsafe extern "C" fn shim_loop_report_outcome_f(
    rl_loop: RawHandle,
    event_id: *const c_char,
    outcome: f32,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    unsafe { queue_observation(rl_loop, event_id, serde_json::json!(outcome), status) }
}

unsafe extern "C" fn shim_loop_report_outcome_json(
    rl_loop: RawHandle,
    event_id: *const c_char,
    outcome_json: *const c_char,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let body: Value = match serde_json::from_str(unsafe { borrow_str(outcome_json) }) {
        Ok(body) => body,
        Err(err) => {
            return unsafe {
                fail(status, ERR_JSON_PARSE, &format!("malformed outcome JSON: {err}"))
            };
        }
    };
    unsafe { queue_observation(rl_loop, event_id, body, status) }
}

unsafe extern "C" fn shim_loop_report_slot_outcome_f(
    rl_loop: RawHandle,
    event_id: *const c_char,
    slot_id: *const c_char,
    outcome: f32,
    status: RawHandle,
) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let slot_id = unsafe { borrow_str(slot_id) };
    if slot_id.is_empty() {
        return unsafe { fail(status, ERR_INVALID_ARGUMENT, "empty slot id") };
    }
    let body = serde_json::json!({ "slot": slot_id, "value": outcome });
    unsafe { queue_observation(rl_loop, event_id, body, status) }
}

unsafe extern "C" fn shim_loop_refresh_model(rl_loop: RawHandle, status: RawHandle) -> c_int {
    let rl_loop = unsafe { &*(rl_loop as *const ShimLoop) };
    let not_ready = rl_loop.require_init(status);
    if not_ready != SUCCESS_CODE {
        return not_ready;
    }
    rl_loop.trace(1, "model refreshed");
    SUCCESS_CODE
}

// ---------------------------------------------------------------------------
// Episode state.

struct ShimEpisode {
    id: CString,
    history: Mutex<Vec<String>>,
}

unsafe extern "C" fn shim_create_episode_state(episode_id: *const c_char) -> RawHandle {
    let episode_id = unsafe { borrow_str(episode_id) };
    if episode_id.is_empty() {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(ShimEpisode {
        id: to_owned_cstring(episode_id),
        history: Mutex::new(Vec::new()),
    })) as RawHandle
}

unsafe extern "C" fn shim_delete_episode_state(episode: RawHandle) {
    if !episode.is_null() {
        drop(unsafe { Box::from_raw(episode as *mut ShimEpisode) });
    }
}

unsafe extern "C" fn shim_episode_id(episode: RawHandle) -> *const c_char {
    unsafe { &*(episode as *const ShimEpisode) }.id.as_ptr()
}

unsafe extern "C" fn shim_episode_update(
    episode: RawHandle,
    event_id: *const c_char,
    previous_event_id: *const c_char,
    context_json: *const c_char,
    _ranking: RawHandle,
    status: RawHandle,
) -> c_int {
    let episode = unsafe { &*(episode as *const ShimEpisode) };
    let event_id = unsafe { borrow_str(event_id) };
    if event_id.is_empty() {
        return unsafe { fail(status, ERR_INVALID_ARGUMENT, "empty event id") };
    }
    if let Err(err) = serde_json::from_str::<Value>(unsafe { borrow_str(context_json) }) {
        return unsafe {
            fail(status, ERR_JSON_PARSE, &format!("malformed context JSON: {err}"))
        };
    }
    let mut history = episode.history.lock().unwrap();
    if !previous_event_id.is_null() {
        let previous = unsafe { borrow_str(previous_event_id) };
        if !history.iter().any(|recorded| recorded == previous) {
            return unsafe {
                fail(
                    status,
                    ERR_INVALID_ARGUMENT,
                    &format!("previous event {previous} is not part of this episode"),
                )
            };
        }
    }
    history.push(event_id.to_string());
    SUCCESS_CODE
}

// ---------------------------------------------------------------------------
// Shared buffers.

struct ShimBuffer {
    refs: AtomicUsize,
    data: Vec<u8>,
}

pub(crate) fn new_buffer(data: Vec<u8>) -> RawHandle {
    Box::into_raw(Box::new(ShimBuffer {
        refs: AtomicUsize::new(1),
        data,
    })) as RawHandle
}

unsafe extern "C" fn shim_clone_buffer(buffer: RawHandle) -> RawHandle {
    let shared = unsafe { &*(buffer as *const ShimBuffer) };
    shared.refs.fetch_add(1, Ordering::Relaxed);
    buffer
}

unsafe extern "C" fn shim_release_buffer(buffer: RawHandle) {
    if buffer.is_null() {
        return;
    }
    let shared = unsafe { &*(buffer as *const ShimBuffer) };
    if shared.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
        drop(unsafe { Box::from_raw(buffer as *mut ShimBuffer) });
    }
}

unsafe extern "C" fn shim_buffer_data(buffer: RawHandle) -> *const u8 {
    unsafe { &*(buffer as *const ShimBuffer) }.data.as_ptr()
}

unsafe extern "C" fn shim_buffer_len(buffer: RawHandle) -> usize {
    unsafe { &*(buffer as *const ShimBuffer) }.data.len()
}

/// An owned buffer over `bytes`, usable wherever a native buffer is.
#[cfg(test)]
pub(crate) fn test_buffer(bytes: &[u8]) -> crate::buffer::SharedBuffer {
    unsafe { crate::buffer::SharedBuffer::from_raw(new_buffer(bytes.to_vec())) }
}

// ---------------------------------------------------------------------------

pub(crate) static SHIM_API: NativeApi = NativeApi {
    create_status: shim_create_status,
    delete_status: shim_delete_status,
    status_error_code: shim_status_error_code,
    status_error_message: shim_status_error_message,
    update_status: shim_update_status,

    create_config: shim_create_config,
    delete_config: shim_delete_config,
    config_set: shim_config_set,
    config_get: shim_config_get,
    load_configuration_from_json: shim_load_configuration_from_json,

    create_factory_context: shim_create_factory_context,
    delete_factory_context: shim_delete_factory_context,
    set_factory_context_sender_factory: shim_set_factory_context_sender_factory,

    create_loop: shim_create_loop,
    delete_loop: shim_delete_loop,
    loop_init: shim_loop_init,
    loop_set_error_callback: shim_loop_set_error_callback,
    loop_set_trace_callback: shim_loop_set_trace_callback,

    loop_choose_rank: shim_loop_choose_rank,
    loop_request_decision: shim_loop_request_decision,
    loop_request_multi_slot_decision: shim_loop_request_multi_slot_decision,
    loop_request_continuous_action: shim_loop_request_continuous_action,

    loop_report_action_taken: shim_loop_report_action_taken,
    loop_report_outcome_f: shim_loop_report_outcome_f,
    loop_report_outcome_json: shim_loop_report_outcome_json,
    loop_report_slot_outcome_f: shim_loop_report_slot_outcome_f,

    loop_refresh_model: shim_loop_refresh_model,

    create_ranking_response: shim_create_ranking_response,
    delete_ranking_response: shim_delete_ranking_response,
    ranking_event_id: shim_ranking_event_id,
    ranking_model_id: shim_ranking_model_id,
    ranking_count: shim_ranking_count,
    ranking_chosen_action: shim_ranking_chosen_action,
    create_ranking_enumerator: shim_create_ranking_enumerator,

    delete_action_enumerator: shim_delete_action_enumerator,
    action_enumerator_init: shim_action_enumerator_init,
    action_enumerator_move_next: shim_action_enumerator_move_next,
    action_enumerator_current: shim_action_enumerator_current,

    create_decision_response: shim_create_decision_response,
    delete_decision_response: shim_delete_decision_response,
    decision_model_id: shim_decision_model_id,
    decision_count: shim_decision_count,
    create_decision_enumerator: shim_create_decision_enumerator,
    delete_decision_enumerator: shim_delete_handle_enumerator,
    decision_enumerator_init: shim_handle_enumerator_init,
    decision_enumerator_move_next: shim_handle_enumerator_move_next,
    decision_enumerator_current: shim_handle_enumerator_current,
    slot_id: shim_slot_id,
    slot_action_id: shim_slot_action_id,
    slot_probability: shim_slot_probability,

    create_multi_slot_response: shim_create_multi_slot_response,
    delete_multi_slot_response: shim_delete_multi_slot_response,
    multi_slot_event_id: shim_multi_slot_event_id,
    multi_slot_model_id: shim_multi_slot_model_id,
    multi_slot_count: shim_multi_slot_count,
    create_multi_slot_enumerator: shim_create_multi_slot_enumerator,
    delete_multi_slot_enumerator: shim_delete_handle_enumerator,
    multi_slot_enumerator_init: shim_handle_enumerator_init,
    multi_slot_enumerator_move_next: shim_handle_enumerator_move_next,
    multi_slot_enumerator_current: shim_handle_enumerator_current,
    slot_ranking_id: shim_slot_ranking_id,
    slot_ranking_count: shim_slot_ranking_count,
    slot_ranking_chosen_action: shim_slot_ranking_chosen_action,
    create_slot_ranking_enumerator: shim_create_slot_ranking_enumerator,

    create_continuous_response: shim_create_continuous_response,
    delete_continuous_response: shim_delete_continuous_response,
    continuous_event_id: shim_continuous_event_id,
    continuous_model_id: shim_continuous_model_id,
    continuous_chosen_action: shim_continuous_chosen_action,
    continuous_chosen_action_pdf_value: shim_continuous_chosen_action_pdf_value,

    create_episode_state: shim_create_episode_state,
    delete_episode_state: shim_delete_episode_state,
    episode_id: shim_episode_id,
    episode_update: shim_episode_update,

    clone_buffer: shim_clone_buffer,
    release_buffer: shim_release_buffer,
    buffer_data: shim_buffer_data,
    buffer_len: shim_buffer_len,
};
