//! The inference loop: decision requests, event queueing, model refresh.

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

use libc::c_void;

use crate::config::Configuration;
use crate::continuous::ContinuousActionResponse;
use crate::decision::DecisionResponse;
use crate::error::{Result, RlError};
use crate::events::{
    CallbackBridge, SubscriptionToken, TraceLevel, error_trampoline, trace_trampoline,
};
use crate::factory::FactoryContext;
use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::multi_slot::MultiSlotResponse;
use crate::ranking::RankingResponse;
use crate::status::{self, ApiStatus, SUCCESS_CODE};
use crate::util::{check_event_id, check_json_payload, opt_ptr, to_cstring, to_opt_cstring};

/// Per-event activation mode.
///
/// A deferred event is queued but excluded from learning until activated
/// by a matching action-taken report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionFlags {
    #[default]
    Default,
    Deferred,
}

impl ActionFlags {
    fn raw(self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Deferred => 1,
        }
    }
}

/// A configured inference loop.
///
/// One `LiveModel` serves every request shape: single ranking, per-slot
/// decisions, multi-slot rankings, and continuous actions. Construction
/// wires the background-error channel; [`init`](Self::init) must succeed
/// before any request or queue operation.
///
/// All operations are safe to call concurrently against one live model.
/// Disposal may race in-flight calls; the native loop is destroyed only
/// after the last in-flight call returns.
pub struct LiveModel {
    handle: NativeHandle,
    bridge: Arc<CallbackBridge>,
    // Raw bridge reference handed to the native callbacks; reclaimed in
    // `Drop` after the callbacks can no longer fire.
    bridge_anchor: AtomicPtr<c_void>,
    // Keeps the registered sender factory (and the trampoline context the
    // native side copied out of it) alive for the loop's lifetime.
    _factory: Option<Arc<FactoryContext>>,
}

impl LiveModel {
    /// Creates a loop over `config` with default sender wiring.
    pub fn new(config: &Configuration) -> Result<Self> {
        Self::create(config, None)
    }

    /// Creates a loop whose binding-sender channels resolve through
    /// `factory`. The model holds the context, so the registered factory
    /// stays callable for as long as the loop exists.
    pub fn with_factory_context(
        config: &Configuration,
        factory: Arc<FactoryContext>,
    ) -> Result<Self> {
        Self::create(config, Some(factory))
    }

    fn create(config: &Configuration, factory: Option<Arc<FactoryContext>>) -> Result<Self> {
        let api = ffi::api();
        let factory_ctx = factory.as_deref().map_or(ptr::null_mut(), FactoryContext::raw);
        let handle = NativeHandle::create(
            || unsafe { (api.create_loop)(config.raw(), factory_ctx) },
            api.delete_loop,
        )?;

        let bridge = CallbackBridge::new();
        let anchor = Arc::into_raw(Arc::clone(&bridge)) as *mut c_void;
        unsafe {
            (api.loop_set_error_callback)(handle.raw(), Some(error_trampoline), anchor);
        }

        Ok(Self {
            handle,
            bridge,
            bridge_anchor: AtomicPtr::new(anchor),
            _factory: factory,
        })
    }

    /// Loads the model and starts the background machinery; `false` leaves
    /// the failure in `status`.
    pub fn try_init(&self, status: Option<&mut ApiStatus>) -> bool {
        let _live = self.live();
        let result =
            unsafe { (ffi::api().loop_init)(self.handle.raw(), status::raw_or_null(status)) };
        result == SUCCESS_CODE
    }

    /// Throwing form of [`try_init`](Self::try_init).
    pub fn init(&self) -> Result<()> {
        status::try_or_error(|status| self.try_init(status))
    }

    /// Requests a ranking of the actions in `context_json`. `None` event
    /// id asks the native side to generate one; `Some("")` is rejected by
    /// the native side as invalid.
    ///
    /// # Panics
    ///
    /// Panics when `context_json` is empty or whitespace-only.
    pub fn try_choose_rank(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
        response: &mut RankingResponse,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_json_payload(context_json, "context_json");
        let _live = self.live();
        let event_id = to_opt_cstring(event_id, "event_id");
        let context_json = to_cstring(context_json, "context_json");
        let result = unsafe {
            (ffi::api().loop_choose_rank)(
                self.handle.raw(),
                opt_ptr(&event_id),
                context_json.as_ptr(),
                flags.raw(),
                response.raw(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    /// Throwing form of [`try_choose_rank`](Self::try_choose_rank).
    pub fn choose_rank(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
    ) -> Result<RankingResponse> {
        let mut response = RankingResponse::new();
        let mut status = ApiStatus::new();
        if self.try_choose_rank(event_id, context_json, flags, &mut response, Some(&mut status)) {
            Ok(response)
        } else {
            Err(RlError::from_status(&status))
        }
    }

    /// Requests one decision per slot of `context_json`. Event ids are
    /// carried per slot inside the context, so there is no event id
    /// parameter.
    ///
    /// # Panics
    ///
    /// Panics when `context_json` is empty or whitespace-only.
    pub fn try_request_decision(
        &self,
        context_json: &str,
        flags: ActionFlags,
        response: &mut DecisionResponse,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_json_payload(context_json, "context_json");
        let _live = self.live();
        let context_json = to_cstring(context_json, "context_json");
        let result = unsafe {
            (ffi::api().loop_request_decision)(
                self.handle.raw(),
                context_json.as_ptr(),
                flags.raw(),
                response.raw(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn request_decision(&self, context_json: &str, flags: ActionFlags) -> Result<DecisionResponse> {
        let mut response = DecisionResponse::new();
        let mut status = ApiStatus::new();
        if self.try_request_decision(context_json, flags, &mut response, Some(&mut status)) {
            Ok(response)
        } else {
            Err(RlError::from_status(&status))
        }
    }

    /// Requests a full ranking per slot of `context_json`.
    ///
    /// # Panics
    ///
    /// Panics when `context_json` is empty or whitespace-only.
    pub fn try_request_multi_slot_decision(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
        response: &mut MultiSlotResponse,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_json_payload(context_json, "context_json");
        let _live = self.live();
        let event_id = to_opt_cstring(event_id, "event_id");
        let context_json = to_cstring(context_json, "context_json");
        let result = unsafe {
            (ffi::api().loop_request_multi_slot_decision)(
                self.handle.raw(),
                opt_ptr(&event_id),
                context_json.as_ptr(),
                flags.raw(),
                response.raw(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn request_multi_slot_decision(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
    ) -> Result<MultiSlotResponse> {
        let mut response = MultiSlotResponse::new();
        let mut status = ApiStatus::new();
        if self.try_request_multi_slot_decision(
            event_id,
            context_json,
            flags,
            &mut response,
            Some(&mut status),
        ) {
            Ok(response)
        } else {
            Err(RlError::from_status(&status))
        }
    }

    /// Samples a continuous action for `context_json`.
    ///
    /// # Panics
    ///
    /// Panics when `context_json` is empty or whitespace-only.
    pub fn try_request_continuous_action(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
        response: &mut ContinuousActionResponse,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_json_payload(context_json, "context_json");
        let _live = self.live();
        let event_id = to_opt_cstring(event_id, "event_id");
        let context_json = to_cstring(context_json, "context_json");
        let result = unsafe {
            (ffi::api().loop_request_continuous_action)(
                self.handle.raw(),
                opt_ptr(&event_id),
                context_json.as_ptr(),
                flags.raw(),
                response.raw(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn request_continuous_action(
        &self,
        event_id: Option<&str>,
        context_json: &str,
        flags: ActionFlags,
    ) -> Result<ContinuousActionResponse> {
        let mut response = ContinuousActionResponse::new();
        let mut status = ApiStatus::new();
        if self.try_request_continuous_action(
            event_id,
            context_json,
            flags,
            &mut response,
            Some(&mut status),
        ) {
            Ok(response)
        } else {
            Err(RlError::from_status(&status))
        }
    }

    /// Activates a previously deferred event.
    ///
    /// # Panics
    ///
    /// Panics when `event_id` is empty.
    pub fn try_queue_action_taken_event(&self, event_id: &str, status: Option<&mut ApiStatus>) -> bool {
        check_event_id(event_id);
        let _live = self.live();
        let event_id = to_cstring(event_id, "event_id");
        let result = unsafe {
            (ffi::api().loop_report_action_taken)(
                self.handle.raw(),
                event_id.as_ptr(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn queue_action_taken_event(&self, event_id: &str) -> Result<()> {
        status::try_or_error(|status| self.try_queue_action_taken_event(event_id, status))
    }

    /// Queues a numeric outcome for `event_id`.
    ///
    /// # Panics
    ///
    /// Panics when `event_id` is empty.
    pub fn try_queue_outcome_event(
        &self,
        event_id: &str,
        outcome: f32,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_event_id(event_id);
        let _live = self.live();
        let event_id = to_cstring(event_id, "event_id");
        let result = unsafe {
            (ffi::api().loop_report_outcome_f)(
                self.handle.raw(),
                event_id.as_ptr(),
                outcome,
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn queue_outcome_event(&self, event_id: &str, outcome: f32) -> Result<()> {
        status::try_or_error(|status| self.try_queue_outcome_event(event_id, outcome, status))
    }

    /// Queues a structured JSON outcome for `event_id`.
    ///
    /// # Panics
    ///
    /// Panics when `event_id` is empty or `outcome_json` is empty or
    /// whitespace-only.
    pub fn try_queue_outcome_event_json(
        &self,
        event_id: &str,
        outcome_json: &str,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_event_id(event_id);
        check_json_payload(outcome_json, "outcome_json");
        let _live = self.live();
        let event_id = to_cstring(event_id, "event_id");
        let outcome_json = to_cstring(outcome_json, "outcome_json");
        let result = unsafe {
            (ffi::api().loop_report_outcome_json)(
                self.handle.raw(),
                event_id.as_ptr(),
                outcome_json.as_ptr(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn queue_outcome_event_json(&self, event_id: &str, outcome_json: &str) -> Result<()> {
        status::try_or_error(|status| {
            self.try_queue_outcome_event_json(event_id, outcome_json, status)
        })
    }

    /// Queues a numeric outcome for one slot of a multi-slot event.
    ///
    /// # Panics
    ///
    /// Panics when `event_id` or `slot_id` is empty.
    pub fn try_queue_slot_outcome_event(
        &self,
        event_id: &str,
        slot_id: &str,
        outcome: f32,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_event_id(event_id);
        if slot_id.is_empty() {
            panic!("slot_id must not be empty");
        }
        let _live = self.live();
        let event_id = to_cstring(event_id, "event_id");
        let slot_id = to_cstring(slot_id, "slot_id");
        let result = unsafe {
            (ffi::api().loop_report_slot_outcome_f)(
                self.handle.raw(),
                event_id.as_ptr(),
                slot_id.as_ptr(),
                outcome,
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    pub fn queue_slot_outcome_event(&self, event_id: &str, slot_id: &str, outcome: f32) -> Result<()> {
        status::try_or_error(|status| {
            self.try_queue_slot_outcome_event(event_id, slot_id, outcome, status)
        })
    }

    /// Forces an immediate model reload from the configured source.
    pub fn try_refresh_model(&self, status: Option<&mut ApiStatus>) -> bool {
        let _live = self.live();
        let result = unsafe {
            (ffi::api().loop_refresh_model)(self.handle.raw(), status::raw_or_null(status))
        };
        result == SUCCESS_CODE
    }

    pub fn refresh_model(&self) -> Result<()> {
        status::try_or_error(|status| self.try_refresh_model(status))
    }

    /// Subscribes to failures raised on the loop's background threads.
    /// Callable at any time from any thread.
    ///
    /// An error with no subscribers is escalated as a panic on a dedicated
    /// thread rather than dropped.
    pub fn on_background_error(
        &self,
        handler: impl Fn(&RlError) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.bridge.subscribe_error(Arc::new(handler))
    }

    pub fn unsubscribe_background_error(&self, token: SubscriptionToken) {
        self.bridge.unsubscribe_error(token);
    }

    /// Subscribes to native trace messages. The native trace channel is
    /// registered when the first subscriber arrives and cleared when the
    /// last one leaves.
    pub fn on_trace(
        &self,
        handler: impl Fn(TraceLevel, &str) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let _live = self.live();
        let anchor = self.bridge_anchor.load(Ordering::Acquire);
        if anchor.is_null() {
            panic!("LiveModel used after dispose");
        }
        self.bridge.subscribe_trace(Arc::new(handler), || unsafe {
            (ffi::api().loop_set_trace_callback)(self.handle.raw(), Some(trace_trampoline), anchor);
        })
    }

    pub fn unsubscribe_trace(&self, token: SubscriptionToken) {
        let _live = self.live();
        self.bridge.unsubscribe_trace(token, || unsafe {
            (ffi::api().loop_set_trace_callback)(self.handle.raw(), None, ptr::null_mut());
        });
    }

    /// Whether [`dispose`](Self::dispose) has been called. A disposed
    /// model panics on any further operation.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Releases the native loop. Idempotent and safe to race with
    /// in-flight calls; destruction waits for them to drain.
    ///
    /// The bridge anchor handed to the native callbacks is reclaimed in
    /// `Drop`, not here: a concurrent call that slipped past the dispose
    /// bit may still hand the anchor to a registration, and the anchor
    /// stays valid until no `&self` call can exist.
    pub fn dispose(&self) {
        if let Some(_live) = self.handle.guard() {
            let api = ffi::api();
            unsafe {
                (api.loop_set_error_callback)(self.handle.raw(), None, ptr::null_mut());
                (api.loop_set_trace_callback)(self.handle.raw(), None, ptr::null_mut());
            }
        }
        self.handle.dispose();
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    fn live(&self) -> crate::handle::HandleGuard<'_> {
        self.handle.live_guard("LiveModel")
    }
}

impl Drop for LiveModel {
    fn drop(&mut self) {
        self.dispose();
        // Exclusive access: no in-flight call can still read the anchor.
        let anchor = self.bridge_anchor.swap(ptr::null_mut(), Ordering::AcqRel);
        if !anchor.is_null() {
            drop(unsafe { Arc::from_raw(anchor as *const CallbackBridge) });
        }
    }
}
