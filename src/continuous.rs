//! Continuous-action responses.

use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::util::decode_borrowed_str;

/// The sampled action for one continuous-action decision: a point on the
/// action range plus its probability density there.
pub struct ContinuousActionResponse {
    handle: NativeHandle,
}

impl ContinuousActionResponse {
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(
            || unsafe { (api.create_continuous_response)() },
            api.delete_continuous_response,
        ) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native continuous-action response: {err}"),
        }
    }

    pub fn event_id(&self) -> String {
        let _live = self.handle.live_guard("ContinuousActionResponse");
        unsafe { decode_borrowed_str((ffi::api().continuous_event_id)(self.handle.raw())) }
    }

    pub fn model_id(&self) -> String {
        let _live = self.handle.live_guard("ContinuousActionResponse");
        unsafe { decode_borrowed_str((ffi::api().continuous_model_id)(self.handle.raw())) }
    }

    pub fn chosen_action(&self) -> f32 {
        let _live = self.handle.live_guard("ContinuousActionResponse");
        unsafe { (ffi::api().continuous_chosen_action)(self.handle.raw()) }
    }

    /// Probability density of the chosen action under the sampling
    /// distribution.
    pub fn chosen_action_pdf_value(&self) -> f32 {
        let _live = self.handle.live_guard("ContinuousActionResponse");
        unsafe { (ffi::api().continuous_chosen_action_pdf_value)(self.handle.raw()) }
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for ContinuousActionResponse {
    fn default() -> Self {
        Self::new()
    }
}
