//! Decision responses for per-slot (CCB) requests.

use std::marker::PhantomData;

use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::util::decode_borrowed_str;

/// One decision per slot of the request context.
pub struct DecisionResponse {
    handle: NativeHandle,
}

impl DecisionResponse {
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(
            || unsafe { (api.create_decision_response)() },
            api.delete_decision_response,
        ) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native decision response: {err}"),
        }
    }

    pub fn model_id(&self) -> String {
        let _live = self.handle.live_guard("DecisionResponse");
        unsafe { decode_borrowed_str((ffi::api().decision_model_id)(self.handle.raw())) }
    }

    pub fn len(&self) -> usize {
        let _live = self.handle.live_guard("DecisionResponse");
        unsafe { (ffi::api().decision_count)(self.handle.raw()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the per-slot decisions in slot order.
    pub fn iter(&self) -> SlotIter<'_> {
        let _live = self.handle.live_guard("DecisionResponse");
        let raw = unsafe { (ffi::api().create_decision_enumerator)(self.handle.raw()) };
        SlotIter {
            enumerator: NativeHandle::adopted(raw, ffi::api().delete_decision_enumerator),
            started: false,
            _owner: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for DecisionResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a DecisionResponse {
    type Item = SlotResponse<'a>;
    type IntoIter = SlotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward-only cursor over the slots of a [`DecisionResponse`].
pub struct SlotIter<'a> {
    enumerator: NativeHandle,
    started: bool,
    _owner: PhantomData<&'a DecisionResponse>,
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = SlotResponse<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let api = ffi::api();
        let available = if self.started {
            unsafe { (api.decision_enumerator_move_next)(self.enumerator.raw()) }
        } else {
            self.started = true;
            unsafe { (api.decision_enumerator_init)(self.enumerator.raw()) }
        };
        if available != 1 {
            return None;
        }
        let raw = unsafe { (api.decision_enumerator_current)(self.enumerator.raw()) };
        Some(SlotResponse {
            raw,
            _owner: PhantomData,
        })
    }
}

/// The decision for one slot: a view borrowing storage owned by the
/// response it came from.
pub struct SlotResponse<'a> {
    raw: RawHandle,
    _owner: PhantomData<&'a DecisionResponse>,
}

impl SlotResponse<'_> {
    pub fn slot_id(&self) -> String {
        unsafe { decode_borrowed_str((ffi::api().slot_id)(self.raw)) }
    }

    /// Index of the action chosen for this slot.
    pub fn action_id(&self) -> u32 {
        unsafe { (ffi::api().slot_action_id)(self.raw) as u32 }
    }

    /// Probability the chosen action was sampled with.
    pub fn probability(&self) -> f32 {
        unsafe { (ffi::api().slot_probability)(self.raw) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpopulated_response_is_empty() {
        let response = DecisionResponse::new();
        assert_eq!(response.model_id(), "");
        assert!(response.is_empty());
        assert_eq!(response.iter().count(), 0);
    }
}
