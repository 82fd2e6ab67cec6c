//! Multi-slot responses: one full ranking per slot.

use std::marker::PhantomData;

use crate::error::{Result, RlError};
use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::ranking::ActionProbabilityIter;
use crate::status::{self, ApiStatus, SUCCESS_CODE};
use crate::util::decode_borrowed_str;

/// Per-slot rankings for one multi-slot decision event.
pub struct MultiSlotResponse {
    handle: NativeHandle,
}

impl MultiSlotResponse {
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(
            || unsafe { (api.create_multi_slot_response)() },
            api.delete_multi_slot_response,
        ) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native multi-slot response: {err}"),
        }
    }

    pub fn event_id(&self) -> String {
        let _live = self.handle.live_guard("MultiSlotResponse");
        unsafe { decode_borrowed_str((ffi::api().multi_slot_event_id)(self.handle.raw())) }
    }

    pub fn model_id(&self) -> String {
        let _live = self.handle.live_guard("MultiSlotResponse");
        unsafe { decode_borrowed_str((ffi::api().multi_slot_model_id)(self.handle.raw())) }
    }

    pub fn len(&self) -> usize {
        let _live = self.handle.live_guard("MultiSlotResponse");
        unsafe { (ffi::api().multi_slot_count)(self.handle.raw()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the slot rankings in slot order.
    pub fn iter(&self) -> SlotRankingIter<'_> {
        let _live = self.handle.live_guard("MultiSlotResponse");
        let raw = unsafe { (ffi::api().create_multi_slot_enumerator)(self.handle.raw()) };
        SlotRankingIter {
            enumerator: NativeHandle::adopted(raw, ffi::api().delete_multi_slot_enumerator),
            started: false,
            _owner: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for MultiSlotResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a MultiSlotResponse {
    type Item = SlotRanking<'a>;
    type IntoIter = SlotRankingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward-only cursor over the slots of a [`MultiSlotResponse`].
pub struct SlotRankingIter<'a> {
    enumerator: NativeHandle,
    started: bool,
    _owner: PhantomData<&'a MultiSlotResponse>,
}

impl<'a> Iterator for SlotRankingIter<'a> {
    type Item = SlotRanking<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let api = ffi::api();
        let available = if self.started {
            unsafe { (api.multi_slot_enumerator_move_next)(self.enumerator.raw()) }
        } else {
            self.started = true;
            unsafe { (api.multi_slot_enumerator_init)(self.enumerator.raw()) }
        };
        if available != 1 {
            return None;
        }
        let raw = unsafe { (api.multi_slot_enumerator_current)(self.enumerator.raw()) };
        Some(SlotRanking {
            raw,
            _owner: PhantomData,
        })
    }
}

/// The ranking for one slot: a view borrowing storage owned by the
/// response it came from.
pub struct SlotRanking<'a> {
    raw: RawHandle,
    _owner: PhantomData<&'a MultiSlotResponse>,
}

impl SlotRanking<'_> {
    pub fn slot_id(&self) -> String {
        unsafe { decode_borrowed_str((ffi::api().slot_ranking_id)(self.raw)) }
    }

    pub fn len(&self) -> usize {
        unsafe { (ffi::api().slot_ranking_count)(self.raw) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index of the action chosen for this slot; `None` on an empty
    /// ranking, with the failure left in `status`.
    pub fn try_chosen_action(&self, status: Option<&mut ApiStatus>) -> Option<usize> {
        let mut action_index = 0usize;
        let result = unsafe {
            (ffi::api().slot_ranking_chosen_action)(
                self.raw,
                &mut action_index,
                status::raw_or_null(status),
            )
        };
        (result == SUCCESS_CODE).then_some(action_index)
    }

    /// Throwing form of [`try_chosen_action`](Self::try_chosen_action).
    pub fn chosen_action(&self) -> Result<usize> {
        let mut status = ApiStatus::new();
        match self.try_chosen_action(Some(&mut status)) {
            Some(index) => Ok(index),
            None => Err(RlError::from_status(&status)),
        }
    }

    /// Iterates this slot's ranked actions.
    pub fn iter(&self) -> ActionProbabilityIter<'_> {
        let raw = unsafe { (ffi::api().create_slot_ranking_enumerator)(self.raw) };
        ActionProbabilityIter::adopt(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpopulated_response_is_empty() {
        let response = MultiSlotResponse::new();
        assert_eq!(response.event_id(), "");
        assert_eq!(response.model_id(), "");
        assert!(response.is_empty());
        assert_eq!(response.iter().count(), 0);
    }
}
