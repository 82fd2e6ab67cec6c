//! Ranking responses produced by contextual-bandit decisions.

use std::marker::PhantomData;

use crate::error::{Result, RlError};
use crate::ffi::{self, RawHandle};
use crate::handle::NativeHandle;
use crate::status::{self, ApiStatus, SUCCESS_CODE};
use crate::util::decode_borrowed_str;

/// One entry of a ranking: an action index from the decision context and
/// the probability it was sampled with.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionProbability {
    pub action_id: usize,
    pub probability: f32,
}

/// Ranked actions for one decision event.
///
/// Created empty and populated by the loop call that produced it; the id
/// accessors return empty strings until then.
#[derive(Debug)]
pub struct RankingResponse {
    handle: NativeHandle,
}

impl RankingResponse {
    pub fn new() -> Self {
        let api = ffi::api();
        match NativeHandle::create(
            || unsafe { (api.create_ranking_response)() },
            api.delete_ranking_response,
        ) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native ranking response: {err}"),
        }
    }

    /// The event id this ranking answers, whether supplied by the caller
    /// or generated by the native side.
    pub fn event_id(&self) -> String {
        let _live = self.handle.live_guard("RankingResponse");
        unsafe { decode_borrowed_str((ffi::api().ranking_event_id)(self.handle.raw())) }
    }

    /// Identifier of the model that scored this decision.
    pub fn model_id(&self) -> String {
        let _live = self.handle.live_guard("RankingResponse");
        unsafe { decode_borrowed_str((ffi::api().ranking_model_id)(self.handle.raw())) }
    }

    pub fn len(&self) -> usize {
        let _live = self.handle.live_guard("RankingResponse");
        unsafe { (ffi::api().ranking_count)(self.handle.raw()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index of the action chosen for this event; `false` on an empty
    /// or unpopulated response, with the failure left in `status`.
    pub fn try_chosen_action(&self, status: Option<&mut ApiStatus>) -> Option<usize> {
        let _live = self.handle.live_guard("RankingResponse");
        let mut action_index = 0usize;
        let result = unsafe {
            (ffi::api().ranking_chosen_action)(
                self.handle.raw(),
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

    /// Iterates the ranked actions in rank order.
    pub fn iter(&self) -> ActionProbabilityIter<'_> {
        let _live = self.handle.live_guard("RankingResponse");
        let raw = unsafe { (ffi::api().create_ranking_enumerator)(self.handle.raw()) };
        ActionProbabilityIter::adopt(raw)
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl Default for RankingResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a RankingResponse {
    type Item = ActionProbability;
    type IntoIter = ActionProbabilityIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward-only cursor over the action/probability pairs of a response or
/// slot ranking. The borrow keeps the owning object alive for the life of
/// the cursor.
pub struct ActionProbabilityIter<'a> {
    enumerator: NativeHandle,
    started: bool,
    _owner: PhantomData<&'a ()>,
}

impl ActionProbabilityIter<'_> {
    /// Takes ownership of a freshly created native enumerator handle.
    pub(crate) fn adopt(raw: RawHandle) -> Self {
        Self {
            enumerator: NativeHandle::adopted(raw, ffi::api().delete_action_enumerator),
            started: false,
            _owner: PhantomData,
        }
    }
}

impl Iterator for ActionProbabilityIter<'_> {
    type Item = ActionProbability;

    fn next(&mut self) -> Option<Self::Item> {
        let api = ffi::api();
        let available = if self.started {
            unsafe { (api.action_enumerator_move_next)(self.enumerator.raw()) }
        } else {
            self.started = true;
            unsafe { (api.action_enumerator_init)(self.enumerator.raw()) }
        };
        (available == 1)
            .then(|| unsafe { (api.action_enumerator_current)(self.enumerator.raw()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpopulated_response_is_empty() {
        let response = RankingResponse::new();
        assert_eq!(response.event_id(), "");
        assert_eq!(response.model_id(), "");
        assert!(response.is_empty());
        assert_eq!(response.iter().count(), 0);
    }

    #[test]
    fn chosen_action_on_empty_response_fails_with_status() {
        let response = RankingResponse::new();
        let mut status = ApiStatus::new();
        assert!(response.try_chosen_action(Some(&mut status)).is_none());
        assert_ne!(status.error_code(), SUCCESS_CODE);
        assert!(response.chosen_action().is_err());
    }
}
