//! Per-episode state for multi-step decision chains.

use crate::error::{Result, RlError};
use crate::ffi;
use crate::handle::NativeHandle;
use crate::ranking::RankingResponse;
use crate::status::{self, ApiStatus, SUCCESS_CODE};
use crate::util::{check_event_id, check_json_payload, decode_borrowed_str, opt_ptr, to_cstring, to_opt_cstring};

/// Accumulated history of one episode, threaded through each multi-step
/// decision in the chain.
pub struct EpisodeState {
    handle: NativeHandle,
}

impl EpisodeState {
    /// # Panics
    ///
    /// Panics when `episode_id` is empty.
    pub fn new(episode_id: &str) -> Self {
        check_event_id(episode_id);
        let api = ffi::api();
        let encoded = to_cstring(episode_id, "episode_id");
        match NativeHandle::create(
            || unsafe { (api.create_episode_state)(encoded.as_ptr()) },
            api.delete_episode_state,
        ) {
            Ok(handle) => Self { handle },
            Err(err) => panic!("failed to allocate native episode state: {err}"),
        }
    }

    pub fn episode_id(&self) -> String {
        let _live = self.handle.live_guard("EpisodeState");
        unsafe { decode_borrowed_str((ffi::api().episode_id)(self.handle.raw())) }
    }

    /// Records one step's outcome ranking into the episode history.
    /// `previous_event_id` is absent for the first step of the chain.
    ///
    /// # Panics
    ///
    /// Panics when `event_id` is empty or `context_json` is empty or
    /// whitespace-only.
    pub fn try_update(
        &mut self,
        event_id: &str,
        previous_event_id: Option<&str>,
        context_json: &str,
        ranking: &RankingResponse,
        status: Option<&mut ApiStatus>,
    ) -> bool {
        check_event_id(event_id);
        check_json_payload(context_json, "context_json");
        let _live = self.handle.live_guard("EpisodeState");
        let event_id = to_cstring(event_id, "event_id");
        let previous_event_id = to_opt_cstring(previous_event_id, "previous_event_id");
        let context_json = to_cstring(context_json, "context_json");
        let result = unsafe {
            (ffi::api().episode_update)(
                self.handle.raw(),
                event_id.as_ptr(),
                opt_ptr(&previous_event_id),
                context_json.as_ptr(),
                ranking.raw(),
                status::raw_or_null(status),
            )
        };
        result == SUCCESS_CODE
    }

    /// Throwing form of [`try_update`](Self::try_update).
    pub fn update(
        &mut self,
        event_id: &str,
        previous_event_id: Option<&str>,
        context_json: &str,
        ranking: &RankingResponse,
    ) -> Result<()> {
        let mut status = ApiStatus::new();
        if self.try_update(event_id, previous_event_id, context_json, ranking, Some(&mut status)) {
            Ok(())
        } else {
            Err(RlError::from_status(&status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_episode_id() {
        let episode = EpisodeState::new("episode-7");
        assert_eq!(episode.episode_id(), "episode-7");
    }

    #[test]
    #[should_panic(expected = "event_id must not be empty")]
    fn empty_episode_id_is_rejected() {
        let _ = EpisodeState::new("");
    }
}
