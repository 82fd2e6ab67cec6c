//! Safe Rust bindings over the native reinforcement-learning client
//! library.
//!
//! The native library exposes opaque handles created and destroyed by
//! paired entry points; this crate wraps each handle family in a typed
//! object with deterministic release, converts the native status-code
//! protocol into `Result`s, and bridges the library's background callbacks
//! onto Rust closures.
//!
//! # Thread safety
//!
//! Every typed object tolerates concurrent use and concurrent disposal:
//! the native resource is released exactly once, after the last in-flight
//! call against it returns. Using an object after an explicit dispose is a
//! caller bug and panics.
//!
//! # Errors
//!
//! Each fallible operation comes in two forms: `try_x(.., status)`
//! returning `bool` and populating the caller's [`ApiStatus`], and the
//! convenience `x(..)` returning [`Result`]. Both report the same code and
//! message for the same failure. Failures raised by the binding layer
//! itself (a panicking sender, for example) carry the reserved
//! [`BINDING_ERROR_CODE`] and a message starting with
//! [`BINDING_ERROR_PREFIX`].
//!
//! # Example
//!
//! ```no_run
//! use rlclient::{ActionFlags, Configuration, LiveModel};
//!
//! # fn main() -> rlclient::Result<()> {
//! let config = Configuration::from_json(r#"{"ApplicationID": "demo"}"#)?;
//! let model = LiveModel::new(&config)?;
//! model.init()?;
//!
//! let context = r#"{"shared": {"user": {}}, "_multi": [{"a": 1}, {"b": 2}]}"#;
//! let response = model.choose_rank(Some("event-1"), context, ActionFlags::Default)?;
//! let chosen = response.chosen_action()?;
//! model.queue_outcome_event("event-1", 1.0)?;
//! # let _ = chosen;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod config;
mod continuous;
mod decision;
mod episode;
mod error;
mod events;
mod factory;
pub mod ffi;
mod handle;
mod live_model;
mod multi_slot;
mod ranking;
mod sender;
mod shim;
mod status;
mod util;

pub use buffer::SharedBuffer;
pub use config::{Configuration, keys};
pub use continuous::ContinuousActionResponse;
pub use decision::{DecisionResponse, SlotIter, SlotResponse};
pub use episode::EpisodeState;
pub use error::{Result, RlError};
pub use events::{SubscriptionToken, TraceLevel};
pub use factory::FactoryContext;
pub use live_model::{ActionFlags, LiveModel};
pub use multi_slot::{MultiSlotResponse, SlotRanking, SlotRankingIter};
pub use ranking::{ActionProbability, ActionProbabilityIter, RankingResponse};
pub use sender::{AsyncSender, ErrorCallback, Sender, SenderFactory};
pub use status::{
    ApiStatus, ApiStatusBuilder, BINDING_ERROR_CODE, BINDING_ERROR_PREFIX, ERR_INVALID_ARGUMENT,
    ERR_JSON_PARSE, ERR_NOT_INITIALIZED, ERR_TYPE_NOT_REGISTERED, SUCCESS_CODE,
};

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    const CB_CONTEXT: &str =
        r#"{"shared": {"user": {"id": "u1"}}, "_multi": [{"f": 1}, {"f": 2}]}"#;

    fn basic_model() -> LiveModel {
        let config = Configuration::from_json(r#"{"ApplicationID": "test-app"}"#).unwrap();
        let model = LiveModel::new(&config).unwrap();
        model.init().unwrap();
        model
    }

    #[test]
    fn decision_and_outcome_round_trip() {
        let model = basic_model();
        let response = model
            .choose_rank(Some("evt1"), CB_CONTEXT, ActionFlags::Default)
            .unwrap();

        assert_eq!(response.event_id(), "evt1");
        assert_eq!(response.len(), 2);
        let chosen = response.chosen_action().unwrap();
        assert!(chosen < 2);

        let pairs: Vec<ActionProbability> = response.iter().collect();
        assert_eq!(pairs.len(), 2);
        let total: f32 = pairs.iter().map(|pair| pair.probability).sum();
        assert!((total - 1.0).abs() < 1e-6);

        model.queue_outcome_event("evt1", 1.0).unwrap();
        model.queue_action_taken_event("evt1").unwrap();
        model.refresh_model().unwrap();
    }

    #[test]
    fn generated_event_ids_are_unique() {
        let model = basic_model();
        let first = model.choose_rank(None, CB_CONTEXT, ActionFlags::Default).unwrap();
        let second = model.choose_rank(None, CB_CONTEXT, ActionFlags::Default).unwrap();
        assert!(!first.event_id().is_empty());
        assert_ne!(first.event_id(), second.event_id());
    }

    #[test]
    fn explicit_pdf_drives_the_ranking() {
        let model = basic_model();
        let context = r#"{"_multi": [{}, {}, {}], "p": [0.1, 0.7, 0.2]}"#;
        let response = model.choose_rank(Some("evt-pdf"), context, ActionFlags::Default).unwrap();
        assert_eq!(response.chosen_action().unwrap(), 1);
        let top = response.iter().next().unwrap();
        assert_eq!(top.action_id, 1);
        assert!((top.probability - 0.7).abs() < 1e-6);
    }

    #[test]
    fn try_and_throw_forms_report_the_same_failure() {
        let config = Configuration::new();
        let model = LiveModel::new(&config).unwrap();
        // Not initialized: both forms must agree on code and message.
        let mut status = ApiStatus::new();
        let mut response = RankingResponse::new();
        assert!(!model.try_choose_rank(
            Some("evt1"),
            CB_CONTEXT,
            ActionFlags::Default,
            &mut response,
            Some(&mut status),
        ));
        let err = model
            .choose_rank(Some("evt1"), CB_CONTEXT, ActionFlags::Default)
            .unwrap_err();
        assert_eq!(status.error_code(), ERR_NOT_INITIALIZED);
        assert_eq!(err.code(), status.error_code());
        assert_eq!(err.message(), status.error_message());
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn whitespace_context_is_rejected_before_any_native_call() {
        let model = basic_model();
        let _ = model.choose_rank(Some("evt1"), "   ", ActionFlags::Default);
    }

    #[test]
    fn malformed_context_fails_with_parse_code() {
        let model = basic_model();
        let err = model
            .choose_rank(Some("evt1"), "{not json", ActionFlags::Default)
            .unwrap_err();
        assert_eq!(err.code(), ERR_JSON_PARSE);
    }

    #[test]
    fn operations_after_dispose_panic() {
        let model = basic_model();
        model.dispose();
        let result = catch_unwind(AssertUnwindSafe(|| model.try_refresh_model(None)));
        let message = error::panic_message(result.unwrap_err());
        assert_eq!(message, "LiveModel used after dispose");
    }

    #[test]
    #[should_panic(expected = "LiveModel used after dispose")]
    fn trace_subscription_after_dispose_panics() {
        let model = basic_model();
        model.dispose();
        let _ = model.on_trace(|_, _| {});
    }

    #[test]
    fn trace_registration_toggles_only_on_edges() {
        let model = basic_model();
        let a = model.on_trace(|_, _| {});
        let b = model.on_trace(|_, _| {});
        assert_eq!(unsafe { shim::loop_trace_toggles(model.raw()) }, (1, 0));

        model.unsubscribe_trace(a);
        assert_eq!(unsafe { shim::loop_trace_toggles(model.raw()) }, (1, 0));
        model.unsubscribe_trace(b);
        assert_eq!(unsafe { shim::loop_trace_toggles(model.raw()) }, (1, 1));
    }

    #[test]
    fn trace_subscribers_observe_loop_activity() {
        let config = Configuration::new();
        let model = LiveModel::new(&config).unwrap();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _token = model.on_trace(move |_, message| {
            sink.lock().unwrap().push(message.to_string());
        });
        model.init().unwrap();
        assert!(seen.lock().unwrap().iter().any(|m| m.contains("initialized")));
    }

    #[test]
    fn trace_handlers_may_unsubscribe_themselves() {
        let config = Configuration::new();
        let model = Arc::new(LiveModel::new(&config).unwrap());
        let fired = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

        let token = model.on_trace({
            let model = Arc::clone(&model);
            let fired = Arc::clone(&fired);
            let slot = Arc::clone(&slot);
            move |_, _| {
                fired.fetch_add(1, Ordering::SeqCst);
                if let Some(token) = slot.lock().unwrap().take() {
                    model.unsubscribe_trace(token);
                }
            }
        });
        *slot.lock().unwrap() = Some(token);

        model.init().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The channel is clear again; further loop activity traces nothing.
        model.choose_rank(None, CB_CONTEXT, ActionFlags::Default).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    struct Recording {
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Sender for Recording {
        fn send(&self, buffer: SharedBuffer) -> Result<()> {
            self.payloads.lock().unwrap().push(buffer.as_bytes().to_vec());
            Ok(())
        }
    }

    fn binding_sender_config() -> Configuration {
        Configuration::from_json(&format!(
            r#"{{"ApplicationID": "test-app",
                 "{}": "{}",
                 "{}": "{}"}}"#,
            keys::INTERACTION_SENDER_IMPLEMENTATION,
            keys::BINDING_SENDER,
            keys::OBSERVATION_SENDER_IMPLEMENTATION,
            keys::BINDING_SENDER,
        ))
        .unwrap()
    }

    #[test]
    fn custom_senders_receive_both_event_channels() {
        let payloads: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = payloads.clone();

        let mut factory = FactoryContext::new();
        factory.set_sender_factory(Arc::new(
            move |_config: &Configuration, _error: ErrorCallback| -> Result<Box<dyn Sender>> {
                Ok(Box::new(Recording {
                    payloads: sink.clone(),
                }) as Box<dyn Sender>)
            },
        ));

        let config = binding_sender_config();
        let model = LiveModel::with_factory_context(&config, Arc::new(factory)).unwrap();
        model.init().unwrap();

        let response = model
            .choose_rank(Some("evt-sender"), CB_CONTEXT, ActionFlags::Default)
            .unwrap();
        assert_eq!(response.event_id(), "evt-sender");
        model.queue_outcome_event("evt-sender", 0.5).unwrap();

        let recorded = payloads.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        let interaction = String::from_utf8(recorded[0].clone()).unwrap();
        let observation = String::from_utf8(recorded[1].clone()).unwrap();
        assert!(interaction.contains("evt-sender"));
        assert!(observation.contains("evt-sender"));
        assert!(observation.contains("0.5"));
    }

    #[test]
    fn model_keeps_the_factory_registration_alive() {
        let payloads: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = payloads.clone();

        let mut factory = FactoryContext::new();
        factory.set_sender_factory(Arc::new(
            move |_config: &Configuration, _error: ErrorCallback| -> Result<Box<dyn Sender>> {
                Ok(Box::new(Recording {
                    payloads: sink.clone(),
                }) as Box<dyn Sender>)
            },
        ));
        let factory = Arc::new(factory);

        let config = binding_sender_config();
        let model = LiveModel::with_factory_context(&config, Arc::clone(&factory)).unwrap();
        // The caller's handle is gone before the factory is first consulted.
        drop(factory);
        model.init().unwrap();

        model
            .choose_rank(Some("evt-alive"), CB_CONTEXT, ActionFlags::Default)
            .unwrap();
        assert!(!payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn binding_sender_without_factory_fails_init_with_registration_code() {
        let config = binding_sender_config();
        let model = LiveModel::new(&config).unwrap();
        let err = model.init().unwrap_err();
        assert_eq!(err.code(), ERR_TYPE_NOT_REGISTERED);
        assert!(err.message().contains("BINDING_SENDER"));
    }

    #[test]
    fn panicking_sender_surfaces_as_opaque_binding_error() {
        struct Panicking;
        impl Sender for Panicking {
            fn send(&self, _buffer: SharedBuffer) -> Result<()> {
                panic!("boom");
            }
        }

        let mut factory = FactoryContext::new();
        factory.set_sender_factory(Arc::new(
            |_config: &Configuration, _error: ErrorCallback| -> Result<Box<dyn Sender>> {
                Ok(Box::new(Panicking) as Box<dyn Sender>)
            },
        ));

        let config = binding_sender_config();
        let model = LiveModel::with_factory_context(&config, Arc::new(factory)).unwrap();
        model.init().unwrap();

        let err = model
            .choose_rank(Some("evt-boom"), CB_CONTEXT, ActionFlags::Default)
            .unwrap_err();
        assert_eq!(err.code(), BINDING_ERROR_CODE);
        assert_eq!(err.message(), format!("{BINDING_ERROR_PREFIX}boom"));
    }

    #[test]
    fn observation_sender_failure_reaches_background_subscribers() {
        struct Failing;
        impl Sender for Failing {
            fn send(&self, _buffer: SharedBuffer) -> Result<()> {
                Err(RlError::new(42, "observation channel down"))
            }
        }

        let mut factory = FactoryContext::new();
        factory.set_sender_factory(Arc::new(
            |_config: &Configuration, _error: ErrorCallback| -> Result<Box<dyn Sender>> {
                Ok(Box::new(Failing) as Box<dyn Sender>)
            },
        ));

        let config = Configuration::from_json(&format!(
            r#"{{"{}": "{}"}}"#,
            keys::OBSERVATION_SENDER_IMPLEMENTATION,
            keys::BINDING_SENDER,
        ))
        .unwrap();
        let model = LiveModel::with_factory_context(&config, Arc::new(factory)).unwrap();
        let seen: Arc<Mutex<Vec<RlError>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _token = model.on_background_error(move |error| {
            sink.lock().unwrap().push(error.clone());
        });
        model.init().unwrap();

        // Queueing succeeds; the delivery failure arrives through the
        // background channel instead of the call status.
        model.queue_outcome_event("evt-bg", 1.0).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].code(), 42);
        assert_eq!(seen[0].message(), "observation channel down");
    }

    #[test]
    fn background_error_handlers_may_dispose_the_model() {
        struct Failing;
        impl Sender for Failing {
            fn send(&self, _buffer: SharedBuffer) -> Result<()> {
                Err(RlError::new(7, "observation channel down"))
            }
        }

        let mut factory = FactoryContext::new();
        factory.set_sender_factory(Arc::new(
            |_config: &Configuration, _error: ErrorCallback| -> Result<Box<dyn Sender>> {
                Ok(Box::new(Failing) as Box<dyn Sender>)
            },
        ));
        let config = Configuration::from_json(&format!(
            r#"{{"{}": "{}"}}"#,
            keys::OBSERVATION_SENDER_IMPLEMENTATION,
            keys::BINDING_SENDER,
        ))
        .unwrap();
        let model =
            Arc::new(LiveModel::with_factory_context(&config, Arc::new(factory)).unwrap());
        let _token = model.on_background_error({
            let model = Arc::clone(&model);
            move |_| model.dispose()
        });
        model.init().unwrap();

        model.queue_outcome_event("evt-teardown", 1.0).unwrap();
        assert!(model.is_disposed());
    }

    #[test]
    fn per_slot_decisions_cover_every_slot() {
        let model = basic_model();
        let context = r#"{"_multi": [{}, {}], "_slots": [{"_id": "top"}, {}, {}]}"#;
        let response = model.request_decision(context, ActionFlags::Default).unwrap();
        assert_eq!(response.len(), 3);

        let slots: Vec<_> = response.iter().collect();
        assert_eq!(slots[0].slot_id(), "top");
        assert_eq!(slots[1].slot_id(), "slot_1");
        for slot in &slots {
            assert!(slot.action_id() < 2);
            assert!((slot.probability() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn multi_slot_rankings_expose_per_slot_chains() {
        let model = basic_model();
        let context = r#"{"_multi": [{}, {}, {}], "_slots": [{"_id": "a"}, {"_id": "b"}]}"#;
        let response = model
            .request_multi_slot_decision(Some("evt-ms"), context, ActionFlags::Default)
            .unwrap();
        assert_eq!(response.event_id(), "evt-ms");
        assert_eq!(response.len(), 2);

        for (index, slot) in response.iter().enumerate() {
            assert_eq!(slot.len(), 3);
            assert_eq!(slot.chosen_action().unwrap(), index % 3);
            let first = slot.iter().next().unwrap();
            assert_eq!(first.action_id, slot.chosen_action().unwrap());
        }

        model.queue_slot_outcome_event("evt-ms", "a", 1.0).unwrap();
    }

    #[test]
    fn continuous_action_stays_inside_the_range() {
        let model = basic_model();
        let context = r#"{"min": 185.0, "max": 23959.0}"#;
        let response = model
            .request_continuous_action(Some("evt-ca"), context, ActionFlags::Default)
            .unwrap();
        assert_eq!(response.event_id(), "evt-ca");
        let action = response.chosen_action();
        assert!(action >= 185.0 && action <= 23959.0);
        assert!(response.chosen_action_pdf_value() > 0.0);
    }

    #[test]
    fn episode_chain_validates_previous_events() {
        let model = basic_model();
        let mut episode = EpisodeState::new("ep1");
        let first = model.choose_rank(Some("step1"), CB_CONTEXT, ActionFlags::Default).unwrap();
        episode.update("step1", None, CB_CONTEXT, &first).unwrap();

        let second = model.choose_rank(Some("step2"), CB_CONTEXT, ActionFlags::Default).unwrap();
        episode.update("step2", Some("step1"), CB_CONTEXT, &second).unwrap();

        let err = episode
            .update("step3", Some("missing"), CB_CONTEXT, &second)
            .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_ARGUMENT);
    }

    #[test]
    fn pseudolocalized_payloads_survive_the_boundary() {
        let config = Configuration::from_json(
            r#"{"ApplicationID": "ßïϱTèƨƭÂƥƥ-ℓôř"}"#,
        )
        .unwrap();
        assert_eq!(config.get(keys::APPLICATION_ID), "ßïϱTèƨƭÂƥƥ-ℓôř");

        let model = LiveModel::new(&config).unwrap();
        model.init().unwrap();
        let context = r#"{"Ƨĥářèδ": {"ƒ": "冗長な機能"}, "_multi": [{"ƒ": "اختبار"}, {}]}"#;
        let response = model
            .choose_rank(Some("évt-1"), context, ActionFlags::Default)
            .unwrap();
        assert_eq!(response.event_id(), "évt-1");
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn deferred_events_can_be_activated_later() {
        let model = basic_model();
        let response = model
            .choose_rank(Some("evt-deferred"), CB_CONTEXT, ActionFlags::Deferred)
            .unwrap();
        assert_eq!(response.event_id(), "evt-deferred");
        model.queue_action_taken_event("evt-deferred").unwrap();
    }
}
