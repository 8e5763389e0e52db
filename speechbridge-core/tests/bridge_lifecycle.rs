mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{invocation, lingering_factory, stub_factory, FakeHost};
use speechbridge_core::recognizer::stub::StubEngineFactory;
use speechbridge_core::{
    BridgeConfig, BridgeError, EngineNotification, LifecycleController, RecognizerConfig,
    ResultReason, SessionState, START_LISTENING, STOP_LISTENING,
};

fn valid_config() -> BridgeConfig {
    BridgeConfig {
        recognizer: RecognizerConfig {
            subscription_key: "test-key".into(),
            region: "westeurope".into(),
            ..RecognizerConfig::default()
        },
        ..BridgeConfig::default()
    }
}

fn wait_for_pending<H: speechbridge_core::ScriptHost>(
    controller: &LifecycleController<H>,
    expected: usize,
    timeout: Duration,
) {
    let start = Instant::now();
    while controller.pending_events() < expected {
        if start.elapsed() >= timeout {
            panic!(
                "timed out waiting for {expected} events, have {}",
                controller.pending_events()
            );
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn session_start_and_recognized_text_reach_host_in_order() {
    let host = FakeHost::new();
    let (factory, trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    controller.init(&valid_config()).expect("init");
    assert_eq!(controller.state(), SessionState::Active);

    host.call_global(START_LISTENING).expect("StartListening registered");
    trigger.emit(EngineNotification::SessionStarted);
    trigger.emit(EngineNotification::Recognized {
        reason: ResultReason::RecognizedSpeech,
        text: "hello world".into(),
    });

    host.tick();
    assert_eq!(
        host.take_invocations(),
        vec![
            invocation("onSpeechSessionStarted", &[""]),
            invocation("onSpeech", &["hello world"]),
        ]
    );

    host.tick();
    assert!(host.take_invocations().is_empty());
}

#[test]
fn stop_listening_while_uninitialized_has_no_side_effects() {
    let host = FakeHost::new();
    let (factory, _trigger) = stub_factory();
    let controller = LifecycleController::new(host.clone(), factory);

    let err = controller.stop_listening().unwrap_err();
    assert!(matches!(
        err,
        BridgeError::InvalidTransition {
            operation: "StopListening",
            state: SessionState::Uninitialized,
        }
    ));
    assert!(controller.start_listening().is_err());
    assert_eq!(controller.pending_events(), 0);
    assert_eq!(controller.diagnostics_snapshot().events_enqueued, 0);
    assert!(host.log.lock().is_empty());
}

#[test]
fn cleanup_is_idempotent_before_and_after_init() {
    let host = FakeHost::new();
    let (factory, _trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    controller.cleanup().expect("cleanup before init");
    assert_eq!(controller.state(), SessionState::Uninitialized);

    controller.init(&valid_config()).expect("init");
    controller.cleanup().expect("first cleanup");
    controller.cleanup().expect("second cleanup");
    assert_eq!(controller.state(), SessionState::Uninitialized);
    assert!(host.is_empty());
}

#[test]
fn cleanup_unregisters_before_anything_else_and_in_reverse_order() {
    let host = FakeHost::new();
    let (factory, _trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    controller.init(&valid_config()).expect("init");
    controller.cleanup().expect("cleanup");

    assert_eq!(
        *host.log.lock(),
        vec![
            "register StartListening/0",
            "register StopListening/0",
            "add tick",
            "remove tick",
            "unregister StopListening",
            "unregister StartListening",
        ]
    );
}

#[test]
fn no_handle_is_callable_after_cleanup() {
    let host = FakeHost::new();
    let (factory, trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    controller.init(&valid_config()).expect("init");
    controller.cleanup().expect("cleanup");
    assert!(!trigger.is_subscribed());

    // A misbehaving host that kept its pointers around.
    for stale in host.ever_registered.lock().iter() {
        assert!(matches!(
            stale.invoke(),
            Err(BridgeError::HandleReleased { .. })
        ));
    }
    for stale in host.ever_ticked.lock().iter() {
        assert!(matches!(
            stale.invoke(0.016),
            Err(BridgeError::HandleReleased { .. })
        ));
    }

    assert!(host.call_global(STOP_LISTENING).is_err());
    host.tick();
    assert!(host.take_invocations().is_empty());
}

#[test]
fn failed_engine_construction_registers_nothing() {
    let host = FakeHost::new();
    let mut controller = LifecycleController::new(host.clone(), StubEngineFactory::default());

    let err = controller.init(&BridgeConfig::default()).unwrap_err();
    assert!(matches!(err, BridgeError::Initialization(_)));
    assert_eq!(controller.state(), SessionState::Uninitialized);
    assert!(host.log.lock().is_empty());

    controller.init(&valid_config()).expect("retry with credentials");
    assert_eq!(controller.state(), SessionState::Active);
}

#[test]
fn host_registration_failure_rolls_back_earlier_registrations() {
    let host = FakeHost::new();
    *host.refuse_tick.lock() = true;
    let (factory, trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    let err = controller.init(&valid_config()).unwrap_err();
    assert!(matches!(err, BridgeError::Registration { .. }));
    assert_eq!(controller.state(), SessionState::Uninitialized);
    assert!(host.is_empty());
    assert!(!trigger.is_subscribed());
    for stale in host.ever_registered.lock().iter() {
        assert!(!stale.is_live());
    }
}

#[test]
fn init_while_active_is_reported_and_ignored() {
    let host = FakeHost::new();
    let (factory, _trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);

    controller.init(&valid_config()).expect("init");
    let err = controller.init(&valid_config()).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::InvalidTransition {
            operation: "init",
            state: SessionState::Active,
        }
    ));
    assert_eq!(controller.state(), SessionState::Active);
    assert_eq!(host.globals.lock().len(), 2);
    assert_eq!(host.ticks.lock().len(), 1);
}

#[test]
fn one_failing_callback_does_not_block_the_rest() {
    let host = FakeHost::new();
    *host.fail_argument.lock() = Some("second".into());
    let (factory, trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);
    controller.init(&valid_config()).expect("init");

    for text in ["first", "second", "third"] {
        trigger.emit(EngineNotification::Recognized {
            reason: ResultReason::RecognizedSpeech,
            text: text.into(),
        });
    }
    host.tick();

    assert_eq!(
        host.take_invocations(),
        vec![
            invocation("onSpeech", &["first"]),
            invocation("onSpeech", &["second"]),
            invocation("onSpeech", &["third"]),
        ]
    );
    let diagnostics = controller.diagnostics_snapshot();
    assert_eq!(diagnostics.events_delivered, 2);
    assert_eq!(diagnostics.dispatch_failures, 1);
    assert_eq!(controller.state(), SessionState::Active);
}

#[test]
fn cleanup_discards_undelivered_events() {
    let host = FakeHost::new();
    let (factory, trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);
    controller.init(&valid_config()).expect("init");

    trigger.emit(EngineNotification::SpeechStartDetected);
    trigger.emit(EngineNotification::SessionStopped);
    assert_eq!(controller.pending_events(), 2);

    controller.cleanup().expect("cleanup");
    // Engine threads that fire after teardown reach nobody.
    assert!(!trigger.emit(EngineNotification::SessionStarted));

    host.tick();
    assert!(host.take_invocations().is_empty());
    assert_eq!(controller.diagnostics_snapshot().events_discarded, 2);
    assert_eq!(controller.pending_events(), 0);
}

#[test]
fn refused_unregistration_leaks_instead_of_freeing() {
    let host = FakeHost::new();
    *host.refuse_unregister.lock() = Some(START_LISTENING.into());
    let (factory, _trigger) = stub_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);
    controller.init(&valid_config()).expect("init");

    let err = controller.cleanup().unwrap_err();
    assert!(matches!(err, BridgeError::Registration { ref name, .. } if name == START_LISTENING));
    assert_eq!(controller.state(), SessionState::Uninitialized);

    // The host still holds StartListening; calling it must be harmless.
    let kept = host.globals.lock().get(START_LISTENING).cloned().expect("still registered");
    assert!(kept.is_live());
    kept.invoke().expect("leaked entry point is callable");
    assert_eq!(controller.pending_events(), 0);
    assert_eq!(controller.diagnostics_snapshot().events_enqueued, 0);
}

#[test]
fn leaked_tick_after_refused_removal_delivers_nothing() {
    let host = FakeHost::new();
    *host.refuse_tick_removal.lock() = true;
    let (factory, sink) = lingering_factory();
    let mut controller = LifecycleController::new(host.clone(), factory);
    controller.init(&valid_config()).expect("init");

    let err = controller.cleanup().unwrap_err();
    assert!(matches!(err, BridgeError::Registration { .. }));
    assert_eq!(host.ticks.lock().len(), 1, "host kept the tick callback");

    // An engine callback that was already running when we unsubscribed.
    let late = sink.lock().clone().expect("engine kept its sink");
    (*late)(EngineNotification::Recognized {
        reason: ResultReason::RecognizedSpeech,
        text: "late".into(),
    });

    host.tick();
    assert!(host.take_invocations().is_empty());
    assert_eq!(controller.diagnostics_snapshot().events_discarded, 1);
}

#[test]
fn relay_route_and_announcing_engine_end_to_end() {
    let host = FakeHost::new();
    let mut controller =
        LifecycleController::new(host.clone(), StubEngineFactory::new("lights on"));
    let config = BridgeConfig {
        relay_function: Some("__callback".into()),
        ..valid_config()
    };
    controller.init(&config).expect("init");

    host.call_global(START_LISTENING).expect("start");
    wait_for_pending(&controller, 4, Duration::from_secs(2));
    host.tick();

    assert_eq!(
        host.take_invocations(),
        vec![
            invocation("__callback", &["onSpeechSessionStarted", ""]),
            invocation("__callback", &["onSpeechStartDetected", ""]),
            invocation("__callback", &["onSpeech", "lights on"]),
            invocation("__callback", &["onSpeechEndDetected", ""]),
        ]
    );

    host.call_global(STOP_LISTENING).expect("stop");
    wait_for_pending(&controller, 1, Duration::from_secs(2));
    host.tick();
    assert_eq!(
        host.take_invocations(),
        vec![invocation("__callback", &["onSpeechSessionStopped", ""])]
    );
}

#[test]
fn dropping_an_active_controller_unregisters_everything() {
    let host = FakeHost::new();
    let (factory, trigger) = stub_factory();
    {
        let mut controller = LifecycleController::new(host.clone(), factory);
        controller.init(&valid_config()).expect("init");
    }
    assert!(host.is_empty());
    assert!(!trigger.is_subscribed());
}

#[test]
fn independent_controllers_do_not_share_state() {
    let first_host = FakeHost::new();
    let second_host = FakeHost::new();
    let (first_factory, first_trigger) = stub_factory();
    let (second_factory, _second_trigger) = stub_factory();
    let mut first = LifecycleController::new(first_host.clone(), first_factory);
    let mut second = LifecycleController::new(second_host.clone(), second_factory);
    first.init(&valid_config()).expect("init first");
    second.init(&valid_config()).expect("init second");

    first_trigger.emit(EngineNotification::SessionStarted);
    first_host.tick();
    second_host.tick();

    assert_eq!(first_host.take_invocations().len(), 1);
    assert!(second_host.take_invocations().is_empty());
}
