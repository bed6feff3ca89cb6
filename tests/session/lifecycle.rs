use crate::common::{
    attached_session, debugger_env, MockBreakpoint, MockDomain, MockStepper, MockThread, TEST_PID,
};
use mdbg::debugger::event::DebugEvent;
use mdbg::debugger::Error;
use nix::unistd::Pid;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_attach_establishes_session_silently() {
    let (debugger, fixtures) = attached_session();

    assert!(debugger.is_attached());
    assert_eq!(fixtures.engines.lock().unwrap().len(), 1);
    assert!(fixtures.engine(0).initialized.load(Ordering::SeqCst));
    assert!(fixtures.engine(0).sink.lock().unwrap().is_some());
    // attaching produces no protocol output
    assert!(fixtures.lines().is_empty());
}

#[test]
fn test_attach_fails_when_runtime_module_is_missing() {
    let (mut debugger, fixtures) = debugger_env();
    fixtures.flags.fail_locate.store(true, Ordering::SeqCst);

    let err = debugger.attach(Pid::from_raw(TEST_PID)).unwrap_err();
    assert!(matches!(err, Error::RuntimeNotFound { .. }));
    // identification failed before any engine negotiation
    assert!(fixtures.engines.lock().unwrap().is_empty());
    assert!(!debugger.is_attached());
}

#[test]
fn test_attach_fails_on_version_negotiation() {
    let (mut debugger, fixtures) = debugger_env();
    fixtures.flags.fail_version.store(true, Ordering::SeqCst);

    let err = debugger.attach(Pid::from_raw(TEST_PID)).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert!(fixtures.engines.lock().unwrap().is_empty());
}

#[test]
fn test_attach_failure_tears_half_built_engine_down() {
    let cases: [fn(&crate::common::Fixtures); 3] = [
        |fx| fx.flags.fail_initialize.store(true, Ordering::SeqCst),
        |fx| fx.flags.fail_set_sink.store(true, Ordering::SeqCst),
        |fx| fx.flags.fail_attach.store(true, Ordering::SeqCst),
    ];
    for set_flag in cases {
        let (mut debugger, fixtures) = debugger_env();
        set_flag(&fixtures);

        let err = debugger.attach(Pid::from_raw(TEST_PID)).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert!(!debugger.is_attached());
        assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_detach_disables_engine_state_and_releases_session() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();

    let domain = Arc::new(MockDomain::default());
    let brkpt = Arc::new(MockBreakpoint::default());
    *brkpt.active.lock().unwrap() = true;
    let stepper = Arc::new(MockStepper::default());
    stepper.active.store(true, Ordering::SeqCst);
    domain.brkpts.lock().unwrap().push(brkpt.clone());
    domain.steppers.lock().unwrap().push(stepper.clone());
    fixtures.process.domain_list.lock().unwrap().push(domain);

    debugger.detach().unwrap();

    assert_eq!(fixtures.process.stopped.load(Ordering::SeqCst), 1);
    assert!(!*brkpt.active.lock().unwrap());
    assert!(!stepper.active.load(Ordering::SeqCst));
    assert_eq!(fixtures.breakpoints.cleared.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.process.detach_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.modules.dropped.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 1);
    assert!(!debugger.context().process().is_occupied());
    assert!(!debugger.is_attached());

    let err = debugger.detach().unwrap_err();
    assert!(matches!(err, Error::NoSession));
}

#[test]
fn test_detach_skips_engine_cleanup_when_stop_fails() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();
    fixtures.process.fail_stop.store(true, Ordering::SeqCst);

    debugger.detach().unwrap();

    assert_eq!(fixtures.process.detach_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixtures.breakpoints.cleared.load(Ordering::SeqCst), 0);
    // cached module state and the engine handle are still released
    assert_eq!(fixtures.modules.dropped.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 1);
    assert!(!debugger.is_attached());
}

#[test]
fn test_terminate_rendezvous_with_exit_notification() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();
    fixtures.exit_on_terminate();

    debugger.terminate().unwrap();

    assert_eq!(fixtures.process.terminate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.breakpoints.cleared.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.modules.dropped.load(Ordering::SeqCst), 1);
    assert!(!debugger.context().process().is_occupied());
    assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 1);
    assert!(!debugger.is_attached());
    assert_eq!(
        fixtures.lines(),
        vec!["*stopped,reason=\"exited\",exit-code=\"0\""]
    );

    let err = debugger.terminate().unwrap_err();
    assert!(matches!(err, Error::NoSession));
}

#[test]
fn test_terminate_blocks_until_late_exit_notification() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();

    let sink = fixtures.sink();
    let exit_sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sink.dispatch(DebugEvent::ProcessExited { exit_code: 0 });
    });

    // blocks until the notification thread observed the exit
    debugger.terminate().unwrap();

    exit_sender.join().unwrap();
    assert!(!debugger.context().process().is_occupied());
    assert!(!debugger.is_attached());
}

#[test]
fn test_wait_for_exit_unblocks_on_exit_notification() {
    let (debugger, fixtures) = attached_session();
    fixtures.start_process();

    let sink = fixtures.sink();
    let exit_sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sink.dispatch(DebugEvent::ProcessExited { exit_code: 0 });
    });

    debugger.wait_for_exit();
    exit_sender.join().unwrap();
}

#[test]
fn test_reattach_fails_while_debugee_is_alive() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();

    let err = debugger.attach(Pid::from_raw(TEST_PID + 1)).unwrap_err();
    assert!(matches!(err, Error::AlreadyAttached));
    assert!(debugger.is_attached());
    assert_eq!(fixtures.engines.lock().unwrap().len(), 1);
    assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reattach_starts_with_no_stop_marker() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();

    fixtures.sink().dispatch(DebugEvent::BreakpointHit {
        domain: Arc::new(MockDomain::default()),
        thread: Arc::new(MockThread::new(42)),
    });
    assert_eq!(debugger.last_stopped_thread(), Some(42));

    fixtures
        .sink()
        .dispatch(DebugEvent::ProcessExited { exit_code: 0 });
    debugger.attach(Pid::from_raw(TEST_PID + 1)).unwrap();

    // the marker belongs to the previous session
    assert_eq!(debugger.last_stopped_thread(), None);
}

#[test]
fn test_reattach_supersedes_stale_session() {
    let (mut debugger, fixtures) = attached_session();
    fixtures.start_process();
    fixtures
        .sink()
        .dispatch(DebugEvent::ProcessExited { exit_code: 0 });

    // the debugee is gone but the stale handles are still held
    assert!(debugger.is_attached());

    debugger.attach(Pid::from_raw(TEST_PID + 1)).unwrap();

    assert!(debugger.is_attached());
    assert_eq!(fixtures.engines.lock().unwrap().len(), 2);
    // the stale session was forcefully terminated and torn down
    assert_eq!(fixtures.process.terminate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.engine(0).shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(fixtures.engine(1).shutdowns.load(Ordering::SeqCst), 0);
}
