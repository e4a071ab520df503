//! The Nautilus boot procedure, end to end, against a fake console

mod common;

use common::{fake_session, fake_session_with, FakeOptions};
use solboot::{
    keys, run_session, BootError, BootScript, BootState, CancellationToken, ExpectError, ExpectRule,
    Pattern, SessionBuilder, Verdict, EXIT_BOOT_FAILED, EXIT_BOOT_TIMEOUT, EXIT_ERROR,
    EXIT_INTERRUPTED,
};
use std::time::Duration;
use tokio::time::Instant;

/// A healthy boot up to GRUB's countdown line.
const TO_MENU: &[(u64, &str)] = &[
    (2, "[SOL Session operational.  Use ~? for help]\r\n"),
    (10, "UEFI PXE: Booting from NIC1\r\n"),
    (15, "  Ubuntu\r\n  Advanced options\r\n*Nautilus\r\n"),
    (16, "The highlighted entry will be executed automatically in 5s."),
];

fn schedule(tail: &[(u64, &'static str)]) -> Vec<(u64, &'static str)> {
    TO_MENU.iter().chain(tail.iter()).copied().collect()
}

#[tokio::test(start_paused = true)]
async fn test_boot_reaches_shell() {
    let (session, console) = fake_session(SessionBuilder::new());
    console.emit_at(&schedule(&[(40, "nautilus: root-shell ready\r\n")]));

    let report = run_session(session, &BootScript::nautilus()).await;

    let outcome = report.outcome.as_ref().expect("boot should succeed");
    assert_eq!(outcome.state, BootState::AwaitOutcome);
    assert_eq!(outcome.label.as_deref(), Some("shell"));
    assert!(report.succeeded());
    assert!(report.teardown_error.is_none());
    assert_eq!(report.exit_code(), 0);

    let mut expected = vec![keys::CURSOR_DOWN.to_vec(); 7];
    expected.extend(vec![keys::ENTER.to_vec(); 3]);
    expected.push(keys::NEWLINE.to_vec());
    expected.push(keys::SOL_QUIT.to_vec());
    assert_eq!(console.writes(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_keys_start_after_countdown() {
    let (session, console) = fake_session(SessionBuilder::new());
    let start = Instant::now();
    console.emit_at(&schedule(&[(40, "root-shell")]));

    run_session(session, &BootScript::nautilus()).await;

    let writes = console.timed_writes();
    assert!(writes[0].0 - start >= Duration::from_secs(16));
    for pair in writes[..10].windows(2) {
        assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_firmware_never_boots() {
    let (session, console) = fake_session(SessionBuilder::new());
    console.emit_at(&[(2, "SOL Session operational\r\n"), (30, "PXE-E53: No boot filename received\r\n")]);

    let start = Instant::now();
    let report = run_session(session, &BootScript::nautilus()).await;

    match &report.outcome {
        Err(BootError::Timeout { state, deadline }) => {
            assert_eq!(*state, BootState::AwaitFirmwareBoot);
            assert_eq!(*deadline, Duration::from_secs(120));
        }
        other => panic!("expected firmware timeout, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_secs(122));
    assert_eq!(report.exit_code(), EXIT_BOOT_TIMEOUT);
    assert_eq!(console.count(keys::CURSOR_DOWN), 0);
    assert_eq!(console.quit_count(), 1);
    assert!(console.exited());
}

#[tokio::test(start_paused = true)]
async fn test_session_never_ready() {
    let (session, console) = fake_session(SessionBuilder::new());

    let start = Instant::now();
    let report = run_session(session, &BootScript::nautilus()).await;

    assert!(matches!(
        report.outcome,
        Err(BootError::Timeout {
            state: BootState::AwaitSessionReady,
            ..
        })
    ));
    assert!(start.elapsed() >= Duration::from_secs(15));
    assert!(start.elapsed() < Duration::from_secs(20));
    assert_eq!(console.quit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unhandled_exception() {
    let (session, console) = fake_session(SessionBuilder::new());
    console.emit_at(&schedule(&[(40, "*** UNHANDLED EXCEPTION: page fault ***\r\n")]));

    let report = run_session(session, &BootScript::nautilus()).await;

    match &report.outcome {
        Err(BootError::Failed { state, label, matched }) => {
            assert_eq!(*state, BootState::AwaitOutcome);
            assert_eq!(label, "unhandled exception");
            assert_eq!(matched, "UNHANDLED EXCEPTION");
        }
        other => panic!("expected boot failure, got {:?}", other),
    }
    assert_eq!(report.exit_code(), EXIT_BOOT_FAILED);
    assert_eq!(console.quit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_while_waiting_for_shell() {
    let cancel = CancellationToken::new();
    let (session, console) = fake_session(SessionBuilder::new().cancel_token(cancel.clone()));
    console.emit_at(&schedule(&[]));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(100)).await;
        cancel.cancel();
    });

    let report = run_session(session, &BootScript::nautilus()).await;

    assert!(matches!(
        report.outcome,
        Err(BootError::Interrupted {
            state: BootState::AwaitOutcome
        })
    ));
    assert!(report.exit_status.is_some());
    assert_eq!(report.exit_code(), EXIT_INTERRUPTED);
    assert_eq!(console.quit_count(), 1);
    assert!(!console.killed());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_while_navigating() {
    let cancel = CancellationToken::new();
    let (session, console) = fake_session(SessionBuilder::new().cancel_token(cancel.clone()));
    console.emit_at(&schedule(&[]));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(18_500)).await;
        cancel.cancel();
    });

    let report = run_session(session, &BootScript::nautilus()).await;

    assert!(matches!(
        report.outcome,
        Err(BootError::Interrupted {
            state: BootState::NavigateMenu
        })
    ));
    assert_eq!(console.count(keys::CURSOR_DOWN), 3);
    assert_eq!(console.count(keys::ENTER), 0);
    assert_eq!(console.quit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_console_closes_mid_boot() {
    let (session, mut console) = fake_session(SessionBuilder::new());
    console.emit("SOL Session operational\r\n").await;
    console.close_output();

    let report = run_session(session, &BootScript::nautilus()).await;

    match &report.outcome {
        Err(BootError::Session { state, source }) => {
            assert_eq!(*state, BootState::AwaitFirmwareBoot);
            assert!(matches!(source, ExpectError::StreamClosed));
        }
        other => panic!("expected closed stream, got {:?}", other),
    }
    assert_eq!(report.exit_code(), EXIT_ERROR);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_failure_keeps_outcome() {
    let options = FakeOptions {
        broken_input: true,
        ..FakeOptions::default()
    };
    let (session, console) =
        fake_session_with(SessionBuilder::new().exit_timeout(Duration::from_secs(2)), options);

    let report = run_session(session, &BootScript::nautilus()).await;

    assert!(matches!(
        report.outcome,
        Err(BootError::Timeout {
            state: BootState::AwaitSessionReady,
            ..
        })
    ));
    assert!(matches!(
        report.teardown_error,
        Some(ExpectError::ExitTimeout { .. })
    ));
    assert!(report.exit_status.is_none());
    assert_eq!(report.exit_code(), EXIT_BOOT_TIMEOUT);
    assert!(console.killed());
}

#[tokio::test(start_paused = true)]
async fn test_custom_down_presses() {
    let (session, console) = fake_session(SessionBuilder::new());
    console.emit_at(&schedule(&[(40, "root-shell")]));

    let report = run_session(session, &BootScript::nautilus_with_down_presses(2)).await;

    assert!(report.succeeded());
    assert_eq!(console.count(keys::CURSOR_DOWN), 2);
}

#[tokio::test(start_paused = true)]
async fn test_script_without_verdict_runs_to_end() {
    let (session, console) = fake_session(SessionBuilder::new());
    console.emit_at(&[(1, "login: ")]);

    let script = BootScript::new()
        .expect(
            BootState::AwaitMenuBanner,
            ExpectRule::new()
                .candidate("login", Pattern::exact("login:"), Verdict::Continue)
                .deadline(Duration::from_secs(5)),
        )
        .wait(BootState::AwaitMenuReady, Duration::from_secs(2))
        .send(BootState::ConfirmSelection, "root", 1, Duration::ZERO);

    let report = run_session(session, &script).await;

    let outcome = report.outcome.as_ref().expect("script should finish");
    assert_eq!(outcome.state, BootState::ConfirmSelection);
    assert!(outcome.label.is_none());
    assert_eq!(console.writes()[0], b"root".to_vec());
}
