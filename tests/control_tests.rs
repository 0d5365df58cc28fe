//! Integration tests for validated process control.
//!
//! A fake probe supplies start times and a recording sender captures the
//! signals that would have been delivered.

use ahash::AHashMap as HashMap;
use herakles_live_monitor::process::{ProcessProbe, SignalSender};
use herakles_live_monitor::{
    ControlAction, ControlError, ControlOutcome, ControlToken, ProcessController,
};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeProbe {
    start_times: HashMap<u32, f64>,
}

impl FakeProbe {
    fn with(pid: u32, start_time: f64) -> Self {
        let mut probe = Self::default();
        probe.start_times.insert(pid, start_time);
        probe
    }
}

impl ProcessProbe for FakeProbe {
    fn start_time(&self, pid: u32) -> Option<f64> {
        self.start_times.get(&pid).copied()
    }
}

#[derive(Clone, Default)]
struct RecordingSender {
    sent: Arc<Mutex<Vec<(i32, Signal)>>>,
    fail_with: Option<Errno>,
}

impl RecordingSender {
    fn failing(errno: Errno) -> Self {
        Self {
            fail_with: Some(errno),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(i32, Signal)> {
        self.sent.lock().unwrap().clone()
    }
}

impl SignalSender for RecordingSender {
    fn send(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        self.sent.lock().unwrap().push((pid, signal));
        match self.fail_with {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}

// -------------------------------------------------------------------------
// Successful requests
// -------------------------------------------------------------------------

#[test]
fn test_matching_start_time_sends_signal() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::with(4242, 1_700_000_000.0), sender.clone());

    let outcome = controller
        .terminate(ControlToken::new(4242, Some(1_700_000_000.2)))
        .unwrap();

    assert_eq!(outcome, ControlOutcome::Signaled);
    assert_eq!(sender.sent(), vec![(4242, Signal::SIGTERM)]);
}

#[test]
fn test_each_action_maps_to_its_signal() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::with(7, 10.0), sender.clone());
    let token = ControlToken::new(7, Some(10.0));

    controller.terminate(token).unwrap();
    controller.force_kill(token).unwrap();
    controller.suspend(token).unwrap();
    controller.resume(token).unwrap();

    let signals: Vec<Signal> = sender.sent().into_iter().map(|(_, s)| s).collect();
    assert_eq!(
        signals,
        vec![
            Signal::SIGTERM,
            Signal::SIGKILL,
            Signal::SIGSTOP,
            Signal::SIGCONT
        ]
    );
}

#[test]
fn test_missing_expected_start_time_skips_check() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::with(99, 123.0), sender.clone());

    let outcome = controller
        .apply(ControlToken::new(99, None), ControlAction::Suspend)
        .unwrap();
    assert_eq!(outcome, ControlOutcome::Signaled);
    assert_eq!(sender.sent().len(), 1);
}

// -------------------------------------------------------------------------
// Rejected requests
// -------------------------------------------------------------------------

#[test]
fn test_reused_pid_is_never_signalled() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::with(4242, 1_700_000_900.0), sender.clone());

    let err = controller
        .force_kill(ControlToken::new(4242, Some(1_700_000_000.0)))
        .unwrap_err();

    assert_eq!(
        err,
        ControlError::ProcessChanged {
            pid: 4242,
            expected: 1_700_000_000.0,
            actual: 1_700_000_900.0,
        }
    );
    assert!(sender.sent().is_empty());
}

#[test]
fn test_tolerance_boundary() {
    let sender = RecordingSender::default();
    let controller =
        ProcessController::with_tolerance(FakeProbe::with(5, 100.0), sender.clone(), 0.5);

    assert!(controller
        .terminate(ControlToken::new(5, Some(100.5)))
        .is_ok());
    assert!(matches!(
        controller.terminate(ControlToken::new(5, Some(100.6))),
        Err(ControlError::ProcessChanged { .. })
    ));
    assert_eq!(sender.sent().len(), 1);
}

#[test]
fn test_nan_expected_start_time_never_matches() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::with(5, 100.0), sender.clone());

    let result = controller.terminate(ControlToken::new(5, Some(f64::NAN)));
    assert!(matches!(result, Err(ControlError::ProcessChanged { .. })));
    assert!(sender.sent().is_empty());
}

#[test]
fn test_unknown_pid_is_not_found() {
    let sender = RecordingSender::default();
    let controller = ProcessController::new(FakeProbe::default(), sender.clone());

    assert_eq!(
        controller.terminate(ControlToken::new(31337, Some(1.0))),
        Err(ControlError::ProcessNotFound { pid: 31337 })
    );
    assert!(sender.sent().is_empty());
}

#[test]
fn test_invalid_targets_rejected_before_probe() {
    let sender = RecordingSender::default();
    let mut probe = FakeProbe::with(0, 0.0);
    probe.start_times.insert(u32::MAX, 0.0);
    let controller = ProcessController::new(probe, sender.clone());

    assert_eq!(
        controller.terminate(ControlToken::new(0, None)),
        Err(ControlError::InvalidTarget { pid: 0 })
    );
    assert_eq!(
        controller.terminate(ControlToken::new(u32::MAX, None)),
        Err(ControlError::InvalidTarget { pid: u32::MAX })
    );
    assert!(sender.sent().is_empty());
}

// -------------------------------------------------------------------------
// OS failures
// -------------------------------------------------------------------------

#[test]
fn test_exit_race_reports_already_exited() {
    let sender = RecordingSender::failing(Errno::ESRCH);
    let controller = ProcessController::new(FakeProbe::with(8, 1.0), sender);

    assert_eq!(
        controller.terminate(ControlToken::new(8, Some(1.0))),
        Ok(ControlOutcome::AlreadyExited)
    );
}

#[test]
fn test_permission_denied() {
    let sender = RecordingSender::failing(Errno::EPERM);
    let controller = ProcessController::new(FakeProbe::with(1, 1.0), sender);

    assert_eq!(
        controller.force_kill(ControlToken::new(1, Some(1.0))),
        Err(ControlError::PermissionDenied { pid: 1 })
    );
}

#[test]
fn test_other_errno_is_reported() {
    let sender = RecordingSender::failing(Errno::EINVAL);
    let controller = ProcessController::new(FakeProbe::with(3, 1.0), sender);

    assert_eq!(
        controller.suspend(ControlToken::new(3, Some(1.0))),
        Err(ControlError::Os {
            pid: 3,
            errno: Errno::EINVAL as i32
        })
    );
}
