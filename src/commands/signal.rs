//! Signal command implementation.

use anyhow::{bail, Result};
use herakles_live_monitor::process::{KillSender, ProcfsSource};
use herakles_live_monitor::{ControlAction, ControlOutcome, ControlToken, ProcessController};

use crate::config::Config;

/// Sends `action` to `pid` after validating its start time.
pub fn command_signal(
    config: &Config,
    pid: u32,
    action: ControlAction,
    start_time: Option<f64>,
) -> Result<()> {
    let monitor_config = config.monitor_config();
    let source = ProcfsSource::new(&monitor_config.proc_root);

    if start_time.is_none() {
        match source.start_time(pid) {
            Some(current) => eprintln!(
                "⚠️  No --start-time given; pid {} currently started at {:.2}",
                pid, current
            ),
            None => eprintln!("⚠️  No --start-time given"),
        }
    }

    let controller = ProcessController::with_tolerance(
        source,
        KillSender,
        monitor_config.start_time_tolerance,
    );

    match controller.apply(ControlToken::new(pid, start_time), action) {
        Ok(ControlOutcome::Signaled) => {
            println!("✅ Sent {} ({}) to pid {}", action, action.signal(), pid);
            Ok(())
        }
        Ok(ControlOutcome::AlreadyExited) => {
            println!("ℹ️  pid {} exited before {} was delivered", pid, action);
            Ok(())
        }
        Err(e) => bail!("{} refused: {}", action, e),
    }
}
