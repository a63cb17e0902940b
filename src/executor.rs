//! 检查执行器
//!
//! Runs one [`CheckDefinition`] and always comes back with exactly one
//! [`CheckOutcome`]: errors and panics inside a check body are contained
//! here and never reach the sequencing loop.

use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crate::check::{CheckDefinition, CheckFn, CheckOutcome, Verdict};
use crate::context::{CheckScope, RunContext};
use crate::presentation::{CheckStatus, PresentationAdapter};

/// Slice of operator-input waiting between worker and cancellation polls.
pub const INPUT_POLL: Duration = Duration::from_millis(100);

pub struct Executor<'a> {
    adapter: &'a mut dyn PresentationAdapter,
}

impl<'a> Executor<'a> {
    pub fn new(adapter: &'a mut dyn PresentationAdapter) -> Self {
        Self { adapter }
    }

    pub fn execute(&mut self, check: &CheckDefinition, ctx: &RunContext) -> CheckOutcome {
        if ctx.is_cancelled() {
            debug!("[{}] run already cancelled, not starting", check.id);
            return CheckOutcome::Interrupted;
        }

        info!("[{}] starting {}", check.id, check.name);
        let scope = ctx.scope(&check.id);
        match check.live_window {
            Some(window) => self.execute_live(check, scope, window),
            None => invoke(check, &*check.body(), &scope),
        }
    }

    // The body runs on one worker that reports through a single send; the
    // control thread owns the window and the operator prompt.
    fn execute_live(&mut self, check: &CheckDefinition, scope: CheckScope, window: Duration) -> CheckOutcome {
        let (tx, rx) = mpsc::channel();
        let worker_check = check.clone();
        let worker_scope = scope.clone();
        let spawned = thread::Builder::new()
            .name(format!("check-{}", check.id))
            .spawn(move || {
                let body = worker_check.body();
                let outcome = invoke(&worker_check, &*body, &worker_scope);
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            error!("[{}] failed to start worker: {e}", check.id);
            return CheckOutcome::CrashedWithError {
                message: format!("failed to start worker: {e}"),
            };
        }

        self.adapter.on_progress(&check.name, &CheckStatus::Waiting { window });
        let ctx = scope.run();
        let window_end = Instant::now() + window;
        let mut early = None;
        while Instant::now() < window_end && !ctx.is_cancelled() {
            match rx.try_recv() {
                Ok(outcome) => {
                    early = Some(outcome);
                    break;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            let slice = INPUT_POLL.min(window_end.saturating_duration_since(Instant::now()));
            if self.adapter.request_user_continue(slice) {
                info!("[{}] operator continued", check.id);
                break;
            }
        }
        scope.close_window();

        if let Some(outcome) = early {
            return outcome;
        }
        match rx.recv_timeout(ctx.worker_join()) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Disconnected) => CheckOutcome::CrashedWithError {
                message: "worker exited without reporting".to_string(),
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "[{}] worker did not finish within {}s, stopping its processes",
                    check.id,
                    ctx.worker_join().as_secs()
                );
                ctx.coordinator().terminate_check(&check.id, ctx.grace_period());
                // 线程无法强制结束, 只能放弃; 它之后的结果会被丢弃
                warn!(
                    "[{}] abandoning worker thread, it may still be running in the background",
                    check.id
                );
                CheckOutcome::Failed {
                    reason: "timed out".to_string(),
                }
            }
        }
    }
}

fn invoke(check: &CheckDefinition, body: &CheckFn, scope: &CheckScope) -> CheckOutcome {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(scope))) {
        Ok(Ok(verdict)) => normalize(check, verdict),
        Ok(Err(e)) => {
            error!("[{}] check body failed: {e:#}", check.id);
            CheckOutcome::CrashedWithError {
                message: format!("{e:#}"),
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("[{}] check body panicked: {message}", check.id);
            CheckOutcome::CrashedWithError { message }
        }
    };
    info!("[{}] {}", check.id, outcome);
    outcome
}

fn normalize(check: &CheckDefinition, verdict: Verdict) -> CheckOutcome {
    match verdict {
        Verdict::Pass => CheckOutcome::Passed,
        Verdict::Fail(reason) => CheckOutcome::Failed { reason },
        Verdict::Interrupted if check.cancelable => CheckOutcome::Interrupted,
        Verdict::Interrupted => CheckOutcome::CrashedWithError {
            message: "check reported an interruption but is not cancelable".to_string(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with non-string payload".to_string()
    }
}
