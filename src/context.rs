//! 运行上下文
//!
//! [`RunContext`] lives for one "run all" invocation and is shared by the
//! control thread and check workers. [`CheckScope`] is the per-check view a
//! check body receives.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::coordinator::Coordinator;
use crate::probe::{HostProbe, SystemProbe};
use crate::supervisor::Supervisor;

#[derive(Clone)]
pub struct RunContext {
    coordinator: Coordinator,
    started_at: DateTime<Local>,
    check_timeout: Option<Duration>,
    grace_period: Duration,
    worker_join: Duration,
    probe: Arc<dyn SystemProbe>,
}

impl RunContext {
    pub fn new(coordinator: Coordinator, probe: Arc<dyn SystemProbe>) -> Self {
        Self {
            coordinator,
            started_at: Local::now(),
            check_timeout: None,
            grace_period: Duration::from_secs(2),
            worker_join: Duration::from_secs(10),
            probe,
        }
    }

    /// Fresh context for a run on the real host, timed from `config`.
    pub fn from_config(config: &HarnessConfig, coordinator: Coordinator) -> Self {
        Self::new(coordinator, Arc::new(HostProbe))
            .with_check_timeout(config.timeouts.check)
            .with_grace_period(config.timeouts.grace_period)
            .with_worker_join(config.timeouts.worker_join)
    }

    pub fn with_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_worker_join(mut self, join: Duration) -> Self {
        self.worker_join = join;
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn is_cancelled(&self) -> bool {
        self.coordinator.is_cancelled()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn worker_join(&self) -> Duration {
        self.worker_join
    }

    pub fn probe(&self) -> &dyn SystemProbe {
        self.probe.as_ref()
    }

    /// Opens the scope a check body runs in; the check deadline starts now.
    pub fn scope(&self, check_id: &str) -> CheckScope {
        CheckScope {
            check_id: check_id.to_string(),
            run: self.clone(),
            deadline: self.check_timeout.map(|t| Instant::now() + t),
            window_closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// What a check body sees of the run.
#[derive(Clone)]
pub struct CheckScope {
    check_id: String,
    run: RunContext,
    deadline: Option<Instant>,
    window_closed: Arc<AtomicBool>,
}

impl CheckScope {
    pub fn check_id(&self) -> &str {
        &self.check_id
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn probe(&self) -> &dyn SystemProbe {
        self.run.probe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }

    /// See [`Coordinator::wait_or_cancelled`].
    pub fn wait_or_cancelled(&self, duration: Duration) -> bool {
        self.run.coordinator().wait_or_cancelled(duration)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Ends the live window; open-ended pipelines wind down normally.
    pub fn close_window(&self) {
        self.window_closed.store(true, Ordering::SeqCst);
    }

    pub fn is_window_closed(&self) -> bool {
        self.window_closed.load(Ordering::SeqCst)
    }

    pub fn supervisor(&self) -> Supervisor<'_> {
        Supervisor::new(self)
    }
}
