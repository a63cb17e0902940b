//! 取消与超时协调器
//!
//! A run-scoped cooperative cancel token plus the table of processes spawned
//! during the run. Interrupt handlers, UI actions and worker threads only
//! flip the flag; process teardown happens on the control path through
//! [`Coordinator::terminate_all`].

use log::{debug, info, warn};
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long a cancellation can go unnoticed by a waiter.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A process registered with the run so cancellation can reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    pub program: String,
    pub check_id: String,
}

/// Pid-keyed table of live processes, shared between the supervisor that
/// owns each child and the coordinator that may need to stop it.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    inner: Arc<Mutex<HashMap<u32, TrackedProcess>>>,
}

impl ProcessTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, TrackedProcess>> {
        // A poisoned table still holds valid pids.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, pid: u32, process: TrackedProcess) {
        debug!("跟踪进程 pid={pid} program={} check={}", process.program, process.check_id);
        self.lock().insert(pid, process);
    }

    pub fn unregister(&self, pid: u32) {
        self.lock().remove(&pid);
    }

    pub fn pids(&self) -> Vec<u32> {
        self.lock().keys().copied().collect()
    }

    pub fn pids_for(&self, check_id: &str) -> Vec<u32> {
        self.lock()
            .iter()
            .filter(|(_, p)| p.check_id == check_id)
            .map(|(pid, _)| *pid)
            .collect()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains_key(&pid)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Cancellation/timeout coordinator for one run.
///
/// Cloning shares the same flag; a new run must build a new coordinator.
#[derive(Debug, Clone)]
pub struct Coordinator {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    processes: ProcessTable,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            processes: ProcessTable::default(),
        }
    }

    /// A coordinator whose flag trips by itself once `timeout` has elapsed.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            ..Self::new()
        }
    }

    /// Idempotent; safe from signal-handler threads, UI actions and workers.
    pub fn request_cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                if !self.cancelled.swap(true, Ordering::SeqCst) {
                    warn!("Run timeout reached, cancelling remaining work");
                }
                true
            }
            _ => false,
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` when the wait ended because of cancellation.
    pub fn wait_or_cancelled(&self, duration: Duration) -> bool {
        let end = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= end {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(end - now));
        }
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    /// Stops every process tracked for this run.
    pub fn terminate_all(&self, grace: Duration) {
        let pids = self.processes.pids();
        self.terminate_pids(&pids, grace);
    }

    /// Stops the processes a single check left behind.
    pub fn terminate_check(&self, check_id: &str, grace: Duration) {
        let pids = self.processes.pids_for(check_id);
        self.terminate_pids(&pids, grace);
    }

    // SIGTERM, wait for the owners to reap, then SIGKILL whatever is left.
    fn terminate_pids(&self, pids: &[u32], grace: Duration) {
        if pids.is_empty() {
            return;
        }
        for pid in pids {
            info!("sending SIGTERM to pid {pid}");
            send_signal(*pid, Signal::SIGTERM);
        }

        let end = Instant::now() + grace;
        while Instant::now() < end && pids.iter().any(|pid| self.processes.contains(*pid)) {
            thread::sleep(POLL_INTERVAL);
        }

        for pid in pids.iter().filter(|pid| self.processes.contains(**pid)) {
            warn!(
                "pid {pid} still running after {}ms grace period, sending SIGKILL",
                grace.as_millis()
            );
            send_signal(*pid, Signal::SIGKILL);
            self.processes.unregister(*pid);
        }
    }
}

/// The coordinator of the run in progress, if any.
///
/// Owned by `main` and shared with the interrupt handler, which is the only
/// way the handler reaches a run.
#[derive(Debug, Clone, Default)]
pub struct RunSlot {
    active: Arc<Mutex<Option<Coordinator>>>,
}

impl RunSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Coordinator>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn install(&self, coordinator: Coordinator) {
        *self.lock() = Some(coordinator);
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    /// Cancels the active run; `false` when nothing is running.
    pub fn cancel_active(&self) -> bool {
        match self.lock().as_ref() {
            Some(coordinator) => {
                coordinator.request_cancel();
                true
            }
            None => false,
        }
    }
}

/// Signals the process group led by `pid` (every supervised child leads its
/// own group), falling back to the single process.
pub(crate) fn send_signal(pid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        warn!("pid {pid} out of range, cannot send {signal}");
        return;
    };
    let target = Pid::from_raw(raw);
    if killpg(target, signal).is_err() {
        if let Err(e) = kill(target, signal) {
            debug!("failed to send {signal} to pid {pid}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_sticky() {
        let coordinator = Coordinator::new();
        assert!(!coordinator.is_cancelled());
        coordinator.request_cancel();
        coordinator.request_cancel();
        assert!(coordinator.is_cancelled());
        assert!(coordinator.clone().is_cancelled());
    }

    #[test]
    fn wait_returns_early_on_cancel() {
        let coordinator = Coordinator::new();
        let remote = coordinator.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            remote.request_cancel();
        });
        let started = Instant::now();
        assert!(coordinator.wait_or_cancelled(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
    }

    #[test]
    fn wait_runs_full_duration_without_cancel() {
        let coordinator = Coordinator::new();
        let started = Instant::now();
        assert!(!coordinator.wait_or_cancelled(Duration::from_millis(150)));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn run_deadline_trips_the_same_flag() {
        let coordinator = Coordinator::with_timeout(Some(Duration::from_millis(100)));
        assert!(!coordinator.is_cancelled());
        assert!(coordinator.wait_or_cancelled(Duration::from_secs(5)));
        assert!(coordinator.is_cancelled());
    }

    #[test]
    fn slot_only_cancels_an_installed_run() {
        let slot = RunSlot::default();
        assert!(!slot.cancel_active());
        let coordinator = Coordinator::new();
        slot.install(coordinator.clone());
        assert!(slot.cancel_active());
        assert!(coordinator.is_cancelled());
        slot.clear();
        assert!(!slot.cancel_active());
    }

    #[test]
    fn process_table_filters_by_check() {
        let table = ProcessTable::default();
        let tracked = |check: &str| TrackedProcess {
            program: "sleep".into(),
            check_id: check.into(),
        };
        table.register(10, tracked("run_camera"));
        table.register(11, tracked("run_camera"));
        table.register(12, tracked("run_recording_playback"));
        let mut camera = table.pids_for("run_camera");
        camera.sort();
        assert_eq!(camera, vec![10, 11]);
        table.unregister(10);
        assert!(!table.contains(10));
        assert_eq!(table.pids().len(), 2);
    }
}
