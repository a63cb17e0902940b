//! 子进程监管模块
//!
//! Launches the external tools a check needs, either as one foreground
//! command or as a producer→consumer pipeline, and guarantees every spawned
//! process is stopped before the supervisor call returns.

use anyhow::Error;
use log::{debug, error, info, warn};
use nix::sys::signal::Signal;
use std::io;
use std::process::{ChildStdout, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::check::Verdict;
use crate::context::CheckScope;
use crate::coordinator::POLL_INTERVAL;

mod command;
mod process;

pub use command::{CommandSpec, Redirect};
pub use process::{ManagedProcess, StageReport, shutdown_all};

/// When a supervised run ends besides cancellation and the check deadline,
/// which always apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunUntil {
    /// Until every stage exits.
    Exit,
    /// Fixed wall-clock window.
    Elapsed(Duration),
    /// Until the executor closes the check's live window.
    WindowClosed,
    /// Whichever of the live window and the duration ends first.
    WindowOrElapsed(Duration),
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed(Vec<StageReport>),
    /// Nothing was left running; the reason names the offending program.
    SpawnFailed(String),
    Interrupted(Vec<StageReport>),
    /// The check deadline passed before the stages finished.
    TimedOut(Vec<StageReport>),
}

impl PipelineOutcome {
    pub fn stages(&self) -> &[StageReport] {
        match self {
            PipelineOutcome::Completed(stages)
            | PipelineOutcome::Interrupted(stages)
            | PipelineOutcome::TimedOut(stages) => stages,
            PipelineOutcome::SpawnFailed(_) => &[],
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            PipelineOutcome::SpawnFailed(reason) => Verdict::fail(reason.clone()),
            PipelineOutcome::Interrupted(_) => Verdict::Interrupted,
            PipelineOutcome::TimedOut(_) => Verdict::fail("timed out"),
            PipelineOutcome::Completed(stages) => {
                if let Some(stage) = stages.iter().find(|s| s.force_killed) {
                    warn!("{} had to be force-killed during shutdown", stage.program);
                    return Verdict::fail("timed out");
                }
                match stages.iter().find_map(StageReport::failure) {
                    Some(reason) => Verdict::Fail(reason),
                    None => Verdict::Pass,
                }
            }
        }
    }
}

enum Stop {
    Exited,
    ConsumerExited,
    Window,
    Cancelled,
    Deadline,
}

pub struct Supervisor<'a> {
    scope: &'a CheckScope,
}

impl<'a> Supervisor<'a> {
    pub fn new(scope: &'a CheckScope) -> Self {
        Self { scope }
    }

    /// Runs a single command.
    pub fn run(&self, command: CommandSpec, until: RunUntil) -> PipelineOutcome {
        self.run_pipeline(&[command], false, until)
    }

    /// Runs `stages`; with `chained` each stage's stdout feeds the next
    /// stage's stdin.
    pub fn run_pipeline(&self, stages: &[CommandSpec], chained: bool, until: RunUntil) -> PipelineOutcome {
        let check_id = self.scope.check_id();
        if stages.is_empty() {
            return PipelineOutcome::Completed(Vec::new());
        }

        for stage in stages {
            if self.scope.probe().find_program(&stage.program).is_none() {
                warn!("[{check_id}] {}: command not found", stage.program);
                return PipelineOutcome::SpawnFailed(format!("{}: command not found", stage.program));
            }
        }
        if self.scope.is_cancelled() {
            return PipelineOutcome::Interrupted(Vec::new());
        }

        let mut procs = match self.spawn_all(stages, chained) {
            Ok(procs) => procs,
            Err(reason) => return PipelineOutcome::SpawnFailed(reason),
        };

        let stop = self.watch(&mut procs, chained, until);
        match stop {
            Stop::Exited => debug!("[{check_id}] all stages exited"),
            Stop::ConsumerExited => info!("[{check_id}] consumer exited, stopping producers"),
            Stop::Window => info!("[{check_id}] window ended, stopping stages"),
            Stop::Cancelled => info!("[{check_id}] cancelled, stopping stages"),
            Stop::Deadline => warn!("[{check_id}] check deadline reached, stopping stages"),
        }
        shutdown_all(&mut procs);
        let mut reports: Vec<StageReport> = procs.into_iter().map(ManagedProcess::finish).collect();
        if chained {
            mark_broken_pipes(&mut reports);
        }

        match stop {
            Stop::Cancelled => PipelineOutcome::Interrupted(reports),
            Stop::Deadline => PipelineOutcome::TimedOut(reports),
            Stop::Exited | Stop::ConsumerExited | Stop::Window => PipelineOutcome::Completed(reports),
        }
    }

    // Producer first; its stdout handle becomes the consumer's stdin.
    fn spawn_all(&self, stages: &[CommandSpec], chained: bool) -> Result<Vec<ManagedProcess>, String> {
        let check_id = self.scope.check_id();
        let table = self.scope.run().coordinator().processes();
        let grace = self.scope.run().grace_period();
        let mut procs: Vec<ManagedProcess> = Vec::with_capacity(stages.len());
        let mut upstream: Option<ChildStdout> = None;

        for (index, stage) in stages.iter().enumerate() {
            let pipe_stdout = chained && index + 1 < stages.len();
            let stdin = upstream.take().map_or_else(Stdio::null, Stdio::from);
            debug!("[{check_id}] starting stage {index}: {}", stage.display());
            match ManagedProcess::spawn(stage, stdin, pipe_stdout, check_id, table, grace) {
                Ok(mut proc) => {
                    if pipe_stdout {
                        upstream = proc.take_stdout();
                    }
                    procs.push(proc);
                }
                Err(e) => {
                    error!("{e:#}");
                    shutdown_all(&mut procs);
                    return Err(spawn_failure_reason(&stage.program, &e));
                }
            }
        }
        Ok(procs)
    }

    fn watch(&self, procs: &mut [ManagedProcess], chained: bool, until: RunUntil) -> Stop {
        let started = Instant::now();
        loop {
            if self.scope.is_cancelled() {
                return Stop::Cancelled;
            }
            if self.scope.deadline_passed() {
                return Stop::Deadline;
            }
            let window_over = match until {
                RunUntil::Exit => false,
                RunUntil::Elapsed(limit) => started.elapsed() >= limit,
                RunUntil::WindowClosed => self.scope.is_window_closed(),
                RunUntil::WindowOrElapsed(limit) => {
                    self.scope.is_window_closed() || started.elapsed() >= limit
                }
            };
            if window_over {
                return Stop::Window;
            }

            for proc in procs.iter_mut() {
                proc.poll();
            }
            if procs.iter().all(|p| !p.is_running()) {
                return Stop::Exited;
            }
            if chained && procs.last().is_some_and(|p| !p.is_running()) {
                return Stop::ConsumerExited;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

// Producers writing into an exited consumer die of SIGPIPE; that is not
// their failure.
fn mark_broken_pipes(reports: &mut [StageReport]) {
    let Some((consumer, producers)) = reports.split_last_mut() else {
        return;
    };
    if consumer.exit_code.is_none() && consumer.signal.is_none() {
        return;
    }
    for producer in producers {
        if producer.signal == Some(Signal::SIGPIPE as i32) {
            producer.downstream_closed = true;
        }
    }
}

fn spawn_failure_reason(program: &str, error: &Error) -> String {
    match error.root_cause().downcast_ref::<io::Error>() {
        Some(io_error) if io_error.kind() == io::ErrorKind::NotFound => {
            format!("{program}: command not found")
        }
        Some(io_error) => format!("{program}: failed to start: {io_error}"),
        None => format!("{program}: failed to start: {error:#}"),
    }
}
