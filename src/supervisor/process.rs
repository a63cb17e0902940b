//! Supervised child processes.
//!
//! A [`ManagedProcess`] is registered with the run's process table for as
//! long as it is alive and is stopped with the SIGTERM → grace → SIGKILL
//! protocol when its owner is done with it, including from `Drop`.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use nix::sys::signal::Signal;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::coordinator::{POLL_INTERVAL, ProcessTable, TrackedProcess, send_signal};
use crate::supervisor::command::{CommandSpec, Redirect, open_redirect};

/// What happened to one pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub program: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// The supervisor asked the stage to stop.
    pub stopped_by_supervisor: bool,
    /// The stage ignored SIGTERM for the whole grace period.
    pub force_killed: bool,
    /// A producer that died of SIGPIPE after its consumer went away.
    pub downstream_closed: bool,
    pub stdout: String,
    pub stderr: String,
}

impl StageReport {
    /// Failure reason for a stage that ended on its own.
    pub fn failure(&self) -> Option<String> {
        if self.stopped_by_supervisor || self.downstream_closed {
            return None;
        }
        match (self.exit_code, self.signal) {
            (Some(0), _) => None,
            (Some(code), _) => Some(format!("exit code {code}")),
            (None, Some(signal)) => Some(format!("terminated by signal {signal}")),
            (None, None) => Some("exit status unknown".to_string()),
        }
    }
}

pub struct ManagedProcess {
    program: String,
    check_id: String,
    pid: u32,
    child: Child,
    table: ProcessTable,
    grace: Duration,
    status: Option<ExitStatus>,
    lost: bool,
    stopped_by_supervisor: bool,
    force_killed: bool,
    stdout_reader: Option<JoinHandle<String>>,
    stderr_reader: Option<JoinHandle<String>>,
}

impl ManagedProcess {
    /// Spawns `spec` in its own process group.
    ///
    /// With `pipe_stdout` the stdout redirect is replaced by a pipe the
    /// caller collects through [`ManagedProcess::take_stdout`].
    pub fn spawn(
        spec: &CommandSpec,
        stdin: Stdio,
        pipe_stdout: bool,
        check_id: &str,
        table: &ProcessTable,
        grace: Duration,
    ) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(stdin).process_group(0);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        if pipe_stdout {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(open_redirect(&spec.stdout)?);
        }
        cmd.stderr(open_redirect(&spec.stderr)?);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("[{check_id}] failed to spawn: {}", spec.display()))?;
        let pid = child.id();
        info!("[{check_id}] spawned {} (pid={pid})", spec.program);
        table.register(
            pid,
            TrackedProcess {
                program: spec.program.clone(),
                check_id: check_id.to_string(),
            },
        );

        let stdout_reader = match (&spec.stdout, pipe_stdout) {
            (Redirect::Capture, false) => child
                .stdout
                .take()
                .map(|out| spawn_reader(out, &spec.program, spec.echo)),
            _ => None,
        };
        let stderr_reader = match spec.stderr {
            Redirect::Capture => child
                .stderr
                .take()
                .map(|err| spawn_reader(err, &spec.program, spec.echo)),
            _ => None,
        };

        Ok(Self {
            program: spec.program.clone(),
            check_id: check_id.to_string(),
            pid,
            child,
            table: table.clone(),
            grace,
            status: None,
            lost: false,
            stopped_by_supervisor: false,
            force_killed: false,
            stdout_reader,
            stderr_reader,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn is_running(&self) -> bool {
        self.status.is_none() && !self.lost
    }

    /// Non-blocking status check; reaps the child once it has exited.
    pub fn poll(&mut self) -> Option<ExitStatus> {
        if !self.is_running() {
            return self.status;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => self.mark_exited(status),
            Ok(None) => {}
            Err(e) => {
                warn!("[{}] failed to poll {}: {e}", self.check_id, self.program);
                self.lost = true;
                self.table.unregister(self.pid);
            }
        }
        self.status
    }

    /// Marks the stage as stopped by us and sends SIGTERM.
    pub fn request_stop(&mut self) {
        if self.poll().is_some() || self.lost {
            return;
        }
        self.stopped_by_supervisor = true;
        info!("[{}] sending SIGTERM to {} (pid={})", self.check_id, self.program, self.pid);
        send_signal(self.pid, Signal::SIGTERM);
    }

    /// SIGKILLs a stage that outlived its grace period and reaps it.
    pub fn force_kill(&mut self) {
        if self.poll().is_some() || self.lost {
            return;
        }
        warn!(
            "[{}] {} still running after {}ms grace period, sending SIGKILL",
            self.check_id,
            self.program,
            self.grace.as_millis()
        );
        self.stopped_by_supervisor = true;
        self.force_killed = true;
        send_signal(self.pid, Signal::SIGKILL);
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => self.mark_exited(status),
            Err(e) => {
                warn!("[{}] failed to reap {}: {e}", self.check_id, self.program);
                self.lost = true;
                self.table.unregister(self.pid);
            }
        }
    }

    /// Full termination protocol for this stage alone.
    pub fn terminate(&mut self) {
        shutdown_all(std::slice::from_mut(self));
    }

    /// Reaps the child and collects captured output.
    pub fn finish(mut self) -> StageReport {
        if self.is_running() {
            self.terminate();
        }
        let stdout = join_reader(self.stdout_reader.take());
        let stderr = join_reader(self.stderr_reader.take());
        StageReport {
            program: self.program.clone(),
            exit_code: self.status.and_then(|s| s.code()),
            signal: self.status.and_then(|s| s.signal()),
            stopped_by_supervisor: self.stopped_by_supervisor,
            force_killed: self.force_killed,
            downstream_closed: false,
            stdout,
            stderr,
        }
    }

    fn mark_exited(&mut self, status: ExitStatus) {
        debug!("[{}] {} exited with {status}", self.check_id, self.program);
        self.status = Some(status);
        self.table.unregister(self.pid);
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("[{}] {} dropped while running", self.check_id, self.program);
            self.terminate();
        }
    }
}

/// SIGTERM every running stage, wait up to the longest grace period for all
/// of them, then SIGKILL stragglers.
pub fn shutdown_all(processes: &mut [ManagedProcess]) {
    for proc in processes.iter_mut() {
        proc.request_stop();
    }

    let grace = processes.iter().map(|p| p.grace).max().unwrap_or_default();
    let end = Instant::now() + grace;
    loop {
        let mut running = false;
        for proc in processes.iter_mut() {
            running |= proc.poll().is_none() && !proc.lost;
        }
        if !running || Instant::now() >= end {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    for proc in processes.iter_mut() {
        proc.force_kill();
    }
}

fn spawn_reader<R>(stream: R, program: &str, echo: bool) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    let program = program.to_string();
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut collected = String::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    if echo {
                        info!("[{program}] {}", text.trim_end());
                    }
                    collected.push_str(&text);
                }
                Err(e) => {
                    debug!("[{program}] output stream closed: {e}");
                    break;
                }
            }
        }
        collected
    })
}

fn join_reader(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(spec: &CommandSpec, table: &ProcessTable) -> ManagedProcess {
        ManagedProcess::spawn(spec, Stdio::null(), false, "run_test", table, Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn captures_output_and_unregisters_on_exit() {
        let table = ProcessTable::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]);
        let mut proc = spawn(&spec, &table);
        assert!(table.contains(proc.pid()));
        while proc.poll().is_none() {
            thread::sleep(POLL_INTERVAL);
        }
        assert!(table.is_empty());
        let report = proc.finish();
        assert_eq!(report.stdout, "hello\n");
        assert_eq!(report.stderr, "oops\n");
        assert_eq!(report.exit_code, Some(3));
        assert_eq!(report.failure().as_deref(), Some("exit code 3"));
    }

    #[test]
    fn terminate_stops_a_sleeper_gracefully() {
        let table = ProcessTable::default();
        let mut proc = spawn(&CommandSpec::new("sleep").arg("60"), &table);
        let started = Instant::now();
        proc.terminate();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!proc.is_running());
        let report = proc.finish();
        assert!(report.stopped_by_supervisor);
        assert!(!report.force_killed);
        assert_eq!(report.failure(), None);
        assert!(table.is_empty());
    }

    #[test]
    fn terminate_force_kills_when_sigterm_is_ignored() {
        let table = ProcessTable::default();
        let spec = CommandSpec::new("sh").args(["-c", "trap '' TERM; sleep 60"]);
        let mut proc = spawn(&spec, &table);
        thread::sleep(Duration::from_millis(100));
        proc.terminate();
        let report = proc.finish();
        assert!(report.force_killed);
        assert!(table.is_empty());
    }

    #[test]
    fn drop_terminates_running_child() {
        let table = ProcessTable::default();
        let proc = spawn(&CommandSpec::new("sleep").arg("60"), &table);
        assert!(!table.is_empty());
        drop(proc);
        assert!(table.is_empty());
    }
}
