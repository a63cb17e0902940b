//! 终端交互层
//!
//! The harness core talks to the operator only through
//! [`PresentationAdapter`]; [`TerminalAdapter`] is the stdin/stdout version.

use log::debug;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::aggregator::RunReport;
use crate::check::CheckOutcome;

/// Progress events emitted while a run is sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Starting { index: usize, total: usize },
    /// A live check is running; the operator may continue within `window`.
    Waiting { window: Duration },
    Finished(CheckOutcome),
    /// Skipped because an earlier check stopped the run.
    NotRun,
}

#[cfg_attr(test, mockall::automock)]
pub trait PresentationAdapter {
    fn on_progress(&mut self, name: &str, status: &CheckStatus);

    fn on_run_complete(&mut self, report: &RunReport);

    /// Waits up to `timeout` for the operator; `true` means continue now.
    fn request_user_continue(&mut self, timeout: Duration) -> bool;
}

/// Stdout rendering plus one stdin reader thread shared by the menu and
/// the live-window prompts.
pub struct TerminalAdapter {
    lines: Receiver<String>,
    eof: bool,
}

impl Default for TerminalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalAdapter {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("stdin closed");
            });
        // Without a reader the channel is already disconnected, i.e. EOF.
        if let Err(e) = spawned {
            debug!("failed to start stdin reader: {e}");
        }
        Self { lines: rx, eof: false }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Prints `prompt` and blocks for one line; `None` on EOF.
    pub fn read_line(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = io::stdout().flush();
        if self.eof {
            return None;
        }
        match self.lines.recv() {
            Ok(line) => Some(line.trim().to_string()),
            Err(_) => {
                self.eof = true;
                println!();
                None
            }
        }
    }

    pub fn say(&self, text: &str) {
        println!("{text}");
    }
}

impl PresentationAdapter for TerminalAdapter {
    fn on_progress(&mut self, name: &str, status: &CheckStatus) {
        match status {
            CheckStatus::Starting { index, total } => {
                println!("\n[{}/{total}] Running {name}...", index + 1);
            }
            CheckStatus::Waiting { window } => {
                println!(
                    "{name} is running. Press Enter to continue (auto-continue in {}s)...",
                    window.as_secs()
                );
            }
            CheckStatus::Finished(outcome) => println!("{name}: {outcome}"),
            CheckStatus::NotRun => println!("{name}: NOT RUN"),
        }
        let _ = io::stdout().flush();
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        println!("\n{}", report.render_text());
        let _ = io::stdout().flush();
    }

    fn request_user_continue(&mut self, timeout: Duration) -> bool {
        let started = Instant::now();
        if !self.eof {
            match self.lines.recv_timeout(timeout) {
                Ok(_) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => self.eof = true,
            }
        }
        // Nobody can answer; let the window run out.
        thread::sleep(timeout.saturating_sub(started.elapsed()));
        false
    }
}
