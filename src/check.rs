//! 检查定义与结果
//!
//! A check is a named diagnostic of one hardware subsystem. Its body returns
//! a [`Verdict`]; the executor turns that into exactly one [`CheckOutcome`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::CheckScope;
use crate::utils::RESULT_SEPARATOR;

/// What a check body reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    /// The body observed cancellation and stopped cooperatively.
    Interrupted,
}

impl Verdict {
    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail(reason.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::fail("check reported failure")
        }
    }
}

/// Terminal state of one executed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed { reason: String },
    Interrupted,
    CrashedWithError { message: String },
}

impl CheckOutcome {
    /// `Failed` and `CrashedWithError` both count as failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CheckOutcome::Failed { .. } | CheckOutcome::CrashedWithError { .. }
        )
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }

    /// Renders the legacy `<id>____YES` / `<id>____NO: <reason>` line.
    pub fn result_line(&self, check_id: &str) -> String {
        match self {
            CheckOutcome::Passed => format!("{check_id}{RESULT_SEPARATOR}YES"),
            CheckOutcome::Failed { reason } => format!("{check_id}{RESULT_SEPARATOR}NO: {reason}"),
            CheckOutcome::CrashedWithError { message } => {
                format!("{check_id}{RESULT_SEPARATOR}NO: {message}")
            }
            CheckOutcome::Interrupted => format!("{check_id}{RESULT_SEPARATOR}INTERRUPTED"),
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Passed => write!(f, "PASSED"),
            CheckOutcome::Failed { reason } => write!(f, "FAILED - {reason}"),
            CheckOutcome::Interrupted => write!(f, "INTERRUPTED"),
            CheckOutcome::CrashedWithError { message } => write!(f, "CRASHED - {message}"),
        }
    }
}

pub type CheckFn = dyn Fn(&CheckScope) -> Result<Verdict> + Send + Sync;

/// One registry entry. Immutable once built.
#[derive(Clone)]
pub struct CheckDefinition {
    /// Result-line prefix, e.g. `run_key_board`.
    pub id: String,
    /// Display name, e.g. `Keyboard Detection`.
    pub name: String,
    /// Whether the body polls the cancel token and may report `Interrupted`.
    pub cancelable: bool,
    /// Runs the body on a worker while the operator gets this long to continue.
    pub live_window: Option<Duration>,
    run: Arc<CheckFn>,
}

impl CheckDefinition {
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&CheckScope) -> Result<Verdict> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            cancelable: false,
            live_window: None,
            run: Arc::new(run),
        }
    }

    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    /// Marks the check as live; live checks are always cancelable.
    pub fn live(mut self, window: Duration) -> Self {
        self.live_window = Some(window);
        self.cancelable = true;
        self
    }

    pub fn body(&self) -> Arc<CheckFn> {
        Arc::clone(&self.run)
    }
}

impl fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cancelable", &self.cancelable)
            .field("live_window", &self.live_window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_lines_follow_the_legacy_protocol() {
        assert_eq!(CheckOutcome::Passed.result_line("run_key_board"), "run_key_board____YES");
        let failed = CheckOutcome::Failed {
            reason: "Exit code 1".into(),
        };
        assert_eq!(failed.result_line("run_key_board"), "run_key_board____NO: Exit code 1");
        assert_eq!(
            CheckOutcome::Interrupted.result_line("run_camera"),
            "run_camera____INTERRUPTED"
        );
    }

    #[test]
    fn bool_verdicts_normalize() {
        assert_eq!(Verdict::from(true), Verdict::Pass);
        assert!(matches!(Verdict::from(false), Verdict::Fail(_)));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_string(&CheckOutcome::Failed {
            reason: "exit code 2".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"failed","reason":"exit code 2"}"#);
    }
}
