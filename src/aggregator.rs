//! 结果汇总模块
//!
//! Collects per-check outcomes in run order and derives the run report.
//! Written only by the control thread.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use crate::check::{CheckDefinition, CheckOutcome};
use crate::result_line::{self, LineStatus};
use crate::utils::format_duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub id: String,
    pub outcome: CheckOutcome,
    pub result_line: String,
    pub duration_ms: u64,
}

impl ReportEntry {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub passed: usize,
    /// Includes crashed checks.
    pub failed: usize,
    pub crashed: usize,
    pub interrupted: usize,
    pub not_run: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub registry: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub entries: Vec<ReportEntry>,
    /// Checks never started because the run stopped early.
    pub not_run: Vec<String>,
    pub counts: RunCounts,
    pub all_passed: bool,
    /// Cancelled or stopped before every check finished.
    pub incomplete: bool,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcome_of(&self, id: &str) -> Option<&CheckOutcome> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.outcome)
    }

    /// Operator-facing summary; entries are classified from their result
    /// lines so the text agrees with anything scraping the log.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        if self.incomplete {
            let _ = writeln!(out, "Test Summary: {} (INCOMPLETE)", self.registry);
        } else {
            let _ = writeln!(out, "Test Summary: {}", self.registry);
        }
        let _ = writeln!(out, "{rule}");

        for entry in &self.entries {
            let elapsed = format_duration(entry.duration());
            match result_line::classify_for(&entry.id, &entry.result_line) {
                LineStatus::Failed(reason) => {
                    let _ = writeln!(out, "  {}: FAILED - {reason} ({elapsed})", entry.name);
                }
                status => {
                    let _ = writeln!(out, "  {}: {} ({elapsed})", entry.name, status.label());
                }
            }
        }
        for name in &self.not_run {
            let _ = writeln!(out, "  {name}: NOT RUN");
        }

        let counts = &self.counts;
        let _ = writeln!(
            out,
            "\nTotal: {} passed, {} failed ({} crashed), {} interrupted, {} not run",
            counts.passed, counts.failed, counts.crashed, counts.interrupted, counts.not_run
        );
        if self.incomplete {
            let _ = writeln!(out, "Run INCOMPLETE: results above do not cover the whole registry.");
        } else if self.all_passed {
            let _ = writeln!(out, "All tests completed successfully!");
        }

        let _ = writeln!(out, "\nIndividual Test Results:");
        for entry in &self.entries {
            let _ = writeln!(out, "  {}", entry.result_line);
        }
        out
    }
}

pub struct Aggregator {
    registry: String,
    started_at: DateTime<Local>,
    last_record: Option<DateTime<Local>>,
    entries: Vec<ReportEntry>,
    not_run: Vec<String>,
    cancelled: bool,
}

impl Aggregator {
    pub fn new(registry: impl Into<String>, started_at: DateTime<Local>) -> Self {
        Self {
            registry: registry.into(),
            started_at,
            last_record: None,
            entries: Vec::new(),
            not_run: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, check: &CheckDefinition, outcome: CheckOutcome, duration: Duration) {
        let result_line = outcome.result_line(&check.id);
        self.entries.push(ReportEntry {
            name: check.name.clone(),
            id: check.id.clone(),
            outcome,
            result_line,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        });
        self.last_record = Some(Local::now());
    }

    pub fn mark_not_run(&mut self, name: impl Into<String>) {
        self.not_run.push(name.into());
    }

    /// The run was cancelled; every rendering says INCOMPLETE.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn summarize(&self) -> RunReport {
        let mut counts = RunCounts {
            total: self.entries.len(),
            not_run: self.not_run.len(),
            ..RunCounts::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                CheckOutcome::Passed => counts.passed += 1,
                CheckOutcome::Failed { .. } => counts.failed += 1,
                CheckOutcome::CrashedWithError { .. } => {
                    counts.failed += 1;
                    counts.crashed += 1;
                }
                CheckOutcome::Interrupted => counts.interrupted += 1,
            }
        }

        let incomplete = self.cancelled || counts.interrupted > 0 || !self.not_run.is_empty();
        RunReport {
            registry: self.registry.clone(),
            started_at: self.started_at,
            finished_at: self.last_record.unwrap_or(self.started_at),
            entries: self.entries.clone(),
            not_run: self.not_run.clone(),
            counts,
            all_passed: !incomplete && counts.passed == counts.total,
            incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Verdict;

    fn check(id: &str, name: &str) -> CheckDefinition {
        CheckDefinition::new(id, name, |_| Ok(Verdict::Pass))
    }

    #[test]
    fn counts_follow_outcomes() {
        let mut agg = Aggregator::new("full-us", Local::now());
        agg.record(&check("run_a", "A"), CheckOutcome::Passed, Duration::from_millis(10));
        agg.record(
            &check("run_b", "B"),
            CheckOutcome::Failed {
                reason: "exit code 1".into(),
            },
            Duration::from_millis(20),
        );
        agg.record(
            &check("run_c", "C"),
            CheckOutcome::CrashedWithError {
                message: "boom".into(),
            },
            Duration::ZERO,
        );
        let report = agg.summarize();
        assert_eq!(report.len(), 3);
        assert_eq!(report.counts.passed, 1);
        assert_eq!(report.counts.failed, 2);
        assert_eq!(report.counts.crashed, 1);
        assert!(!report.all_passed);
        assert!(!report.incomplete);
        assert_eq!(report.entries[1].result_line, "run_b____NO: exit code 1");
    }

    #[test]
    fn summarize_is_idempotent() {
        let mut agg = Aggregator::new("quick-us", Local::now());
        agg.record(&check("run_a", "A"), CheckOutcome::Passed, Duration::from_secs(1));
        let first = agg.summarize();
        let second = agg.summarize();
        assert_eq!(first, second);
        assert_eq!(first.render_text(), second.render_text());
    }

    #[test]
    fn cancelled_and_skipped_runs_are_incomplete() {
        let mut agg = Aggregator::new("quick-uk", Local::now());
        agg.record(&check("run_a", "A"), CheckOutcome::Passed, Duration::ZERO);
        agg.mark_not_run("B");
        let report = agg.summarize();
        assert!(report.incomplete);
        assert!(!report.all_passed);
        assert_eq!(report.counts.not_run, 1);
        let text = report.render_text();
        assert!(text.contains("INCOMPLETE"));
        assert!(text.contains("B: NOT RUN"));

        let mut cancelled = Aggregator::new("soak", Local::now());
        cancelled.mark_cancelled();
        assert!(cancelled.summarize().incomplete);
    }

    #[test]
    fn text_summary_shows_failure_reasons() {
        let mut agg = Aggregator::new("full-us", Local::now());
        agg.record(
            &check("run_camera", "Camera Test"),
            CheckOutcome::Failed {
                reason: "ffmpeg: command not found".into(),
            },
            Duration::ZERO,
        );
        let text = agg.summarize().render_text();
        assert!(text.contains("Camera Test: FAILED - ffmpeg: command not found"));
        assert!(text.contains("run_camera____NO: ffmpeg: command not found"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut agg = Aggregator::new("full-us", Local::now());
        agg.record(&check("run_a", "A"), CheckOutcome::Passed, Duration::from_millis(5));
        let json = serde_json::to_value(agg.summarize()).unwrap();
        assert_eq!(json["registry"], "full-us");
        assert_eq!(json["entries"][0]["outcome"]["status"], "passed");
        assert_eq!(json["all_passed"], true);
    }

    #[test]
    fn foreign_result_line_is_not_trusted() {
        let mut agg = Aggregator::new("full-us", Local::now());
        agg.record(&check("run_a", "A"), CheckOutcome::Passed, Duration::ZERO);
        let mut report = agg.summarize();
        // 手工修改过的报告: 结果行属于另一个检查
        report.entries[0].result_line = "run_b____YES".to_string();
        let text = report.render_text();
        assert!(text.contains("A: UNKNOWN"));
        assert!(!text.contains("A: PASSED"));
    }
}
