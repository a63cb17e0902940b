// File: markdown_report.rs
// Description: 报告输出模块，将一次运行的结果写成 JSON 与 Markdown 总结。

use anyhow::{Context, Result};
use log::info;
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::aggregator::RunReport;
use crate::check::CheckOutcome;
use crate::utils::format_duration;

/// Paths written by [`write_reports`].
#[derive(Debug, Clone)]
pub struct WrittenReports {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut markdown = String::new();
    markdown.push_str(&format!("# 测试结果总结: {}\n\n", report.registry));
    markdown.push_str(&format!(
        "- 开始: {}\n- 结束: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.finished_at.format("%Y-%m-%d %H:%M:%S")
    ));
    if report.incomplete {
        markdown.push_str("- **INCOMPLETE**: 运行被取消或提前停止\n");
    }
    markdown.push('\n');

    markdown.push_str("| 测试项 | 结果 | 原因 | 耗时 |\n|---|---|---|---|\n");
    for entry in &report.entries {
        let (result, reason) = match &entry.outcome {
            CheckOutcome::Passed => ("通过", String::new()),
            CheckOutcome::Failed { reason } => ("失败", escape_cell(reason)),
            CheckOutcome::CrashedWithError { message } => ("崩溃", escape_cell(message)),
            CheckOutcome::Interrupted => ("中断", String::new()),
        };
        markdown.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            entry.name,
            result,
            reason,
            format_duration(entry.duration())
        ));
    }
    for name in &report.not_run {
        markdown.push_str(&format!("| {name} | 未运行 |  |  |\n"));
    }

    let counts = &report.counts;
    markdown.push_str(&format!(
        "\n通过 {}，失败 {}（崩溃 {}），中断 {}，未运行 {}\n",
        counts.passed, counts.failed, counts.crashed, counts.interrupted, counts.not_run
    ));
    markdown
}

/// Writes `run_<registry>_<ts>.json` and `summary_<registry>_<ts>.md`.
pub fn write_reports(report: &RunReport, dir: &Path) -> Result<WrittenReports> {
    fs::create_dir_all(dir).with_context(|| format!("无法创建报告目录: {}", dir.display()))?;
    let stamp = report.started_at.format("%Y%m%d_%H%M%S");

    let json = dir.join(format!("run_{}_{stamp}.json", report.registry));
    let contents = serde_json::to_string_pretty(report)?;
    let mut file = File::create(&json).with_context(|| format!("无法写入 {}", json.display()))?;
    file.write_all(contents.as_bytes())?;

    let markdown = dir.join(format!("summary_{}_{stamp}.md", report.registry));
    let mut file =
        File::create(&markdown).with_context(|| format!("无法写入 {}", markdown.display()))?;
    file.write_all(generate_markdown_report(report).as_bytes())?;

    info!("报告已写入 {} 和 {}", json.display(), markdown.display());
    Ok(WrittenReports { json, markdown })
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::check::{CheckDefinition, Verdict};
    use chrono::Local;
    use std::time::Duration;

    fn sample() -> RunReport {
        let mut agg = Aggregator::new("quick-us", Local::now());
        let ok = CheckDefinition::new("run_screen_rgb", "Screen RGB Test", |_| Ok(Verdict::Pass));
        let bad = CheckDefinition::new("run_key_board", "Keyboard Test", |_| Ok(Verdict::Pass));
        agg.record(&ok, CheckOutcome::Passed, Duration::from_millis(1500));
        agg.record(
            &bad,
            CheckOutcome::Failed {
                reason: "a | b".into(),
            },
            Duration::ZERO,
        );
        agg.mark_not_run("Electricity Power Test");
        agg.summarize()
    }

    #[test]
    fn markdown_lists_every_check() {
        let markdown = generate_markdown_report(&sample());
        assert!(markdown.contains("| Screen RGB Test | 通过 |"));
        assert!(markdown.contains("a \\| b"));
        assert!(markdown.contains("| Electricity Power Test | 未运行 |"));
        assert!(markdown.contains("INCOMPLETE"));
    }

    #[test]
    fn writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample();
        let written = write_reports(&report, &dir.path().join("reports")).unwrap();
        let parsed: RunReport =
            serde_json::from_str(&fs::read_to_string(&written.json).unwrap()).unwrap();
        assert_eq!(parsed.entries, report.entries);
        assert!(written.markdown.exists());
    }
}
