//! 结果行解析
//!
//! Parses the `<check_id>____YES` / `<check_id>____NO: <reason>` lines
//! that the harness prints and that downstream tooling greps for.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::RESULT_SEPARATOR;

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?P<id>\S+?)____(?P<tag>YES|NO|INTERRUPTED)(?::\s?(?P<rest>.*))?$")
        .expect("result line pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    Passed,
    /// Text after `____NO: `, kept verbatim.
    Failed(String),
    Interrupted,
    Unrecognized,
}

impl LineStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LineStatus::Passed => "PASSED",
            LineStatus::Failed(_) => "FAILED",
            LineStatus::Interrupted => "INTERRUPTED",
            LineStatus::Unrecognized => "UNKNOWN",
        }
    }
}

/// Classifies a result line by substring, `____NO` taking precedence.
pub fn classify(line: &str) -> LineStatus {
    let no = format!("{RESULT_SEPARATOR}NO");
    let yes = format!("{RESULT_SEPARATOR}YES");
    let interrupted = format!("{RESULT_SEPARATOR}INTERRUPTED");

    if let Some(pos) = line.find(&no) {
        let rest = &line[pos + no.len()..];
        let reason = rest.strip_prefix(": ").or_else(|| rest.strip_prefix(':')).unwrap_or(rest);
        LineStatus::Failed(reason.to_string())
    } else if line.contains(&yes) {
        LineStatus::Passed
    } else if line.contains(&interrupted) {
        LineStatus::Interrupted
    } else {
        LineStatus::Unrecognized
    }
}

/// Check id of a well-formed result line.
pub fn check_id(line: &str) -> Option<&str> {
    RESULT_LINE
        .captures(line)
        .and_then(|caps| caps.name("id"))
        .map(|m| m.as_str())
}

/// Like [`classify`], but a line that does not carry `id` is unrecognized.
///
/// Reports can be loaded back from JSON, so the line and the entry it sits
/// in are not guaranteed to agree.
pub fn classify_for(id: &str, line: &str) -> LineStatus {
    match check_id(line) {
        Some(found) if found == id => classify(line),
        _ => LineStatus::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_failure_with_verbatim_reason() {
        let line = "run_key_board____NO: Exit code 1";
        assert_eq!(classify(line), LineStatus::Failed("Exit code 1".into()));
        assert_eq!(check_id(line), Some("run_key_board"));
    }

    #[test]
    fn classifies_pass_and_interrupt() {
        assert_eq!(classify("run_screen_rgb____YES"), LineStatus::Passed);
        assert_eq!(classify("run_camera____INTERRUPTED"), LineStatus::Interrupted);
        assert_eq!(check_id("run_camera____INTERRUPTED"), Some("run_camera"));
    }

    #[test]
    fn reason_keeps_inner_separators_and_spacing() {
        assert_eq!(
            classify("run_camera____NO: ffmpeg: command not found"),
            LineStatus::Failed("ffmpeg: command not found".into())
        );
        assert_eq!(
            classify("run_x____NO:  two spaces"),
            LineStatus::Failed(" two spaces".into())
        );
    }

    #[test]
    fn no_wins_over_yes() {
        assert!(matches!(classify("run_x____NO: saw ____YES earlier"), LineStatus::Failed(_)));
    }

    #[test]
    fn anything_else_is_unrecognized() {
        assert_eq!(classify("Traceback (most recent call last):"), LineStatus::Unrecognized);
        assert_eq!(check_id("no separator here"), None);
    }

    #[test]
    fn line_must_belong_to_the_entry() {
        assert_eq!(classify_for("run_camera", "run_camera____YES"), LineStatus::Passed);
        assert_eq!(classify_for("run_camera", "run_screen_rgb____YES"), LineStatus::Unrecognized);
        assert_eq!(
            classify_for("run_camera", "run_camera____NO: panic: first\nsecond"),
            LineStatus::Failed("panic: first\nsecond".into())
        );
    }
}
