//! 依赖检查
//!
//! Looks up the external tools the checks launch and tells the operator how
//! to install the missing ones. Purely advisory: nothing is installed.

use log::warn;

use crate::config::HarnessConfig;
use crate::probe::SystemProbe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub program: String,
    pub hint: &'static str,
}

pub fn required_tools(config: &HarnessConfig) -> Vec<(String, &'static str)> {
    let tools = &config.tools;
    vec![
        (tools.ffmpeg.clone(), "sudo apt install -y ffmpeg"),
        (tools.ffplay.clone(), "sudo apt install -y ffmpeg"),
        (tools.arecord.clone(), "sudo apt install -y alsa-utils"),
        (tools.aplay.clone(), "sudo apt install -y alsa-utils"),
        (tools.amixer.clone(), "sudo apt install -y alsa-utils"),
        (tools.guvcview.clone(), "sudo apt install -y guvcview"),
        ("ddcutil".to_string(), "sudo apt install -y ddcutil"),
    ]
}

pub fn missing_tools(config: &HarnessConfig, probe: &dyn SystemProbe) -> Vec<MissingTool> {
    required_tools(config)
        .into_iter()
        .filter(|(program, _)| probe.find_program(program).is_none())
        .map(|(program, hint)| MissingTool { program, hint })
        .collect()
}

/// Logs one warning per missing tool; returns whether anything is missing.
pub fn report_missing(config: &HarnessConfig, probe: &dyn SystemProbe) -> bool {
    let missing = missing_tools(config, probe);
    for tool in &missing {
        warn!("缺少依赖 {} (install with: {})", tool.program, tool.hint);
    }
    !missing.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::MockSystemProbe;
    use std::path::PathBuf;

    #[test]
    fn reports_only_missing_programs() {
        let mut probe = MockSystemProbe::new();
        probe.expect_find_program().returning(|program| {
            (program != "guvcview").then(|| PathBuf::from("/usr/bin").join(program))
        });
        let missing = missing_tools(&HarnessConfig::default(), &probe);
        assert_eq!(
            missing,
            vec![MissingTool {
                program: "guvcview".into(),
                hint: "sudo apt install -y guvcview"
            }]
        );
    }
}
