//! Checks that run one vendor diagnostic script and judge it by exit code.

use log::info;

use crate::check::CheckDefinition;
use crate::checks::{command, require_script};
use crate::config::HarnessConfig;
use crate::supervisor::RunUntil;

/// A script-backed check.
struct ScriptCheck {
    id: &'static str,
    name: &'static str,
    script: &'static str,
    /// Run through the privilege command.
    privileged: bool,
}

impl ScriptCheck {
    fn build(self, config: &HarnessConfig) -> CheckDefinition {
        let script = config.script_path(self.script);
        let base = command(config, &config.interpreter, self.privileged)
            .arg(script.display().to_string())
            .echo();

        CheckDefinition::new(self.id, self.name, move |scope| {
            if let Some(verdict) = require_script(scope, &script) {
                return Ok(verdict);
            }
            info!("[{}] running {}", scope.check_id(), base.display());
            let outcome = scope.supervisor().run(base.clone(), RunUntil::Exit);
            Ok(outcome.verdict())
        })
        .cancelable()
    }
}

pub fn screen_rgb_check(config: &HarnessConfig) -> CheckDefinition {
    ScriptCheck {
        id: "run_screen_rgb",
        name: "Screen RGB Detection",
        script: "Screen_Color.py",
        privileged: false,
    }
    .build(config)
}

/// Battery gauge telemetry read through the vendor script.
pub fn electricity_power_check(config: &HarnessConfig) -> CheckDefinition {
    ScriptCheck {
        id: "run_electricity_power",
        name: "Electricity Power Detection",
        script: "CW2217_one.py",
        privileged: false,
    }
    .build(config)
}

pub fn flow_light_check(config: &HarnessConfig) -> CheckDefinition {
    ScriptCheck {
        id: "run_flow_light",
        name: "Flow Light Test",
        script: "Flow_Light.py",
        privileged: false,
    }
    .build(config)
}

/// Keyboard backlight init; touches GPIO so it needs root.
pub fn brightness_check(config: &HarnessConfig) -> CheckDefinition {
    ScriptCheck {
        id: "run_brightness",
        name: "Brightness Detection",
        script: "KEY_Light_init.py",
        privileged: true,
    }
    .build(config)
}
