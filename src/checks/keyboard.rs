//! Keyboard detection, one implementation for every layout.

use log::warn;

use crate::check::{CheckDefinition, Verdict};
use crate::checks::{require_display, require_script};
use crate::config::HarnessConfig;
use crate::keymap::Locale;
use crate::supervisor::{CommandSpec, RunUntil};

pub const ID: &str = "run_key_board";

pub fn keyboard_check(config: &HarnessConfig, locale: Locale) -> CheckDefinition {
    let keymap = locale.keymap();
    let script = config.script_path(keymap.tester);
    let interpreter = config.interpreter.clone();

    CheckDefinition::new(ID, "Keyboard Detection", move |scope| {
        if let Some(verdict) = require_display(
            scope,
            "DISPLAY environment variable not set. Try running: export DISPLAY=:0",
        ) {
            return Ok(verdict);
        }
        if let Some(verdict) = require_script(scope, &script) {
            return Ok(verdict);
        }

        let spec = CommandSpec::new(&interpreter).arg(script.display().to_string());
        let outcome = scope.supervisor().run(spec, RunUntil::Exit);
        let verdict = outcome.verdict();
        if let (Verdict::Fail(reason), Some(stage)) = (&verdict, outcome.stages().first()) {
            warn!("[{}] {} keyboard test failed: {reason}", scope.check_id(), keymap.label);
            warn!("stdout: {}", stage.stdout.trim_end());
            warn!("stderr: {}", stage.stderr.trim_end());
        }
        Ok(verdict)
    })
    .cancelable()
}
