//! 具体硬件检查
//!
//! Every check body is built from the harness config up front so the
//! closures own what they need and the registry stays free of I/O.

use log::info;
use std::path::Path;

use crate::check::{CheckDefinition, Verdict};
use crate::config::HarnessConfig;
use crate::context::CheckScope;
use crate::keymap::Locale;
use crate::supervisor::CommandSpec;

pub mod audio;
pub mod camera;
pub mod keyboard;
pub mod maintenance;
pub mod scripted;
pub mod soak;

/// Every individually runnable check, in menu order.
pub fn catalog(config: &HarnessConfig, locale: Locale) -> Vec<CheckDefinition> {
    vec![
        keyboard::keyboard_check(config, locale),
        scripted::screen_rgb_check(config),
        scripted::electricity_power_check(config),
        scripted::flow_light_check(config),
        camera::camera_check(config),
        audio::recording_playback_check(config),
        scripted::brightness_check(config),
        audio::audio_recording_check(config),
        soak::full_load_check(config),
    ]
}

/// `Some(Fail)` when no X display is available to the tools.
pub(crate) fn require_display(scope: &CheckScope, message: &str) -> Option<Verdict> {
    match scope.probe().get_env("DISPLAY") {
        Some(display) => {
            info!("[{}] Using display: {display}", scope.check_id());
            None
        }
        None => Some(Verdict::fail(message)),
    }
}

/// `Some(Fail)` when a diagnostic script is missing.
pub(crate) fn require_script(scope: &CheckScope, path: &Path) -> Option<Verdict> {
    if scope.probe().path_exists(path) {
        None
    } else {
        Some(Verdict::fail(format!(
            "{} not found. Please check the directory.",
            path.display()
        )))
    }
}

/// `program args...`, wrapped in the privilege command when `privileged`.
pub(crate) fn command(config: &HarnessConfig, program: &str, privileged: bool) -> CommandSpec {
    if privileged {
        let (head, args) = config.privileged(program);
        CommandSpec::new(head).args(args)
    } else {
        CommandSpec::new(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique() {
        let config = HarnessConfig::default();
        let checks = catalog(&config, Locale::Uk);
        let ids: HashSet<_> = checks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), checks.len());
        assert!(ids.contains("run_key_board"));
        assert!(ids.contains("run_full_load_test"));
    }

    #[test]
    fn privileged_commands_use_the_prefix() {
        let config = HarnessConfig::default();
        let spec = command(&config, "python3", true).arg("KEY_Light_init.py");
        assert_eq!(spec.display(), "sudo -n python3 KEY_Light_init.py");
        assert_eq!(command(&config, "amixer", false).display(), "amixer");
    }
}
