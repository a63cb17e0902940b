//! Camera check: live MJPEG loopback or an operator-paced preview.

use log::{info, warn};
use std::time::Duration;

use crate::check::{CheckDefinition, Verdict};
use crate::checks::{command, require_display};
use crate::config::HarnessConfig;
use crate::config::device_config::CameraMode;
use crate::context::CheckScope;
use crate::supervisor::{CommandSpec, Redirect, RunUntil};

pub const ID: &str = "run_camera";

/// Settle time after loading the camera module.
const MODULE_SETTLE: Duration = Duration::from_secs(2);

pub fn camera_check(config: &HarnessConfig) -> CheckDefinition {
    let camera = config.camera.clone();
    let device = camera.device.display().to_string();
    let modprobe = camera
        .modprobe_module
        .clone()
        .map(|module| command(config, &config.tools.modprobe, true).arg(module));
    let tools = config.tools.clone();
    let preview_limit = config.timeouts.preview;

    let check = CheckDefinition::new(ID, "Camera Test", move |scope| {
        if let Some(verdict) = require_display(
            scope,
            "No display available (DISPLAY not set). Set it with: export DISPLAY=:0",
        ) {
            return Ok(verdict);
        }
        if let Some(verdict) = ensure_device(scope, &camera.device, modprobe.as_ref()) {
            return Ok(verdict);
        }

        let outcome = match camera.mode {
            CameraMode::Pipeline => {
                let capture = CommandSpec::new(&tools.ffmpeg)
                    .args(["-y", "-i", device.as_str(), "-f", "mjpeg", "-"])
                    .stderr(Redirect::File(camera.log_dir.join("ffmpeg.log")));
                let display = CommandSpec::new(&tools.ffplay)
                    .args(["-i", "-", "-fflags", "nobuffer", "-autoexit"])
                    .stdout(Redirect::Null)
                    .stderr(Redirect::File(camera.log_dir.join("ffplay.log")));
                info!("[{ID}] real-time capture started, quit ffplay or continue to finish");
                scope
                    .supervisor()
                    .run_pipeline(&[capture, display], true, RunUntil::WindowClosed)
            }
            CameraMode::Preview => {
                let preview = CommandSpec::new(&tools.guvcview)
                    .args(["-d", device.as_str()])
                    .stdout(Redirect::Null)
                    .stderr(Redirect::Null);
                let until = preview_limit.map_or(RunUntil::Exit, RunUntil::Elapsed);
                scope.supervisor().run(preview, until)
            }
        };
        Ok(outcome.verdict())
    });

    match config.camera.mode {
        CameraMode::Pipeline => check.live(config.timeouts.live_window),
        CameraMode::Preview => check.cancelable(),
    }
}

// Loads the camera module once when the device node is missing.
fn ensure_device(
    scope: &CheckScope,
    device: &std::path::Path,
    modprobe: Option<&CommandSpec>,
) -> Option<Verdict> {
    if scope.probe().path_exists(device) {
        return None;
    }
    let missing = || {
        Some(Verdict::fail(format!(
            "{} not found. Check camera connection or load the camera driver.",
            device.display()
        )))
    };
    let Some(modprobe) = modprobe else {
        return missing();
    };

    warn!("[{}] {} missing, trying {}", scope.check_id(), device.display(), modprobe.display());
    match scope.supervisor().run(modprobe.clone(), RunUntil::Exit).verdict() {
        Verdict::Pass => {}
        Verdict::Interrupted => return Some(Verdict::Interrupted),
        Verdict::Fail(reason) => warn!("[{}] module load failed: {reason}", scope.check_id()),
    }
    if scope.wait_or_cancelled(MODULE_SETTLE) {
        return Some(Verdict::Interrupted);
    }
    if scope.probe().path_exists(device) {
        info!("[{}] {} available after loading module", scope.check_id(), device.display());
        None
    } else {
        missing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckOutcome;
    use crate::context::RunContext;
    use crate::coordinator::Coordinator;
    use crate::executor::Executor;
    use crate::presentation::MockPresentationAdapter;
    use crate::probe::MockSystemProbe;
    use std::sync::Arc;

    #[test]
    fn missing_device_without_module_fails_fast() {
        let mut config = HarnessConfig::default();
        config.camera.modprobe_module = None;
        config.camera.mode = CameraMode::Preview;
        let check = camera_check(&config);
        assert!(check.live_window.is_none());

        let mut probe = MockSystemProbe::new();
        probe.expect_get_env().return_const(Some(":0".to_string()));
        probe.expect_path_exists().return_const(false);
        probe.expect_find_program().never();
        let ctx = RunContext::new(Coordinator::new(), Arc::new(probe));
        let mut adapter = MockPresentationAdapter::new();
        let outcome = Executor::new(&mut adapter).execute(&check, &ctx);
        assert_eq!(
            outcome,
            CheckOutcome::Failed {
                reason: "/dev/video0 not found. Check camera connection or load the camera driver."
                    .into()
            }
        );
    }

    #[test]
    fn pipeline_mode_is_live() {
        let config = HarnessConfig::default();
        let check = camera_check(&config);
        assert_eq!(check.live_window, Some(config.timeouts.live_window));
        assert!(check.cancelable);
    }
}
