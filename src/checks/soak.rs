//! Full-load thermal soak: stress every core while sampling temperature,
//! then plot the samples.

use anyhow::Context;
use log::info;
use std::fs;
use std::path::PathBuf;

use crate::check::CheckDefinition;
use crate::config::HarnessConfig;
use crate::config::device_config::SoakConfig;
use crate::context::CheckScope;
use crate::supervisor::{CommandSpec, Redirect, RunUntil};

const SAMPLES_FILE: &str = "mytest.out";
const PLOT_FILE: &str = "mytest.png";

pub fn full_load_check(config: &HarnessConfig) -> CheckDefinition {
    let soak = config.soak.clone();

    CheckDefinition::new("run_full_load_test", "Full Load Test", move |scope| {
        let dir = output_dir(scope, &soak);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let run = CommandSpec::new(resolve(scope, &soak.run_program))
            .args(["-n", "Full Load Test", "-d"])
            .arg(soak.duration.as_secs().to_string())
            .arg("-i")
            .arg(soak.interval.as_secs().to_string())
            .arg("-c")
            .arg(soak.cores.to_string())
            .arg(SAMPLES_FILE)
            .current_dir(&dir)
            .echo();
        info!("[{}] starting full load test: {}", scope.check_id(), run.display());
        let loaded = scope.supervisor().run(run, RunUntil::Exit).verdict();
        if !loaded.is_pass() {
            return Ok(loaded);
        }

        let plot = CommandSpec::new(resolve(scope, &soak.plot_program))
            .args([SAMPLES_FILE, "-f", "-d"])
            .arg(soak.interval.as_secs().to_string())
            .args(["-f", "-l", "400", "2600", "-t", "30", "90", "-o", PLOT_FILE, "--not-transparent"])
            .current_dir(&dir)
            .env("MPLBACKEND", "Agg")
            .stdout(Redirect::Capture)
            .echo();
        let plotted = scope.supervisor().run(plot, RunUntil::Exit).verdict();
        if plotted.is_pass() {
            info!("[{}] temperature plot saved to {}", scope.check_id(), dir.join(PLOT_FILE).display());
        }
        Ok(plotted)
    })
    .cancelable()
}

// Relative output dirs live under $HOME.
fn output_dir(scope: &CheckScope, soak: &SoakConfig) -> PathBuf {
    if soak.output_dir.is_absolute() {
        return soak.output_dir.clone();
    }
    match scope.probe().get_env("HOME") {
        Some(home) => PathBuf::from(home).join(&soak.output_dir),
        None => soak.output_dir.clone(),
    }
}

// pip --user installs land in ~/.local/bin, which is often not on PATH.
fn resolve(scope: &CheckScope, program: &str) -> String {
    if scope.probe().find_program(program).is_some() {
        return program.to_string();
    }
    scope
        .probe()
        .get_env("HOME")
        .map(|home| PathBuf::from(home).join(".local/bin").join(program))
        .filter(|candidate| scope.probe().path_exists(candidate))
        .map_or_else(|| program.to_string(), |path| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckOutcome;
    use crate::context::RunContext;
    use crate::coordinator::Coordinator;
    use crate::executor::Executor;
    use crate::presentation::MockPresentationAdapter;
    use crate::probe::HostProbe;
    use std::sync::Arc;
    use std::time::Duration;

    #[test_log::test]
    fn runs_load_then_plot_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.soak.output_dir = dir.path().join("TemperatureTests");
        config.soak.run_program = "true".to_string();
        config.soak.plot_program = "true".to_string();

        let ctx = RunContext::new(Coordinator::new(), Arc::new(HostProbe));
        let mut adapter = MockPresentationAdapter::new();
        let outcome = Executor::new(&mut adapter).execute(&full_load_check(&config), &ctx);
        assert_eq!(outcome, CheckOutcome::Passed);
        assert!(config.soak.output_dir.is_dir());
    }

    #[test]
    fn cancellation_interrupts_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.soak.output_dir = dir.path().to_path_buf();
        let stress = dir.path().join("fake-stressberry-run");
        fs::write(&stress, "#!/bin/sh\nsleep 30\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&stress, fs::Permissions::from_mode(0o755)).unwrap();
        }
        config.soak.run_program = stress.display().to_string();

        let ctx = RunContext::new(Coordinator::new(), Arc::new(HostProbe));
        let canceller = ctx.coordinator().clone();
        let timer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            canceller.request_cancel();
        });
        let mut adapter = MockPresentationAdapter::new();
        let outcome = Executor::new(&mut adapter).execute(&full_load_check(&config), &ctx);
        timer.join().unwrap();
        assert_eq!(outcome, CheckOutcome::Interrupted);
        assert!(ctx.coordinator().processes().is_empty());
    }
}
