//! Audio checks: live microphone→speaker loopback and a fixed-length
//! record-then-play pass.

use anyhow::Context;
use log::info;
use std::fs;

use crate::check::{CheckDefinition, Verdict};
use crate::config::HarnessConfig;
use crate::config::device_config::ToolsConfig;
use crate::context::CheckScope;
use crate::supervisor::{CommandSpec, Redirect, RunUntil};

const PCM_ARGS: [&str; 8] = ["-f", "S16_LE", "-r", "44100", "-c", "2", "--buffer-size", "1024"];

/// Sets the `Master` and `Capture` controls before touching the devices.
fn set_mixer(scope: &CheckScope, tools: &ToolsConfig, level: &str) -> Verdict {
    for control in ["Master", "Capture"] {
        let spec = CommandSpec::new(&tools.amixer)
            .args(["set", control, level])
            .stdout(Redirect::Null);
        let verdict = scope.supervisor().run(spec, RunUntil::Exit).verdict();
        if !verdict.is_pass() {
            return verdict;
        }
    }
    Verdict::Pass
}

pub fn recording_playback_check(config: &HarnessConfig) -> CheckDefinition {
    let tools = config.tools.clone();
    let level = config.audio.mixer_level.clone();

    CheckDefinition::new("run_recording_playback", "Recording Playback Test", move |scope| {
        let mixer = set_mixer(scope, &tools, &level);
        if !mixer.is_pass() {
            return Ok(mixer);
        }
        let record = CommandSpec::new(&tools.arecord)
            .args(PCM_ARGS)
            .stderr(Redirect::Null);
        let play = CommandSpec::new(&tools.aplay)
            .args(PCM_ARGS)
            .stdout(Redirect::Null)
            .stderr(Redirect::Null);
        let outcome = scope
            .supervisor()
            .run_pipeline(&[record, play], true, RunUntil::WindowClosed);
        Ok(outcome.verdict())
    })
    .live(config.timeouts.live_window)
}

pub fn audio_recording_check(config: &HarnessConfig) -> CheckDefinition {
    let tools = config.tools.clone();
    let audio = config.audio.clone();

    CheckDefinition::new("run_audio_recording", "Audio Recording Test", move |scope| {
        let file = audio.recording_file.display().to_string();
        if scope.probe().path_exists(&audio.recording_file) {
            fs::remove_file(&audio.recording_file)
                .with_context(|| format!("removing stale recording {file}"))?;
        }

        let seconds = audio.record_length.as_secs().max(1).to_string();
        info!("[{}] recording {seconds}s to {file}", scope.check_id());
        let record = CommandSpec::new(&tools.ffmpeg)
            .args(["-y", "-f", "alsa", "-i", "default", "-t", seconds.as_str(), file.as_str()])
            .stdout(Redirect::Null)
            .stderr(Redirect::Null);
        let recorded = scope.supervisor().run(record, RunUntil::Exit).verdict();
        if !recorded.is_pass() {
            return Ok(recorded);
        }

        info!("[{}] recording completed, starting playback", scope.check_id());
        let playback = CommandSpec::new(&tools.ffplay)
            .args(["-autoexit", file.as_str()])
            .stdout(Redirect::Null)
            .stderr(Redirect::Null);
        Ok(match scope.supervisor().run(playback, RunUntil::Exit).verdict() {
            Verdict::Fail(reason) => Verdict::Fail(format!("Playback {reason}")),
            verdict => verdict,
        })
    })
    .cancelable()
}
