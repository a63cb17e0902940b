//! Per-subsystem settings for the camera, audio and soak checks, plus the
//! names of the external tools they launch.
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// How the camera check exercises the video device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// `ffmpeg` capture piped into `ffplay`, bounded by the live window.
    Pipeline,
    /// `guvcview` preview, paced by the operator.
    Preview,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: PathBuf,
    pub mode: CameraMode,
    /// Kernel module loaded when the device node is missing (e.g. `bcm2835-v4l2`).
    pub modprobe_module: Option<String>,
    /// Directory receiving `ffmpeg.log`/`ffplay.log`.
    pub log_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            mode: CameraMode::Pipeline,
            modprobe_module: Some("bcm2835-v4l2".to_string()),
            log_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Level applied to the `Master` and `Capture` mixer controls.
    pub mixer_level: String,
    /// Length of the fixed capture in the record-then-play check.
    #[serde(with = "humantime_serde")]
    pub record_length: Duration,
    /// WAV file written by the record-then-play check.
    pub recording_file: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mixer_level: "50%".to_string(),
            record_length: Duration::from_secs(6),
            recording_file: PathBuf::from("recorded_audio.wav"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoakConfig {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Temperature sampling interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub cores: u32,
    /// Output directory; relative paths are resolved against `$HOME`.
    pub output_dir: PathBuf,
    pub run_program: String,
    pub plot_program: String,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            interval: Duration::from_secs(5 * 60),
            cores: 4,
            output_dir: PathBuf::from("TemperatureTests"),
            run_program: "stressberry-run".to_string(),
            plot_program: "stressberry-plot".to_string(),
        }
    }
}

/// Program names for every external tool the checks launch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffplay: String,
    pub arecord: String,
    pub aplay: String,
    pub amixer: String,
    pub guvcview: String,
    pub modprobe: String,
    pub apt: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffplay: "ffplay".to_string(),
            arecord: "arecord".to_string(),
            aplay: "aplay".to_string(),
            amixer: "amixer".to_string(),
            guvcview: "guvcview".to_string(),
            modprobe: "modprobe".to_string(),
            apt: "apt".to_string(),
        }
    }
}
