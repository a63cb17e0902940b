//! Represents the root configuration for the harness.
//!
//! The file is optional: every field has a default matching the stock
//! notebook image, so a missing `hwtestor.toml` yields `HarnessConfig::default()`.
//!
//! ```toml
//! scripts_dir = "argon-scripts/Argon_Notebook_Test-main"
//! locale = "uk"
//!
//! [timeouts]
//! live_window = "20s"
//! preview = "2m"
//!
//! [camera]
//! mode = "preview"
//! ```
use crate::config::device_config::{AudioConfig, CameraConfig, SoakConfig, ToolsConfig};
use crate::config::timeout_config::TimeoutConfig;
use crate::keymap::Locale;
use crate::utils;
use anyhow::Result;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding the vendor diagnostic scripts.
    pub scripts_dir: PathBuf,
    /// Interpreter the diagnostic scripts are run with.
    pub interpreter: String,
    /// Prefix for commands that need root; empty string disables it.
    ///
    /// Children run in their own process group and cannot prompt on the
    /// terminal, so the default is `sudo -n`: a missing credential fails the
    /// command instead of stopping it on a password prompt.
    pub privilege_command: String,
    /// Keyboard locale used by the catalog and the interactive menu.
    pub locale: Locale,
    /// Where run reports are written; no reports when unset.
    pub reports_dir: Option<PathBuf>,
    pub timeouts: TimeoutConfig,
    pub camera: CameraConfig,
    pub audio: AudioConfig,
    pub soak: SoakConfig,
    pub tools: ToolsConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("argon-scripts/Argon_Notebook_Test-main"),
            interpreter: "python3".to_string(),
            privilege_command: "sudo -n".to_string(),
            locale: Locale::Us,
            reports_dir: None,
            timeouts: TimeoutConfig::default(),
            camera: CameraConfig::default(),
            audio: AudioConfig::default(),
            soak: SoakConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// 从文件中读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = utils::read_toml_from_file(path)?;
        info!("已加载配置文件: {}", path.display());
        Ok(config)
    }

    /// Loads `path` when given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("未指定配置文件, 使用默认配置");
                Ok(Self::default())
            }
        }
    }

    /// Path of a diagnostic script inside `scripts_dir`.
    pub fn script_path(&self, file_name: &str) -> PathBuf {
        self.scripts_dir.join(file_name)
    }

    /// Splits `privilege_command` into the argv prefix for root-only commands.
    pub fn privileged(&self, program: &str) -> (String, Vec<String>) {
        let mut parts: Vec<String> = self
            .privilege_command
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if parts.is_empty() {
            return (program.to_string(), Vec::new());
        }
        let head = parts.remove(0);
        parts.push(program.to_string());
        (head, parts)
    }
}
