//! Utility helpers shared across the hwtestor project.
//!
//! This module provides check id normalization, TOML loading and a few
//! formatting helpers used by reports and the terminal adapter.

use anyhow::{Context, Result};
use log::{error, warn};
use serde::de::DeserializeOwned;
use std::{fs, path::Path, time::Duration};

/// Separator between a check id and its verdict in a result line.
pub const RESULT_SEPARATOR: &str = "____";

/// 标准化检查ID
///
/// Derives a result-line id from a display name the same way operators
/// already grep for them: `Camera Test` becomes `run_camera_test`.
/// Ids that already carry the `run_` prefix are only lower-cased.
///
/// # Parameters
///
/// - `name`: display name or raw id
///
/// # Returns
///
/// The normalized check id.
pub fn normalize_check_id(name: &str) -> String {
    let clean = name.trim().to_lowercase().replace([' ', '-'], "_");
    let clean = if clean.contains(RESULT_SEPARATOR) {
        warn!("检查ID不应包含'{RESULT_SEPARATOR}'分隔符: {clean}, 进行清理");
        clean
            .split(RESULT_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string()
    } else {
        clean
    };

    if clean.starts_with("run_") {
        clean
    } else {
        format!("run_{clean}")
    }
}

/// Reads a TOML file into an arbitrary struct.
///
/// # Parameters
///
/// - `path`: The path of the TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the data fails to parse.
pub fn read_toml_from_file<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
    match toml::de::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to parse TOML file: {e}");
            Err(e).with_context(|| format!("解析配置文件失败: {}", path.display()))
        }
    }
}

/// Formats a duration for operator-facing output, e.g. `1.25s` or `3m05s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
