//! 超时配置
use serde::Deserialize;
use std::time::Duration;

/// Timing knobs shared by the executor and the process supervisor.
///
/// All values use humantime notation in the config file (`2s`, `20s`, `45m`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Grace period between SIGTERM and SIGKILL when stopping a stage.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    /// How long the operator gets to continue early while a live check runs.
    #[serde(with = "humantime_serde")]
    pub live_window: Duration,
    /// How long to wait for a live check's worker after its window closed.
    #[serde(with = "humantime_serde")]
    pub worker_join: Duration,
    /// Bound for operator-paced preview tools. `None` waits for the operator.
    #[serde(with = "humantime_serde")]
    pub preview: Option<Duration>,
    /// Per-check deadline.
    #[serde(with = "humantime_serde")]
    pub check: Option<Duration>,
    /// Global run deadline, enforced through the cancel token.
    #[serde(with = "humantime_serde")]
    pub run: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            live_window: Duration::from_secs(20),
            worker_join: Duration::from_secs(10),
            preview: None,
            check: None,
            run: None,
        }
    }
}
