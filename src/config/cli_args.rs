use anyhow::{Context, Result};
use clap::Parser;
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;

use crate::keymap::Locale;

// hwtestor - 笔记本硬件验收测试工具
#[derive(Parser, Debug)]
#[clap(
    name = "hwtestor",
    version,
    about = "Run hardware acceptance checks on the notebook and summarize the results",
    after_help = "EXECUTION MODES:\n  (no mode flag)         Interactive numbered menu\n  --run <REGISTRY>       Run a named registry, then exit\n  --check <ID>           Run a single check, then exit\n  --list                 List registries and checks\n\nREGISTRIES:\n  full-us, full-uk, full-dk, quick-us, quick-uk, soak\n\nEXAMPLES:\n  hwtestor\n  hwtestor --run full-uk --reports-dir reports/\n  hwtestor --check run_camera --config station.toml\n  hwtestor --run quick-us --stop-on-failure --timeout 10m"
)]
pub struct CliArgs {
    // Config file - TOML harness configuration
    // 配置文件 - TOML格式的测试配置
    #[clap(short = 'c', long = "config", help = "Harness configuration file")]
    pub config: Option<PathBuf>,

    // Registry - run a named registry non-interactively
    // 测试集 - 非交互地运行指定测试集
    #[clap(short = 'r', long = "run", help = "Run a named registry and exit")]
    pub run: Option<String>,

    // Single check - run one catalog check non-interactively
    // 单项测试 - 非交互地运行单个检查
    #[clap(long = "check", help = "Run a single check by id and exit")]
    pub check: Option<String>,

    // List - print registries and checks
    // 列表 - 显示测试集和检查项
    #[clap(short = 'l', long = "list", help = "List registries and checks")]
    pub list: bool,

    // Keyboard locale override
    // 键盘布局
    #[clap(long = "locale", help = "Keyboard locale: us, uk or dk")]
    pub locale: Option<String>,

    // Stop on first failure regardless of the registry's policy
    // 首次失败即停止
    #[clap(long = "stop-on-failure", help = "Halt the run at the first failing check")]
    pub stop_on_failure: bool,

    // Global run timeout, humantime notation
    // 全局超时时间
    #[clap(long = "timeout", help = "Global run timeout, e.g. 45m")]
    pub timeout: Option<String>,

    // Reports directory
    // 报告目录 - 存放测试报告的目录
    #[clap(long = "reports-dir", help = "Output directory for run reports")]
    pub reports_dir: Option<PathBuf>,

    // Verbose mode - Show more log information
    // 详细模式 - 显示更多日志信息
    #[clap(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,

    // Quiet mode - Suppress non-essential log output
    // 安静模式 - 只显示错误日志
    #[clap(short = 'q', long = "quiet", help = "Suppress non-essential output")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse command line arguments
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get log level
    /// 获取日志级别
    pub fn get_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Get locale override
    /// 获取键盘布局
    pub fn get_locale(&self) -> Result<Option<Locale>> {
        self.locale.as_deref().map(str::parse).transpose()
    }

    /// Get global run timeout
    /// 获取全局超时时间
    pub fn get_timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw)
                    .with_context(|| format!("Invalid --timeout value: {raw}"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_follows_flags() {
        let args = CliArgs::parse_from(["hwtestor", "-v"]);
        assert_eq!(args.get_log_level(), "debug");
        let args = CliArgs::parse_from(["hwtestor", "-q", "-v"]);
        assert_eq!(args.get_log_level(), "error");
        let args = CliArgs::parse_from(["hwtestor"]);
        assert_eq!(args.get_log_level(), "info");
    }

    #[test]
    fn parses_timeout_and_locale() {
        let args = CliArgs::parse_from(["hwtestor", "--run", "full-uk", "--timeout", "45m", "--locale", "uk"]);
        assert_eq!(args.run.as_deref(), Some("full-uk"));
        assert_eq!(args.get_timeout().unwrap(), Some(Duration::from_secs(45 * 60)));
        assert_eq!(args.get_locale().unwrap(), Some(Locale::Uk));
    }

    #[test]
    fn rejects_bad_timeout() {
        let args = CliArgs::parse_from(["hwtestor", "--timeout", "soon"]);
        assert!(args.get_timeout().is_err());
    }
}
