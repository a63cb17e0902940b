//! 配置模块
//!
//! Command line arguments and the optional TOML harness configuration.

pub mod cli_args;
pub mod device_config;
pub mod harness_config;
pub mod timeout_config;

pub use cli_args::CliArgs;
pub use harness_config::HarnessConfig;
