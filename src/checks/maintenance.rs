//! System update menu action.
//!
//! Not a check: it is never part of a registry and its result is only
//! shown to the operator.

use log::{info, warn};

use crate::check::Verdict;
use crate::checks::command;
use crate::config::HarnessConfig;
use crate::context::RunContext;
use crate::supervisor::{Redirect, RunUntil};

pub const ID: &str = "run_system_update";

/// `apt update` followed by `apt upgrade -y`, output passed through.
pub fn system_update(config: &HarnessConfig, ctx: &RunContext) -> Verdict {
    let scope = ctx.scope(ID);
    let steps = [vec!["update"], vec!["upgrade", "-y"]];
    for args in steps {
        let spec = command(config, &config.tools.apt, true)
            .args(args)
            .stdout(Redirect::Inherit)
            .stderr(Redirect::Inherit);
        info!("Updating system: {}", spec.display());
        let verdict = scope.supervisor().run(spec, RunUntil::Exit).verdict();
        if !verdict.is_pass() {
            warn!("System update failed: {verdict:?}");
            if !config.privilege_command.is_empty() {
                warn!("如果需要密码, 请先运行 `sudo -v` 再启动 hwtestor");
            }
            return verdict;
        }
    }
    info!("System update completed!");
    Verdict::Pass
}
