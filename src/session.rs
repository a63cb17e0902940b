//! 运行会话
//!
//! One harness invocation: builds a fresh coordinator per run, publishes it
//! in the [`RunSlot`] for the interrupt handler and writes reports.

use anyhow::{Result, bail};
use log::{error, info};

use crate::aggregator::RunReport;
use crate::check::{CheckDefinition, Verdict};
use crate::checks::{catalog, maintenance};
use crate::config::HarnessConfig;
use crate::context::RunContext;
use crate::coordinator::{Coordinator, RunSlot};
use crate::markdown_report;
use crate::presentation::PresentationAdapter;
use crate::registry::{self, RegistryKind};
use crate::sequencer::{Sequencer, StopPolicy};

pub struct Session {
    config: HarnessConfig,
    slot: RunSlot,
    policy: Option<StopPolicy>,
}

impl Session {
    pub fn new(config: HarnessConfig, slot: RunSlot) -> Self {
        Self {
            config,
            slot,
            policy: None,
        }
    }

    /// Overrides every registry's stop policy.
    pub fn with_policy(mut self, policy: Option<StopPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn catalog(&self) -> Vec<CheckDefinition> {
        catalog(&self.config, self.config.locale)
    }

    pub fn find_check(&self, id: &str) -> Result<CheckDefinition> {
        let wanted = crate::utils::normalize_check_id(id);
        match self.catalog().into_iter().find(|c| c.id == wanted) {
            Some(check) => Ok(check),
            None => bail!("Unknown check: {id} (see --list)"),
        }
    }

    pub fn run_registry(&self, kind: RegistryKind, adapter: &mut dyn PresentationAdapter) -> Result<RunReport> {
        let registry = registry::build(kind, &self.config)?;
        let ctx = self.begin();
        let report = Sequencer::new(adapter)
            .with_policy(self.policy)
            .run(&registry, &ctx);
        self.finish(&report);
        Ok(report)
    }

    pub fn run_check(&self, check: &CheckDefinition, adapter: &mut dyn PresentationAdapter) -> RunReport {
        let ctx = self.begin();
        let report = Sequencer::new(adapter).run_single(check, &ctx);
        self.finish(&report);
        report
    }

    pub fn system_update(&self) -> Verdict {
        let ctx = self.begin();
        let verdict = maintenance::system_update(&self.config, &ctx);
        if ctx.is_cancelled() {
            ctx.coordinator().terminate_all(ctx.grace_period());
        }
        self.slot.clear();
        verdict
    }

    fn begin(&self) -> RunContext {
        let coordinator = Coordinator::with_timeout(self.config.timeouts.run);
        self.slot.install(coordinator.clone());
        RunContext::from_config(&self.config, coordinator)
    }

    fn finish(&self, report: &RunReport) {
        self.slot.clear();
        if let Some(dir) = &self.config.reports_dir {
            // 报告写入失败不影响测试结果
            match markdown_report::write_reports(report, dir) {
                Ok(written) => info!("report: {}", written.json.display()),
                Err(e) => error!("无法写入报告: {e:#}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::MockPresentationAdapter;

    #[test]
    fn finds_checks_by_loose_id() {
        let session = Session::new(HarnessConfig::default(), RunSlot::default());
        assert_eq!(session.find_check("run_camera").unwrap().id, "run_camera");
        assert_eq!(session.find_check("screen-rgb").unwrap().id, "run_screen_rgb");
        assert!(session.find_check("run_teleporter").is_err());
    }

    #[test]
    fn single_run_writes_reports_and_clears_slot() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            reports_dir: Some(dir.path().to_path_buf()),
            scripts_dir: dir.path().to_path_buf(),
            ..HarnessConfig::default()
        };
        let slot = RunSlot::default();
        let session = Session::new(config, slot.clone());
        let check = session.find_check("run_flow_light").unwrap();
        let mut adapter = MockPresentationAdapter::new();
        adapter.expect_on_progress().return_const(());
        adapter.expect_on_run_complete().return_const(());
        let report = session.run_check(&check, &mut adapter);
        assert!(report.entries[0].outcome.is_failure());
        assert!(!slot.cancel_active());
        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 2);
    }
}
