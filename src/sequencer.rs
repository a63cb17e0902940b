//! 测试序列执行
//!
//! Runs a registry's checks one at a time on the calling thread, records
//! every outcome and applies the stop policy.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::aggregator::{Aggregator, RunReport};
use crate::check::CheckDefinition;
use crate::context::RunContext;
use crate::executor::Executor;
use crate::presentation::{CheckStatus, PresentationAdapter};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopPolicy {
    /// A failure or crash is recorded and the next check starts.
    ContinueOnFailure,
    /// The first failure or crash ends the run; the rest are not run.
    StopOnFirstFailure,
}

pub struct Sequencer<'a> {
    adapter: &'a mut dyn PresentationAdapter,
    policy_override: Option<StopPolicy>,
}

impl<'a> Sequencer<'a> {
    pub fn new(adapter: &'a mut dyn PresentationAdapter) -> Self {
        Self {
            adapter,
            policy_override: None,
        }
    }

    /// Replaces the registry's own policy for this sequencer's runs.
    pub fn with_policy(mut self, policy: Option<StopPolicy>) -> Self {
        self.policy_override = policy;
        self
    }

    pub fn run(&mut self, registry: &Registry, ctx: &RunContext) -> RunReport {
        let policy = self.policy_override.unwrap_or(registry.policy);
        self.run_checks(&registry.name, &registry.checks, policy, ctx)
    }

    /// Runs one catalog check as its own run.
    pub fn run_single(&mut self, check: &CheckDefinition, ctx: &RunContext) -> RunReport {
        self.run_checks(&check.id, std::slice::from_ref(check), StopPolicy::ContinueOnFailure, ctx)
    }

    fn run_checks(
        &mut self,
        name: &str,
        checks: &[CheckDefinition],
        policy: StopPolicy,
        ctx: &RunContext,
    ) -> RunReport {
        info!("开始运行 {name}: {} 项检查, 策略 {policy:?}", checks.len());
        let mut aggregator = Aggregator::new(name, ctx.started_at());
        let total = checks.len();
        let mut stopped_after = None;

        for (index, check) in checks.iter().enumerate() {
            self.adapter
                .on_progress(&check.name, &CheckStatus::Starting { index, total });
            let started = Instant::now();
            let outcome = Executor::new(&mut *self.adapter).execute(check, ctx);
            let elapsed = started.elapsed();
            let failed = outcome.is_failure();
            self.adapter
                .on_progress(&check.name, &CheckStatus::Finished(outcome.clone()));
            info!("{}", outcome.result_line(&check.id));
            aggregator.record(check, outcome, elapsed);

            if ctx.is_cancelled() {
                ctx.coordinator().terminate_all(ctx.grace_period());
            }
            if failed && policy == StopPolicy::StopOnFirstFailure {
                warn!("{} failed, stopping the run", check.name);
                stopped_after = Some(index);
                break;
            }
        }

        if let Some(index) = stopped_after {
            for check in &checks[index + 1..] {
                self.adapter.on_progress(&check.name, &CheckStatus::NotRun);
                aggregator.mark_not_run(check.name.clone());
            }
        }
        if ctx.is_cancelled() {
            ctx.coordinator().terminate_all(ctx.grace_period());
            aggregator.mark_cancelled();
        }

        let report = aggregator.summarize();
        info!(
            "{name} 完成: {} passed, {} failed, {} interrupted",
            report.counts.passed, report.counts.failed, report.counts.interrupted
        );
        self.adapter.on_run_complete(&report);
        report
    }
}
