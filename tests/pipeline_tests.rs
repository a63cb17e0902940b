use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hwtestor::aggregator::RunReport;
use hwtestor::check::{CheckDefinition, CheckOutcome, Verdict};
use hwtestor::context::RunContext;
use hwtestor::coordinator::Coordinator;
use hwtestor::executor::Executor;
use hwtestor::presentation::{CheckStatus, PresentationAdapter};
use hwtestor::probe::HostProbe;
use hwtestor::supervisor::{CommandSpec, PipelineOutcome, Redirect, RunUntil};

struct Silent;

impl PresentationAdapter for Silent {
    fn on_progress(&mut self, _name: &str, _status: &CheckStatus) {}

    fn on_run_complete(&mut self, _report: &RunReport) {}

    fn request_user_continue(&mut self, timeout: Duration) -> bool {
        thread::sleep(timeout);
        false
    }
}

fn context() -> RunContext {
    RunContext::new(Coordinator::new(), Arc::new(HostProbe)).with_grace_period(Duration::from_millis(500))
}

fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[test_log::test]
fn missing_producer_spawns_nothing() {
    let ctx = context();
    let scope = ctx.scope("run_camera");
    let stages = [
        CommandSpec::new("hwtestor-no-such-producer").arg("-"),
        CommandSpec::new("cat"),
    ];
    let outcome = scope.supervisor().run_pipeline(&stages, true, RunUntil::Exit);
    let PipelineOutcome::SpawnFailed(reason) = &outcome else {
        panic!("expected a spawn failure, got {outcome:?}");
    };
    assert!(reason.contains("not found"));
    assert!(outcome.stages().is_empty());
    assert!(ctx.coordinator().processes().is_empty());
    assert_eq!(outcome.verdict(), Verdict::fail("hwtestor-no-such-producer: command not found"));
}

#[test_log::test]
fn cancel_inside_fixed_window_returns_early() {
    let ctx = context();
    let check = CheckDefinition::new("run_window", "Window", |scope| {
        let outcome = scope
            .supervisor()
            .run(CommandSpec::new("sleep").arg("30"), RunUntil::Elapsed(Duration::from_secs(5)));
        Ok(outcome.verdict())
    })
    .cancelable();

    let canceller = ctx.coordinator().clone();
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_secs(2));
        canceller.request_cancel();
    });
    let started = Instant::now();
    let outcome = Executor::new(&mut Silent).execute(&check, &ctx);
    let elapsed = started.elapsed();
    timer.join().unwrap();

    assert_eq!(outcome, CheckOutcome::Interrupted);
    assert!(elapsed >= Duration::from_millis(1900), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "returned too late: {elapsed:?}");
}

#[test_log::test]
fn cancel_mid_pipeline_leaves_nothing_alive() {
    let ctx = context();
    let scope = ctx.scope("run_recording_playback");
    let table = ctx.coordinator().processes().clone();
    let canceller = ctx.coordinator().clone();
    let watcher = thread::spawn(move || {
        let end = Instant::now() + Duration::from_secs(5);
        while table.pids().len() < 2 && Instant::now() < end {
            thread::sleep(Duration::from_millis(10));
        }
        let pids = table.pids();
        canceller.request_cancel();
        pids
    });

    let stages = [
        CommandSpec::new("yes").stderr(Redirect::Null),
        CommandSpec::new("cat").stdout(Redirect::Null),
    ];
    let outcome = scope
        .supervisor()
        .run_pipeline(&stages, true, RunUntil::WindowClosed);
    let pids = watcher.join().unwrap();

    assert!(matches!(outcome, PipelineOutcome::Interrupted(_)));
    assert_eq!(outcome.verdict(), Verdict::Interrupted);
    assert_eq!(pids.len(), 2);
    assert!(ctx.coordinator().processes().is_empty());
    for pid in pids {
        assert!(!is_alive(pid), "pid {pid} survived cancellation");
    }
}

#[test]
fn consumer_exit_stops_the_producer() {
    let ctx = context();
    let scope = ctx.scope("run_camera");
    let stages = [CommandSpec::new("yes"), CommandSpec::new("head").args(["-n", "1"])];
    let started = Instant::now();
    let outcome = scope.supervisor().run_pipeline(&stages, true, RunUntil::Exit);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.verdict(), Verdict::Pass);
    assert_eq!(outcome.stages()[1].stdout, "y\n");
}

#[test]
fn consumer_drains_after_producer_exits() {
    let ctx = context();
    let scope = ctx.scope("run_camera");
    let stages = [
        CommandSpec::new("sh").args(["-c", "echo frame-1; echo frame-2"]),
        CommandSpec::new("cat"),
    ];
    let outcome = scope.supervisor().run_pipeline(&stages, true, RunUntil::Exit);
    assert!(matches!(outcome, PipelineOutcome::Completed(_)));
    assert_eq!(outcome.stages()[1].stdout, "frame-1\nframe-2\n");
    assert_eq!(outcome.verdict(), Verdict::Pass);
}

#[test]
fn failing_stage_reports_its_exit_code() {
    let ctx = context();
    let scope = ctx.scope("run_screen_rgb");
    let outcome = scope
        .supervisor()
        .run(CommandSpec::new("sh").args(["-c", "exit 4"]), RunUntil::Exit);
    assert_eq!(outcome.verdict(), Verdict::fail("exit code 4"));
}

#[test]
fn stubborn_stage_is_force_killed_and_times_out() {
    let ctx = context().with_grace_period(Duration::from_millis(300));
    let scope = ctx.scope("run_camera");
    let stubborn = CommandSpec::new("sh").args(["-c", "trap '' TERM; sleep 30"]);
    let outcome = scope
        .supervisor()
        .run(stubborn, RunUntil::Elapsed(Duration::from_millis(300)));
    assert!(outcome.stages()[0].force_killed);
    assert_eq!(outcome.verdict(), Verdict::fail("timed out"));
    assert!(ctx.coordinator().processes().is_empty());
}

#[test]
fn check_deadline_times_out_long_commands() {
    let ctx = context().with_check_timeout(Some(Duration::from_millis(300)));
    let scope = ctx.scope("run_flow_light");
    let started = Instant::now();
    let outcome = scope
        .supervisor()
        .run(CommandSpec::new("sleep").arg("30"), RunUntil::Exit);
    assert!(matches!(outcome, PipelineOutcome::TimedOut(_)));
    assert_eq!(outcome.verdict(), Verdict::fail("timed out"));
    assert!(started.elapsed() < Duration::from_secs(3));
}
