use anyhow::{Context, Result};
use env_logger::Env;
use log::{debug, info, warn};
use std::process;

use hwtestor::config::{CliArgs, HarnessConfig};
use hwtestor::coordinator::RunSlot;
use hwtestor::deps;
use hwtestor::menu;
use hwtestor::presentation::TerminalAdapter;
use hwtestor::probe::HostProbe;
use hwtestor::registry::{self, RegistryKind};
use hwtestor::sequencer::StopPolicy;
use hwtestor::session::Session;

fn main() {
    let args = CliArgs::parse_args();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.get_log_level())).init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = load_config(&args)?;

    if args.list {
        print_list(&config)?;
        return Ok(());
    }

    if deps::report_missing(&config, &HostProbe) {
        warn!("Some tools are missing; the checks that need them will fail.");
    }

    let slot = RunSlot::default();
    let handler_slot = slot.clone();
    ctrlc::set_handler(move || {
        if !handler_slot.cancel_active() {
            // 没有正在运行的测试, 直接退出
            process::exit(130);
        }
    })
    .context("无法注册 Ctrl+C 处理器")?;

    let policy = args.stop_on_failure.then_some(StopPolicy::StopOnFirstFailure);
    let session = Session::new(config, slot).with_policy(policy);
    let mut terminal = TerminalAdapter::new();

    if let Some(name) = &args.run {
        let kind: RegistryKind = name.parse()?;
        let report = session.run_registry(kind, &mut terminal)?;
        info!("{} finished, all passed: {}", report.registry, report.all_passed);
    } else if let Some(id) = &args.check {
        let check = session.find_check(id)?;
        session.run_check(&check, &mut terminal);
    } else {
        menu::run_menu(&session, &mut terminal)?;
    }
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(args.config.as_deref())?;
    if let Some(locale) = args.get_locale()? {
        config.locale = locale;
    }
    if let Some(timeout) = args.get_timeout()? {
        config.timeouts.run = Some(timeout);
    }
    if let Some(dir) = &args.reports_dir {
        config.reports_dir = Some(dir.clone());
    }
    debug!("{config:?}");
    Ok(config)
}

fn print_list(config: &HarnessConfig) -> Result<()> {
    println!("Registries:");
    for kind in RegistryKind::ALL {
        let registry = registry::build(kind, config)?;
        println!(
            "  {:<10} {:?}, {} checks: {}",
            kind.name(),
            registry.policy,
            registry.len(),
            kind.describe()
        );
    }
    println!("\nChecks ({} keyboard):", config.locale);
    for check in hwtestor::checks::catalog(config, config.locale) {
        let live = if check.live_window.is_some() { " (live)" } else { "" };
        println!("  {:<24} {}{live}", check.id, check.name);
    }
    Ok(())
}
