//! 交互式菜单
//!
//! Numbered terminal menu used when no non-interactive flag is given.
//! EOF on stdin anywhere counts as Exit.

use anyhow::Result;
use log::{debug, warn};

use crate::check::Verdict;
use crate::checks::scripted;
use crate::presentation::TerminalAdapter;
use crate::registry::RegistryKind;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    SystemUpdate,
    RunAll,
    RunSingle,
    Brightness,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::SystemUpdate),
            "2" => Some(MenuChoice::RunAll),
            "3" => Some(MenuChoice::RunSingle),
            "4" => Some(MenuChoice::Brightness),
            "0" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

fn print_menu(session: &Session) {
    let keymap = session.config().locale.keymap();
    println!("\n{}", "=".repeat(50));
    println!("Argon Notebook Test Toolkit ({} keyboard)", keymap.label);
    println!("{}", "=".repeat(50));
    println!("1. System Update");
    println!("2. Run ALL Tests Sequentially");
    println!("3. Run a Single Test");
    println!("4. Brightness Detection");
    println!("0. Exit");
}

pub fn run_menu(session: &Session, terminal: &mut TerminalAdapter) -> Result<()> {
    loop {
        print_menu(session);
        let Some(line) = terminal.read_line("Select an option: ") else {
            debug!("stdin closed at the menu");
            break;
        };
        match MenuChoice::parse(&line) {
            Some(MenuChoice::SystemUpdate) => match session.system_update() {
                Verdict::Pass => terminal.say("\nSystem update completed!"),
                Verdict::Fail(reason) => terminal.say(&format!("System update failed: {reason}")),
                Verdict::Interrupted => terminal.say("System update interrupted."),
            },
            Some(MenuChoice::RunAll) => {
                let kind = RegistryKind::full_for(session.config().locale);
                session.run_registry(kind, terminal)?;
            }
            Some(MenuChoice::RunSingle) => {
                if !single_test_menu(session, terminal) {
                    break;
                }
            }
            Some(MenuChoice::Brightness) => {
                let check = scripted::brightness_check(session.config());
                session.run_check(&check, terminal);
            }
            Some(MenuChoice::Exit) => break,
            None => warn!("Invalid option: {line}"),
        }
    }
    terminal.say("\nThank you for using the Argon_One_Test Toolkit!");
    Ok(())
}

/// Returns `false` when stdin closed.
fn single_test_menu(session: &Session, terminal: &mut TerminalAdapter) -> bool {
    let checks = session.catalog();
    println!("\nAvailable tests:");
    for (index, check) in checks.iter().enumerate() {
        println!("{}. {}", index + 1, check.name);
    }
    println!("0. Back");

    let Some(line) = terminal.read_line("Select a test: ") else {
        return false;
    };
    match line.parse::<usize>() {
        Ok(0) => {}
        Ok(n) if n <= checks.len() => {
            session.run_check(&checks[n - 1], terminal);
        }
        _ => warn!("Invalid test number: {line}"),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_menu_numbers() {
        assert_eq!(MenuChoice::parse(" 2 "), Some(MenuChoice::RunAll));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("9"), None);
    }
}
