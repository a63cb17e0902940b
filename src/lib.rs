//! hwtestor - notebook hardware acceptance tester.
//!
//! Runs ordered registries of hardware checks (keyboard, screen, power,
//! camera, audio, thermal soak), supervises the external tools they launch
//! and aggregates the `<id>____YES` / `<id>____NO: <reason>` results.

pub mod aggregator;
pub mod check;
pub mod checks;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod deps;
pub mod executor;
pub mod keymap;
pub mod markdown_report;
pub mod menu;
pub mod presentation;
pub mod probe;
pub mod registry;
pub mod result_line;
pub mod sequencer;
pub mod session;
pub mod supervisor;
pub mod utils;
