//! 测试注册表
//!
//! Named, ordered check lists. Building a registry does no I/O; order here
//! is execution order and report order.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::check::CheckDefinition;
use crate::checks::{audio, camera, keyboard, scripted, soak};
use crate::config::HarnessConfig;
use crate::keymap::Locale;
use crate::sequencer::StopPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryKind {
    FullUs,
    FullUk,
    FullDanish,
    QuickUs,
    QuickUk,
    Soak,
}

impl RegistryKind {
    pub const ALL: [RegistryKind; 6] = [
        RegistryKind::FullUs,
        RegistryKind::FullUk,
        RegistryKind::FullDanish,
        RegistryKind::QuickUs,
        RegistryKind::QuickUk,
        RegistryKind::Soak,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RegistryKind::FullUs => "full-us",
            RegistryKind::FullUk => "full-uk",
            RegistryKind::FullDanish => "full-dk",
            RegistryKind::QuickUs => "quick-us",
            RegistryKind::QuickUk => "quick-uk",
            RegistryKind::Soak => "soak",
        }
    }

    /// Full and soak runs report everything; quick runs are a gate.
    pub fn policy(self) -> StopPolicy {
        match self {
            RegistryKind::QuickUs | RegistryKind::QuickUk => StopPolicy::StopOnFirstFailure,
            _ => StopPolicy::ContinueOnFailure,
        }
    }

    /// The full registry for a keyboard locale.
    pub fn full_for(locale: Locale) -> Self {
        match locale {
            Locale::Us => RegistryKind::FullUs,
            Locale::Uk => RegistryKind::FullUk,
            Locale::Danish => RegistryKind::FullDanish,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            RegistryKind::FullUs | RegistryKind::FullUk | RegistryKind::FullDanish => {
                "keyboard, screen, power, flow light, camera, recording playback"
            }
            RegistryKind::QuickUs | RegistryKind::QuickUk => "keyboard, screen, power",
            RegistryKind::Soak => "30 minute full load thermal soak",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegistryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        match RegistryKind::ALL.iter().find(|kind| kind.name() == wanted) {
            Some(kind) => Ok(*kind),
            None => bail!(
                "Unknown registry: {s} (expected one of {})",
                RegistryKind::ALL.map(RegistryKind::name).join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    pub name: String,
    pub policy: StopPolicy,
    pub checks: Vec<CheckDefinition>,
}

impl Registry {
    /// Rejects duplicate ids or display names.
    pub fn new(name: impl Into<String>, policy: StopPolicy, checks: Vec<CheckDefinition>) -> Result<Self> {
        let name = name.into();
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for check in &checks {
            if !ids.insert(check.id.as_str()) {
                bail!("registry {name}: duplicate check id {}", check.id);
            }
            if !names.insert(check.name.as_str()) {
                bail!("registry {name}: duplicate check name {}", check.name);
            }
        }
        Ok(Self { name, policy, checks })
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

pub fn build(kind: RegistryKind, config: &HarnessConfig) -> Result<Registry> {
    let checks = match kind {
        RegistryKind::FullUs => full(config, Locale::Us),
        RegistryKind::FullUk => full(config, Locale::Uk),
        RegistryKind::FullDanish => full(config, Locale::Danish),
        RegistryKind::QuickUs => quick(config, Locale::Us),
        RegistryKind::QuickUk => quick(config, Locale::Uk),
        RegistryKind::Soak => vec![soak::full_load_check(config)],
    };
    Registry::new(kind.name(), kind.policy(), checks)
}

fn quick(config: &HarnessConfig, locale: Locale) -> Vec<CheckDefinition> {
    vec![
        keyboard::keyboard_check(config, locale),
        scripted::screen_rgb_check(config),
        scripted::electricity_power_check(config),
    ]
}

fn full(config: &HarnessConfig, locale: Locale) -> Vec<CheckDefinition> {
    let mut checks = quick(config, locale);
    checks.extend([
        scripted::flow_light_check(config),
        camera::camera_check(config),
        audio::recording_playback_check(config),
    ]);
    checks
}
