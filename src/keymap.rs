//! Keyboard locales as data.
//!
//! Every locale is tested by the same keyboard check; only the tester
//! program and its labels differ, and those live in [`KEYMAPS`].

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "us")]
    Us,
    #[serde(rename = "uk")]
    Uk,
    #[serde(rename = "dk")]
    Danish,
}

/// One row of the keymap table.
#[derive(Debug, Clone, Copy)]
pub struct Keymap {
    pub locale: Locale,
    /// Short code used on the command line and in config files.
    pub code: &'static str,
    /// Human readable layout name.
    pub label: &'static str,
    /// Tester program inside the scripts directory.
    pub tester: &'static str,
}

pub const KEYMAPS: [Keymap; 3] = [
    Keymap {
        locale: Locale::Us,
        code: "us",
        label: "US (ANSI)",
        tester: "Key_Board_US.py",
    },
    Keymap {
        locale: Locale::Uk,
        code: "uk",
        label: "UK (ISO)",
        tester: "Key_Board_UK.py",
    },
    Keymap {
        locale: Locale::Danish,
        code: "dk",
        label: "Danish (ISO)",
        tester: "Key_Board_Danish.py",
    },
];

impl Locale {
    pub fn keymap(self) -> &'static Keymap {
        KEYMAPS
            .iter()
            .find(|k| k.locale == self)
            .unwrap_or(&KEYMAPS[0])
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keymap().code)
    }
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        match KEYMAPS.iter().find(|k| k.code == wanted) {
            Some(keymap) => Ok(keymap.locale),
            None => bail!("Unknown keyboard locale: {s} (expected one of us, uk, dk)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_locale_has_a_row() {
        for locale in [Locale::Us, Locale::Uk, Locale::Danish] {
            assert_eq!(locale.keymap().locale, locale);
        }
        assert_eq!(Locale::Uk.keymap().tester, "Key_Board_UK.py");
    }

    #[test]
    fn parses_codes() {
        assert_eq!("UK".parse::<Locale>().unwrap(), Locale::Uk);
        assert_eq!("dk".parse::<Locale>().unwrap(), Locale::Danish);
        assert!("fr".parse::<Locale>().is_err());
    }
}
