// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output helpers. Global flags are passed through the environment so any
//! command can check them.

use serde::Serialize;

pub const JSON_ENV: &str = "AISLE_JSON";
pub const QUIET_ENV: &str = "AISLE_QUIET";
pub const NO_COLOR_ENV: &str = "AISLE_NO_COLOR";

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

pub fn is_json() -> bool {
    flag(JSON_ENV)
}

pub fn is_quiet() -> bool {
    flag(QUIET_ENV)
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialise output: {e}"),
    }
}

/// Status symbols, plain when colour is off.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: !flag(NO_COLOR_ENV) && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "ok"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }

    pub fn fail_sym(&self) -> &'static str {
        if self.color {
            "\x1b[31m✗\x1b[0m"
        } else {
            "x"
        }
    }

    pub fn sym(&self, ok: bool) -> &'static str {
        if ok {
            self.ok_sym()
        } else {
            self.fail_sym()
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
