//! Global compilation policy derived from VM flags
//!
//! Decides which tiers are reachable under the current flags, what level an
//! `ANY` test is compiled at, and when IR verification must be skipped
//! instead of failed.

use jitcheck_core::{CompLevel, Error, FlagSource, FlagValue, Result, SkipReason};
use std::fmt;

/// Tiers reachable under one set of VM flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilationPolicy {
    interpreter_only: bool,
    tiered: bool,
    stop_at_level: i64,
    default_level: Option<CompLevel>,
}

impl Default for CompilationPolicy {
    fn default() -> Self {
        Self {
            interpreter_only: false,
            tiered: true,
            stop_at_level: 4,
            default_level: None,
        }
    }
}

fn bool_flag(flags: &dyn FlagSource, name: &str, default: bool) -> Result<bool> {
    match flags.flag(name)? {
        None => Ok(default),
        Some(FlagValue::Bool(b)) => Ok(b),
        Some(other) => Err(Error::test_run(format!(
            "flag {} must be boolean, found {}",
            name, other
        ))),
    }
}

impl CompilationPolicy {
    /// Read `Xint`, `UseCompiler`, `TieredCompilation` and `TieredStopAtLevel`.
    ///
    /// Flags missing from the source keep their usual defaults.
    pub fn from_flags(flags: &dyn FlagSource) -> Result<Self> {
        let interpreter_only =
            bool_flag(flags, "Xint", false)? || !bool_flag(flags, "UseCompiler", true)?;
        let tiered = bool_flag(flags, "TieredCompilation", true)?;
        let stop_at_level = match flags.flag("TieredStopAtLevel")? {
            None => 4,
            Some(FlagValue::Int(level)) => level.clamp(0, 4),
            Some(other) => {
                return Err(Error::test_run(format!(
                    "flag TieredStopAtLevel must be an integer, found {}",
                    other
                )))
            }
        };
        Ok(Self {
            interpreter_only,
            tiered,
            stop_at_level,
            default_level: None,
        })
    }

    /// Level used for tests declared `ANY`, when it names a concrete tier.
    pub fn with_default_level(mut self, level: Option<CompLevel>) -> Self {
        self.default_level = level.filter(|l| l.is_concrete());
        self
    }

    /// True if nothing is ever compiled.
    pub fn interpreter_only(&self) -> bool {
        self.interpreter_only
    }

    /// True if tiered compilation is enabled.
    pub fn tiered(&self) -> bool {
        self.tiered
    }

    /// Highest reachable tier, `None` if nothing compiles.
    pub fn highest_level(&self) -> Option<CompLevel> {
        if self.interpreter_only {
            return None;
        }
        if !self.tiered {
            return Some(CompLevel::C2);
        }
        CompLevel::from_value(self.stop_at_level as i32).filter(|l| l.is_concrete())
    }

    /// Concrete level a declared level is compiled at.
    ///
    /// `ANY` becomes the default level override or the highest reachable
    /// tier; every other level is returned as is.
    pub fn resolve(&self, declared: CompLevel) -> CompLevel {
        match declared {
            CompLevel::Any => self
                .default_level
                .or_else(|| self.highest_level())
                .unwrap_or(CompLevel::C2),
            other => other,
        }
    }

    /// True if a compilation request at `level` can succeed.
    pub fn can_compile(&self, level: CompLevel) -> bool {
        if self.interpreter_only || !level.is_concrete() {
            return false;
        }
        if self.tiered {
            i64::from(level.value()) <= self.stop_at_level
        } else {
            level.is_c2()
        }
    }

    /// Why IR rules of a test declared at `declared` cannot be verified, if
    /// that is known before the test runs.
    pub fn skip_reason(&self, declared: CompLevel) -> Option<SkipReason> {
        if self.interpreter_only {
            return Some(SkipReason::InterpreterOnly);
        }
        if !self.tiered {
            return Some(SkipReason::TieredCompilationDisabled);
        }
        if declared == CompLevel::Skip {
            return Some(SkipReason::TestSkipped);
        }
        if declared == CompLevel::WaitForCompilation {
            return None;
        }
        let level = self.resolve(declared);
        if !self.can_compile(level) {
            return Some(SkipReason::LevelUnreachable);
        }
        if declared == CompLevel::Any && self.highest_level() != Some(CompLevel::C2) {
            return Some(SkipReason::LevelUnreachable);
        }
        None
    }
}

impl fmt::Display for CompilationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.highest_level() {
            None => f.write_str("interpreter only"),
            Some(level) if !self.tiered => write!(f, "non-tiered, {}", level),
            Some(level) => write!(f, "tiered up to {}", level),
        }
    }
}
