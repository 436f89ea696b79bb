//! Compilation levels
//!
//! Mirrors the tiers of a tiered JIT: the interpreter (0), three C1 flavours
//! (1-3) and the optimizing C2 compiler (4). Three pseudo levels steer the
//! harness rather than the compiler:
//! - `Any`: let the harness pick the highest reachable tier
//! - `WaitForCompilation`: keep invoking until the VM compiles on its own
//! - `Skip`: never warm up or compile the test

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compilation level requested for a test or used by a compiler-control annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompLevel {
    /// Highest tier reachable under the current flags
    Any,
    /// C1 without profiling
    C1Simple,
    /// C1 with invocation and backedge counters only
    C1LimitedProfile,
    /// C1 with full profiling
    C1FullProfile,
    /// The optimizing compiler
    C2,
    /// Invoke until the VM compiles the method by itself
    WaitForCompilation,
    /// Never compile
    Skip,
}

impl CompLevel {
    /// Numeric value as understood by the VM.
    pub fn value(self) -> i32 {
        match self {
            CompLevel::Any => -1,
            CompLevel::C1Simple => 1,
            CompLevel::C1LimitedProfile => 2,
            CompLevel::C1FullProfile => 3,
            CompLevel::C2 => 4,
            CompLevel::WaitForCompilation => -2,
            CompLevel::Skip => -3,
        }
    }

    /// Inverse of [`CompLevel::value`].
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            -1 => Some(CompLevel::Any),
            1 => Some(CompLevel::C1Simple),
            2 => Some(CompLevel::C1LimitedProfile),
            3 => Some(CompLevel::C1FullProfile),
            4 => Some(CompLevel::C2),
            -2 => Some(CompLevel::WaitForCompilation),
            -3 => Some(CompLevel::Skip),
            _ => None,
        }
    }

    /// True for the three C1 tiers.
    pub fn is_c1(self) -> bool {
        matches!(
            self,
            CompLevel::C1Simple | CompLevel::C1LimitedProfile | CompLevel::C1FullProfile
        )
    }

    /// True for the optimizing tier.
    pub fn is_c2(self) -> bool {
        self == CompLevel::C2
    }

    /// True for levels that name an actual compiler tier (1-4).
    pub fn is_concrete(self) -> bool {
        self.is_c1() || self.is_c2()
    }
}

impl fmt::Display for CompLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompLevel::Any => "ANY",
            CompLevel::C1Simple => "C1_SIMPLE",
            CompLevel::C1LimitedProfile => "C1_LIMITED_PROFILE",
            CompLevel::C1FullProfile => "C1_FULL_PROFILE",
            CompLevel::C2 => "C2",
            CompLevel::WaitForCompilation => "WAIT_FOR_COMPILATION",
            CompLevel::Skip => "SKIP",
        };
        f.write_str(name)
    }
}

impl FromStr for CompLevel {
    type Err = String;

    /// Accepts the symbolic names (case-insensitive) or the numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i32>() {
            return CompLevel::from_value(n)
                .ok_or_else(|| format!("unknown compilation level {}", n));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "ANY" => Ok(CompLevel::Any),
            "C1" | "C1_SIMPLE" => Ok(CompLevel::C1Simple),
            "C1_LIMITED_PROFILE" => Ok(CompLevel::C1LimitedProfile),
            "C1_FULL_PROFILE" => Ok(CompLevel::C1FullProfile),
            "C2" => Ok(CompLevel::C2),
            "WAIT_FOR_COMPILATION" => Ok(CompLevel::WaitForCompilation),
            "SKIP" => Ok(CompLevel::Skip),
            other => Err(format!("unknown compilation level '{}'", other)),
        }
    }
}
