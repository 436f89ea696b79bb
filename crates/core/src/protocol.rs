//! Stdout protocol between the test VM and the driver
//!
//! The test VM writes, for every test method carrying IR rules:
//!
//! ```text
//! ##### jitcheck-rules: {"method":"pkg.Foo::bar","level":"C2","rules":[...]}
//! ##### jitcheck-ir-dump: pkg.Foo::bar
//! --- ideal ---
//! <ideal graph text>
//! --- assembly ---
//! <assembly text>
//! ##### jitcheck-ir-dump-end
//! ```
//!
//! Everything else on stdout is ignored by the driver. Failures go to stderr.

use crate::error::{Error, Result};
use crate::level::CompLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker argument that turns a process into a test VM.
pub const TEST_VM_MARKER: &str = "--jitcheck-test-vm";

/// Prefix of a rule encoding line.
pub const RULES_PREFIX: &str = "##### jitcheck-rules: ";

/// Prefix of the line opening an IR dump; followed by the method name.
pub const DUMP_BEGIN: &str = "##### jitcheck-ir-dump: ";

/// Line closing an IR dump.
pub const DUMP_END: &str = "##### jitcheck-ir-dump-end";

/// Header of the ideal graph section.
pub const IDEAL_SECTION: &str = "--- ideal ---";

/// Header of the assembly section.
pub const ASSEMBLY_SECTION: &str = "--- assembly ---";

/// Why IR verification of a rule was skipped rather than performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The VM runs with `-Xint` or without a compiler
    InterpreterOnly,
    /// `-XX:-TieredCompilation`
    TieredCompilationDisabled,
    /// The requested level is above `TieredStopAtLevel` or otherwise unavailable
    LevelUnreachable,
    /// The owning test declared level `SKIP`
    TestSkipped,
    /// The method ended up compiled below C2, so there is no ideal graph to check
    NotC2Compiled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::InterpreterOnly => "interpreter-only execution",
            SkipReason::TieredCompilationDisabled => "tiered compilation disabled",
            SkipReason::LevelUnreachable => "requested compilation level unreachable",
            SkipReason::TestSkipped => "test declared compilation level SKIP",
            SkipReason::NotC2Compiled => "method not compiled by C2",
        };
        f.write_str(text)
    }
}

/// Per-rule status decided by the test VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Rule must be checked against the dump
    Applicable,
    /// Applicability clauses do not hold under the current flags
    NotApplicable,
    /// Compilation policy prevented verification
    Skipped,
}

/// Status of one rule of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// 1-based rule index
    pub index: usize,
    /// Decided status
    pub status: RuleStatus,
    /// Reason, for skipped rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

/// Rule statuses of one test method, as emitted by the test VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEncoding {
    /// Qualified method name
    pub method: String,
    /// Level the method was compiled at, if any
    pub level: Option<CompLevel>,
    /// One entry per `@IR` rule, in declaration order
    pub rules: Vec<RuleEntry>,
}

impl RuleEncoding {
    /// Render as a single protocol line (without trailing newline).
    pub fn to_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| Error::test_run(format!("cannot encode rules: {}", e)))?;
        Ok(format!("{}{}", RULES_PREFIX, json))
    }

    /// Parse a protocol line. Returns `Ok(None)` if `line` is not a rule line.
    pub fn from_line(line: &str) -> Result<Option<Self>> {
        let Some(json) = line.strip_prefix(RULES_PREFIX) else {
            return Ok(None);
        };
        serde_json::from_str(json)
            .map(Some)
            .map_err(|e| Error::test_run(format!("malformed rule encoding '{}': {}", json, e)))
    }

    /// Entry for rule `index`.
    pub fn entry(&self, index: usize) -> Option<&RuleEntry> {
        self.rules.iter().find(|r| r.index == index)
    }
}
