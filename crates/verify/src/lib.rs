//! Static validation and IR verification for jitcheck
//!
//! - format: validates a test class declaration before anything executes
//! - applicability: flag comparators and `applyIf*` evaluation
//! - suite: immutable test specs derived from a validated class
//! - ir: node macros, pattern compilation, dump parsing and rule matching
//! - report: violation report rendering

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod applicability;
pub mod format;
pub mod ir;
pub mod report;
pub mod suite;

pub use applicability::{
    rule_applies, Applicability, Clause, ClauseError, Combinator, FlagComparator, LiteralError,
};
pub use format::{FormatReport, FormatValidator};
pub use ir::nodes;
pub use ir::{
    check_rule, parse_output, render_dump, verify, CountPattern, IrPattern, IrVerification,
    PatternError, RuleOutcome, RuleResult, Scope, TestVmOutput,
};
pub use report::{FORMAT_HEADER, IR_HEADER};
pub use suite::{summarize, CheckSpec, IrRuleSpec, RunSpec, TestSpec, TestSuite};
