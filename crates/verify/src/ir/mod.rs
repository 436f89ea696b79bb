//! IR verification
//!
//! - `nodes`: node macro table
//! - `pattern`: compiling failOn/counts lists
//! - `dump`: test VM stdout protocol for IR dumps
//! - `matcher`: rule evaluation and outcomes

pub mod dump;
pub mod matcher;
pub mod nodes;
pub mod pattern;

pub use dump::{parse_output, render_dump, TestVmOutput};
pub use matcher::{check_rule, verify, IrVerification, RuleOutcome, RuleResult};
pub use pattern::{CountPattern, IrPattern, PatternError, Scope};
