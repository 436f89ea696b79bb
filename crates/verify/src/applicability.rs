//! Flag-conditional IR rule applicability
//!
//! An `@IR` rule may carry at most one of `applyIf`, `applyIfNot`,
//! `applyIfAnd`, `applyIfOr`, each a flat `flag, value` list. Values are
//! constraint strings (`"> 49"`, `"!= true"`, bare `"50"` means `=`).
//!
//! [`FlagComparator`] evaluates one clause against an actual flag value;
//! [`Applicability::applies`] combines clauses.
//!
//! ## Flag types
//!
//! | Type | Comparators | Literal |
//! |------|-------------|---------|
//! | Boolean | `=`, `!=` | `true` / `false` |
//! | Integer | all six | `i64` |
//! | Floating | all six | `f64` |
//! | String | all six | anything; the clause always holds |

use jitcheck_core::{
    Comparator, Constraint, ConstraintError, Error, FlagCatalog, FlagSource, FlagType, FlagValue,
    IrAnnotation, Result,
};
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// How clauses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Exactly one clause, must hold
    If,
    /// Exactly one clause, must not hold
    IfNot,
    /// Two or more clauses, all must hold
    And,
    /// Two or more clauses, at least one must hold
    Or,
}

impl Combinator {
    /// Attribute name as written on `@IR`.
    pub fn attribute(self) -> &'static str {
        match self {
            Combinator::If => "applyIf",
            Combinator::IfNot => "applyIfNot",
            Combinator::And => "applyIfAnd",
            Combinator::Or => "applyIfOr",
        }
    }

    fn pair_count_ok(self, pairs: usize) -> bool {
        match self {
            Combinator::If | Combinator::IfNot => pairs == 1,
            Combinator::And | Combinator::Or => pairs >= 2,
        }
    }

    fn expected_pairs(self) -> &'static str {
        match self {
            Combinator::If | Combinator::IfNot => "exactly one",
            Combinator::And | Combinator::Or => "at least two",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Problem with a clause value, independent of the flag name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    /// Empty or whitespace-only value
    #[error("value is blank")]
    Blank,
    /// Comparator token could not be parsed
    #[error("{0}")]
    Constraint(String),
    /// Literal does not parse as the flag's type
    #[error("'{literal}' is not a valid {ty:?} value")]
    BadLiteral {
        /// Offending literal
        literal: String,
        /// Declared flag type
        ty: FlagType,
    },
    /// Ordering comparator used with a boolean flag
    #[error("comparator '{0}' cannot be used with a boolean flag (only = and !=)")]
    BooleanComparator(Comparator),
}

impl From<ConstraintError> for LiteralError {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::Blank => LiteralError::Blank,
            other => LiteralError::Constraint(other.to_string()),
        }
    }
}

/// A malformed applicability declaration. Each value is one violation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClauseError {
    /// Two or more combinators on the same rule
    #[error("only one of applyIf, applyIfNot, applyIfAnd, applyIfOr may be specified")]
    MultipleCombinators,
    /// Odd number of elements
    #[error("{combinator} expects flag/value pairs but has {len} element(s)")]
    OddArity {
        /// Offending combinator
        combinator: Combinator,
        /// Number of list elements
        len: usize,
    },
    /// Wrong number of pairs for the combinator
    #[error("{combinator} expects {} flag/value pair(s), found {pairs}", .combinator.expected_pairs())]
    WrongPairCount {
        /// Offending combinator
        combinator: Combinator,
        /// Number of pairs found
        pairs: usize,
    },
    /// Flag name is blank
    #[error("{combinator}: flag name is blank")]
    BlankFlag {
        /// Offending combinator
        combinator: Combinator,
    },
    /// Flag is not in the catalog
    #[error("{combinator}: unknown flag '{flag}'")]
    UnknownFlag {
        /// Offending combinator
        combinator: Combinator,
        /// Flag name
        flag: String,
    },
    /// Value is malformed for the flag
    #[error("{combinator}: value of flag '{flag}': {error}")]
    Value {
        /// Offending combinator
        combinator: Combinator,
        /// Flag name
        flag: String,
        /// What is wrong with it
        error: LiteralError,
    },
}

/// One `flag, value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Flag name, trimmed
    pub flag: String,
    /// Raw value with optional comparator
    pub value: String,
}

/// Parsed applicability of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applicability {
    /// How clauses combine
    pub combinator: Combinator,
    /// Clauses in declaration order
    pub clauses: Vec<Clause>,
}

/// Evaluates a single clause.
pub struct FlagComparator;

impl FlagComparator {
    /// Statically validate `raw` for a flag of type `ty`.
    pub fn check(ty: FlagType, raw: &str) -> std::result::Result<Constraint, LiteralError> {
        let constraint = Constraint::parse(raw)?;
        match ty {
            FlagType::Boolean => {
                if !constraint.comparator.is_equality() {
                    return Err(LiteralError::BooleanComparator(constraint.comparator));
                }
            }
            FlagType::Integer | FlagType::Floating | FlagType::String => {}
        }
        if FlagValue::parse(ty, &constraint.literal).is_none() {
            return Err(LiteralError::BadLiteral {
                literal: constraint.literal,
                ty,
            });
        }
        Ok(constraint)
    }

    /// Does `actual <comparator> literal` hold, for a flag of type `ty`?
    ///
    /// String flags always hold once the value is well formed.
    pub fn holds(ty: FlagType, raw: &str, actual: &FlagValue) -> Result<bool> {
        let constraint = Self::check(ty, raw)
            .map_err(|e| Error::test_run(format!("invalid flag value '{}': {}", raw, e)))?;
        let expected = FlagValue::parse(ty, &constraint.literal).ok_or_else(|| {
            Error::test_run(format!("invalid flag literal '{}'", constraint.literal))
        })?;
        let cmp = constraint.comparator;
        let holds = match (&expected, actual) {
            (FlagValue::Bool(e), FlagValue::Bool(a)) => cmp.compare(a, e),
            (FlagValue::Int(e), FlagValue::Int(a)) => cmp.compare(a, e),
            (FlagValue::Float(e), FlagValue::Float(a)) => cmp.compare(a, e),
            (FlagValue::Str(_), FlagValue::Str(_)) => true,
            _ => {
                return Err(Error::test_run(format!(
                    "flag value {} does not have declared type {:?}",
                    actual, ty
                )))
            }
        };
        Ok(holds)
    }
}

fn combinators(ir: &IrAnnotation) -> Vec<(Combinator, &[String])> {
    [
        (Combinator::If, ir.apply_if.as_slice()),
        (Combinator::IfNot, ir.apply_if_not.as_slice()),
        (Combinator::And, ir.apply_if_and.as_slice()),
        (Combinator::Or, ir.apply_if_or.as_slice()),
    ]
    .into_iter()
    .filter(|(_, items)| !items.is_empty())
    .collect()
}

fn check_clauses(
    combinator: Combinator,
    items: &[String],
    catalog: &FlagCatalog,
    errors: &mut Vec<ClauseError>,
) -> Vec<Clause> {
    if items.len() % 2 != 0 {
        errors.push(ClauseError::OddArity {
            combinator,
            len: items.len(),
        });
    } else if !combinator.pair_count_ok(items.len() / 2) {
        errors.push(ClauseError::WrongPairCount {
            combinator,
            pairs: items.len() / 2,
        });
    }

    let mut clauses = Vec::new();
    for pair in items.chunks_exact(2) {
        let flag = pair[0].trim();
        let value = &pair[1];
        if flag.is_empty() {
            errors.push(ClauseError::BlankFlag { combinator });
            continue;
        }
        let Some(ty) = catalog.flag_type(flag) else {
            errors.push(ClauseError::UnknownFlag {
                combinator,
                flag: flag.to_string(),
            });
            continue;
        };
        if let Err(error) = FlagComparator::check(ty, value) {
            errors.push(ClauseError::Value {
                combinator,
                flag: flag.to_string(),
                error,
            });
            continue;
        }
        clauses.push(Clause {
            flag: flag.to_string(),
            value: value.clone(),
        });
    }
    clauses
}

impl Applicability {
    /// Parse the applicability attributes of `ir`.
    ///
    /// `Ok(None)` means the rule always applies. On error every malformed
    /// piece is reported, never just the first.
    pub fn parse(
        ir: &IrAnnotation,
        catalog: &FlagCatalog,
    ) -> std::result::Result<Option<Applicability>, Vec<ClauseError>> {
        let present = combinators(ir);
        let mut errors = Vec::new();
        if present.len() > 1 {
            errors.push(ClauseError::MultipleCombinators);
        }

        let mut parsed = None;
        for (combinator, items) in present {
            let clauses = check_clauses(combinator, items, catalog, &mut errors);
            if parsed.is_none() {
                parsed = Some(Applicability {
                    combinator,
                    clauses,
                });
            }
        }

        if errors.is_empty() {
            Ok(parsed)
        } else {
            Err(errors)
        }
    }

    /// Decide whether the rule applies under `flags`.
    pub fn applies(&self, flags: &dyn FlagSource) -> Result<bool> {
        let mut results = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let actual = flags.flag(&clause.flag)?.ok_or_else(|| {
                Error::test_run(format!("flag '{}' is unknown to the VM", clause.flag))
            })?;
            let holds = FlagComparator::holds(actual.flag_type(), &clause.value, &actual)?;
            trace!(
                target: "jitcheck::applicability",
                flag = %clause.flag,
                value = %clause.value,
                actual = %actual,
                holds,
                "Evaluated clause"
            );
            results.push(holds);
        }

        let applies = match self.combinator {
            Combinator::If => results.first().copied().unwrap_or(false),
            Combinator::IfNot => !results.first().copied().unwrap_or(true),
            Combinator::And => results.iter().all(|h| *h),
            Combinator::Or => results.iter().any(|h| *h),
        };
        Ok(applies)
    }
}

/// `None` (no clauses) always applies.
pub fn rule_applies(applicability: Option<&Applicability>, flags: &dyn FlagSource) -> Result<bool> {
    match applicability {
        Some(a) => a.applies(flags),
        None => Ok(true),
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self
            .clauses
            .iter()
            .map(|c| format!("\"{}\", \"{}\"", c.flag, c.value))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} = {{{}}}", self.combinator, items)
    }
}
