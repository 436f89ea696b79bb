//! Compiling `failOn` / `counts` lists into regexes
//!
//! List elements are either node placeholders (`_#STORE_OF_CLASS#_`),
//! parameters of the preceding parameterized placeholder, count constraints
//! (`counts` only) or raw regexes. Raw regexes are matched against the ideal
//! and assembly regions separately, never against both at once.

use super::nodes::{self, NodeParam, Region};
use jitcheck_core::{Comparator, Constraint, IrMatchEvidence};
use regex::Regex;
use thiserror::Error;

/// Where a pattern is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the given region
    Region(Region),
    /// Each region on its own (raw regexes)
    EachRegion,
}

/// A compiled `failOn` or `counts` pattern.
#[derive(Debug, Clone)]
pub struct IrPattern {
    /// Expanded regex source, as printed in reports
    pub source: String,
    /// Compiled regex
    pub regex: Regex,
    /// Region(s) searched
    pub scope: Scope,
}

impl IrPattern {
    /// All non-overlapping matches in `dump`, ideal region first.
    pub fn find_all<'d>(&self, dump: &'d IrMatchEvidence) -> Vec<&'d str> {
        let regions: Vec<&'d str> = match self.scope {
            Scope::Region(Region::Ideal) => vec![dump.ideal.as_str()],
            Scope::Region(Region::Assembly) => vec![dump.assembly.as_str()],
            Scope::EachRegion => vec![dump.ideal.as_str(), dump.assembly.as_str()],
        };
        regions
            .into_iter()
            .flat_map(|text| self.regex.find_iter(text).map(|m| m.as_str()))
            .collect()
    }
}

/// A `counts` group: pattern plus expected count.
#[derive(Debug, Clone)]
pub struct CountPattern {
    /// The counted pattern
    pub pattern: IrPattern,
    /// Comparator applied as `actual <op> expected`
    pub comparator: Comparator,
    /// Expected count
    pub expected: u64,
}

impl CountPattern {
    /// Does `actual` satisfy the constraint?
    pub fn accepts(&self, actual: u64) -> bool {
        self.comparator.compare(&actual, &self.expected)
    }
}

/// A malformed list element. Each value is one violation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// `_#NAME#_` with an unknown name
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    /// Parameterized macro at the end of the list or followed by another placeholder
    #[error("node '{0}' requires a parameter")]
    MissingParameter(String),
    /// Raw regex (or expanded template) does not compile
    #[error("invalid regex '{pattern}': {reason}")]
    BadRegex {
        /// Offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },
    /// `counts` pattern without a constraint after it
    #[error("missing count constraint after '{0}'")]
    MissingConstraint(String),
    /// Constraint that is not `[comparator] non-negative integer`
    #[error("invalid count constraint '{constraint}' for '{pattern}': {reason}")]
    BadConstraint {
        /// Pattern the constraint belongs to
        pattern: String,
        /// Raw constraint
        constraint: String,
        /// What is wrong with it
        reason: String,
    },
}

fn is_placeholder(item: &str) -> bool {
    nodes::placeholder_name(item).is_some()
}

/// Read one pattern starting at `items[*pos]`, advancing past its parameter.
fn next_pattern(items: &[String], pos: &mut usize) -> Result<IrPattern, PatternError> {
    let item = &items[*pos];
    *pos += 1;

    let Some(name) = nodes::placeholder_name(item) else {
        let regex = Regex::new(item).map_err(|e| PatternError::BadRegex {
            pattern: item.clone(),
            reason: e.to_string(),
        })?;
        return Ok(IrPattern {
            source: item.clone(),
            regex,
            scope: Scope::EachRegion,
        });
    };

    let def = nodes::lookup(name).ok_or_else(|| PatternError::UnknownNode(name.to_string()))?;
    let param = match def.param {
        NodeParam::None => None,
        _ => match items.get(*pos) {
            Some(p) if !is_placeholder(p) && !p.trim().is_empty() => {
                *pos += 1;
                Some(p.as_str())
            }
            _ => return Err(PatternError::MissingParameter(name.to_string())),
        },
    };
    let source = def.expand(param);
    let regex = Regex::new(&source).map_err(|e| PatternError::BadRegex {
        pattern: source.clone(),
        reason: e.to_string(),
    })?;
    Ok(IrPattern {
        source,
        regex,
        scope: Scope::Region(def.region),
    })
}

/// Compile a `failOn` list. Every malformed element is reported.
pub fn compile_fail_on(items: &[String]) -> Result<Vec<IrPattern>, Vec<PatternError>> {
    let mut patterns = Vec::new();
    let mut errors = Vec::new();
    let mut pos = 0;
    while pos < items.len() {
        match next_pattern(items, &mut pos) {
            Ok(p) => patterns.push(p),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(patterns)
    } else {
        Err(errors)
    }
}

fn parse_count(pattern: &str, raw: &str) -> Result<(Comparator, u64), PatternError> {
    let bad = |reason: String| PatternError::BadConstraint {
        pattern: pattern.to_string(),
        constraint: raw.to_string(),
        reason,
    };
    let constraint = Constraint::parse(raw).map_err(|e| bad(e.to_string()))?;
    let expected = constraint
        .literal
        .parse::<u64>()
        .map_err(|_| bad("expected a non-negative integer".to_string()))?;
    Ok((constraint.comparator, expected))
}

/// Compile a `counts` list of `pattern [parameter] constraint` groups.
pub fn compile_counts(items: &[String]) -> Result<Vec<CountPattern>, Vec<PatternError>> {
    let mut counts = Vec::new();
    let mut errors = Vec::new();
    let mut pos = 0;
    while pos < items.len() {
        let label = items[pos].clone();
        let pattern = next_pattern(items, &mut pos);

        let constraint = match items.get(pos) {
            Some(c) if !is_placeholder(c) => {
                pos += 1;
                Some(c)
            }
            _ => None,
        };

        match (pattern, constraint) {
            (Err(e), _) => errors.push(e),
            (Ok(_), None) => errors.push(PatternError::MissingConstraint(label)),
            (Ok(pattern), Some(raw)) => match parse_count(&label, raw) {
                Ok((comparator, expected)) => counts.push(CountPattern {
                    pattern,
                    comparator,
                    expected,
                }),
                Err(e) => errors.push(e),
            },
        }
    }
    if errors.is_empty() {
        Ok(counts)
    } else {
        Err(errors)
    }
}
