//! Violation units
//!
//! A [`Violation`] is one printed block: a subject, an optional IR rule index
//! and a list of [`ViolationUnit`]s. The reported total is the sum of unit
//! counts, so one malformed declaration may contribute several units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a violation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    /// A class (test class or helper)
    Class,
    /// A method, named `Class::method`
    Method,
}

/// Qualified subject of a violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// Class or method
    pub kind: SubjectKind,
    /// Qualified name
    pub name: String,
}

impl Subject {
    /// Class subject.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Class,
            name: name.into(),
        }
    }

    /// Method subject, `qualified` being `Class::method`.
    pub fn method(qualified: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Method,
            name: qualified.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SubjectKind::Class => write!(f, "Class \"{}\"", self.name),
            SubjectKind::Method => write!(f, "Method \"{}\"", self.name),
        }
    }
}

/// IR check category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Forbidden patterns
    FailOn,
    /// Counted patterns
    Counts,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::FailOn => f.write_str("failOn"),
            Category::Counts => f.write_str("counts"),
        }
    }
}

/// One unit of non-conformance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationUnit {
    /// IR category, `None` for format violations
    pub category: Option<Category>,
    /// 1-based pattern index inside the category
    pub pattern: Option<usize>,
    /// Human readable text; may span several lines
    pub message: String,
}

impl ViolationUnit {
    /// Format violation unit.
    pub fn format(message: impl Into<String>) -> Self {
        Self {
            category: None,
            pattern: None,
            message: message.into(),
        }
    }

    /// IR unit for pattern `pattern` of `category`.
    pub fn ir(category: Category, pattern: usize, message: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            pattern: Some(pattern),
            message: message.into(),
        }
    }
}

/// IR dump of one compiled method, kept only while a failure needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrMatchEvidence {
    /// Qualified method name
    pub method: String,
    /// Ideal graph region
    pub ideal: String,
    /// Assembly region
    pub assembly: String,
}

/// A block of units against one subject (and IR rule, if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Offending class or method
    pub subject: Subject,
    /// 1-based IR rule index
    pub rule: Option<usize>,
    /// Short description of the rule, printed after the rule index
    pub summary: Option<String>,
    /// Units in discovery order
    pub units: Vec<ViolationUnit>,
    /// Dump the rule was matched against
    pub evidence: Option<IrMatchEvidence>,
}

impl Violation {
    /// Block for `subject` without units yet.
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            rule: None,
            summary: None,
            units: Vec::new(),
            evidence: None,
        }
    }

    /// Tag the block with an IR rule index and summary.
    pub fn for_rule(mut self, rule: usize, summary: impl Into<String>) -> Self {
        self.rule = Some(rule);
        self.summary = Some(summary.into());
        self
    }

    /// Append a unit.
    pub fn push(&mut self, unit: ViolationUnit) {
        self.units.push(unit);
    }

    /// Number of units, which is what this block adds to the total.
    pub fn count(&self) -> usize {
        self.units.len()
    }

    /// True if no units were recorded.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_display_names_kind() {
        assert_eq!(Subject::class("pkg.Foo").to_string(), "Class \"pkg.Foo\"");
        assert_eq!(
            Subject::method("pkg.Foo::bar").to_string(),
            "Method \"pkg.Foo::bar\""
        );
    }

    #[test]
    fn count_is_number_of_units() {
        let mut v = Violation::new(Subject::method("A::b")).for_rule(2, "counts");
        assert!(v.is_empty());
        v.push(ViolationUnit::ir(Category::Counts, 1, "x"));
        v.push(ViolationUnit::ir(Category::Counts, 3, "y"));
        assert_eq!(v.count(), 2);
        assert_eq!(v.rule, Some(2));
    }
}
