//! Comparison operators used by IR `counts` constraints and flag clauses
//!
//! A constraint string is an optional comparator token followed by a literal,
//! e.g. `"> 0"`, `"!=3"`, `" 50"`. Whitespace around the token is
//! insignificant and a bare literal means `=`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One of `=`, `!=`, `<`, `<=`, `>`, `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed `comparator literal` pair. The literal is kept as text; its type
/// is only known to the caller (count, boolean flag, numeric flag, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The comparison operator
    pub comparator: Comparator,
    /// Literal right-hand side, trimmed
    pub literal: String,
}

/// Error when a constraint string cannot be split into comparator and literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// Nothing but whitespace
    Blank,
    /// A comparator token with no literal after it
    MissingLiteral {
        /// The comparator that was found
        comparator: Comparator,
    },
    /// Comparator-like garbage, e.g. `=>`, `<>` or `==`
    BadComparator {
        /// The offending leading token
        token: String,
    },
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintError::Blank => write!(f, "constraint is blank"),
            ConstraintError::MissingLiteral { comparator } => {
                write!(f, "comparator '{}' is not followed by a value", comparator)
            }
            ConstraintError::BadComparator { token } => write!(
                f,
                "invalid comparator '{}' (expected one of =, !=, <, <=, >, >=)",
                token
            ),
        }
    }
}

impl std::error::Error for ConstraintError {}

const OPERATOR_CHARS: &[char] = &['=', '!', '<', '>'];

impl Comparator {
    /// All comparators, longest tokens first so prefix parsing is unambiguous.
    const BY_TOKEN: [(&'static str, Comparator); 6] = [
        (">=", Comparator::Ge),
        ("<=", Comparator::Le),
        ("!=", Comparator::Ne),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
        ("=", Comparator::Eq),
    ];

    /// Source token of this comparator.
    pub fn token(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    /// Apply the comparator to an already computed ordering of `actual` vs `expected`.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
        }
    }

    /// Compare `actual <op> expected`. Incomparable values (NaN) never satisfy.
    pub fn compare<T: PartialOrd>(self, actual: &T, expected: &T) -> bool {
        match actual.partial_cmp(expected) {
            Some(ordering) => self.accepts(ordering),
            None => false,
        }
    }

    /// True for `=` and `!=`, the only comparators meaningful on booleans.
    pub fn is_equality(self) -> bool {
        matches!(self, Comparator::Eq | Comparator::Ne)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Constraint {
    /// Split `raw` into comparator and literal.
    pub fn parse(raw: &str) -> Result<Self, ConstraintError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConstraintError::Blank);
        }

        let op_len = trimmed
            .find(|c: char| !OPERATOR_CHARS.contains(&c))
            .unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(op_len);
        if token.is_empty() {
            return Ok(Constraint {
                comparator: Comparator::Eq,
                literal: trimmed.to_string(),
            });
        }

        let comparator = Comparator::BY_TOKEN
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, c)| *c)
            .ok_or_else(|| ConstraintError::BadComparator {
                token: token.to_string(),
            })?;

        let literal = rest.trim();
        if literal.is_empty() {
            return Err(ConstraintError::MissingLiteral { comparator });
        }
        Ok(Constraint {
            comparator,
            literal: literal.to_string(),
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.comparator, self.literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bare_literal_means_equals() {
        let c = Constraint::parse("50").unwrap();
        assert_eq!(c.comparator, Comparator::Eq);
        assert_eq!(c.literal, "50");
    }

    #[test]
    fn whitespace_is_insignificant() {
        for raw in [">49", "> 49", "  >   49  ", ">\t49"] {
            let c = Constraint::parse(raw).unwrap();
            assert_eq!(c.comparator, Comparator::Gt, "{:?}", raw);
            assert_eq!(c.literal, "49");
        }
    }

    #[test]
    fn two_char_tokens_win_over_prefixes() {
        assert_eq!(Constraint::parse(">=2").unwrap().comparator, Comparator::Ge);
        assert_eq!(Constraint::parse("<= 2").unwrap().comparator, Comparator::Le);
        assert_eq!(Constraint::parse("!= 2").unwrap().comparator, Comparator::Ne);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(Constraint::parse("   "), Err(ConstraintError::Blank));
        assert!(matches!(
            Constraint::parse("=> 3"),
            Err(ConstraintError::BadComparator { .. })
        ));
        assert!(matches!(
            Constraint::parse("== 3"),
            Err(ConstraintError::BadComparator { .. })
        ));
        assert!(matches!(
            Constraint::parse("<>3"),
            Err(ConstraintError::BadComparator { .. })
        ));
        assert_eq!(
            Constraint::parse(">="),
            Err(ConstraintError::MissingLiteral {
                comparator: Comparator::Ge
            })
        );
    }

    #[test]
    fn compare_matches_operator_semantics() {
        assert!(Comparator::Eq.compare(&50, &50));
        assert!(Comparator::Gt.compare(&50, &49));
        assert!(!Comparator::Lt.compare(&50, &50));
        assert!(Comparator::Ne.compare(&2, &1));
        assert!(!Comparator::Ne.compare(&1, &1));
        assert!(!Comparator::Eq.compare(&f64::NAN, &f64::NAN));
    }

    proptest! {
        #[test]
        fn parsed_comparator_agrees_with_integer_ordering(
            actual in -1000i64..1000,
            expected in -1000i64..1000,
            idx in 0usize..6,
            pad in 0usize..3,
        ) {
            let (token, comparator) = Comparator::BY_TOKEN[idx];
            let raw = format!("{}{}{}", token, " ".repeat(pad), expected);
            let parsed = Constraint::parse(&raw).unwrap();
            prop_assert_eq!(parsed.comparator, comparator);
            let literal: i64 = parsed.literal.parse().unwrap();
            let want = match comparator {
                Comparator::Eq => actual == literal,
                Comparator::Ne => actual != literal,
                Comparator::Lt => actual < literal,
                Comparator::Le => actual <= literal,
                Comparator::Gt => actual > literal,
                Comparator::Ge => actual >= literal,
            };
            prop_assert_eq!(parsed.comparator.compare(&actual, &literal), want);
        }
    }
}
