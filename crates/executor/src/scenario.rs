//! Flag scenarios
//!
//! A scenario is one VM flag configuration the whole test class runs under,
//! in its own test VM process.

use jitcheck_core::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

/// One named VM flag configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Unique index, used in failure reports
    pub index: u32,
    /// Flags appended to the driver's base flags
    pub flags: Vec<String>,
}

impl Scenario {
    /// Scenario `index` running with `flags`.
    pub fn new<I, S>(index: u32, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one flag.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scenario #{}: [{}]", self.index, self.flags.join(", "))
    }
}

/// Parse a scenario index selection such as `"1, 3,5"`.
///
/// # Errors
///
/// [`Error::InvalidSelection`] for an empty selection, an empty entry, or an
/// entry that is not a non-negative integer.
pub fn parse_selection(raw: &str) -> Result<BTreeSet<u32>> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidSelection(
            "scenario selection is empty".to_string(),
        ));
    }
    raw.split(',')
        .map(|entry| {
            let entry = entry.trim();
            entry.parse::<u32>().map_err(|_| {
                Error::InvalidSelection(format!(
                    "'{}' in scenario selection '{}' is not a non-negative integer",
                    entry, raw
                ))
            })
        })
        .collect()
}

/// Split a comma separated list of test names, dropping blanks.
pub fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_accepts_whitespace() {
        let parsed = parse_selection(" 3, 1,1 ,2").unwrap();
        assert_eq!(parsed.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn malformed_selection_is_distinguishable() {
        for raw in ["", "  ", "1,,2", "-1", "a", "1;2", "1.5"] {
            assert!(
                matches!(parse_selection(raw), Err(Error::InvalidSelection(_))),
                "{:?}",
                raw
            );
        }
    }

    #[test]
    fn names_drop_blanks() {
        assert_eq!(parse_names("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_names(" , ").is_empty());
    }

    #[test]
    fn display_lists_flags() {
        let s = Scenario::new(2, ["-Xint"]).with_flag("-XX:+UseNewCode");
        assert_eq!(s.to_string(), "Scenario #2: [-Xint, -XX:+UseNewCode]");
    }
}
