//! Static validation of a test class
//!
//! The validator walks the declarations of a test class and its helper
//! classes and collects every format violation before anything executes. It
//! never stops at the first problem: each malformed piece contributes its own
//! unit, and units on the same subject are stacked into one block.
//!
//! Rule groups:
//! - `classes`: test class and helper class structure
//! - `roles`: `@Test`, `@Check`, `@Run`, `@Arguments`, `@Warmup`
//! - `control`: compiler control annotations
//! - `ir`: `@IR` annotations

mod classes;
mod control;
mod ir;
mod roles;

use crate::report::{self, FORMAT_HEADER};
use jitcheck_core::{
    ClassDecl, Error, FlagCatalog, MethodDecl, Result, Subject, Violation, ViolationUnit,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Ordered collection of violation blocks, one per subject.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    violations: Vec<Violation>,
}

impl Collector {
    /// Add one unit against `subject`.
    pub(crate) fn add(&mut self, subject: Subject, message: impl Into<String>) {
        let unit = ViolationUnit::format(message);
        match self
            .violations
            .iter_mut()
            .find(|v| v.subject == subject && v.rule.is_none())
        {
            Some(block) => block.push(unit),
            None => {
                let mut block = Violation::new(subject);
                block.push(unit);
                self.violations.push(block);
            }
        }
    }

    fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Cross-method lookups shared by the rule groups.
pub(crate) struct ClassIndex<'a> {
    pub(crate) class: &'a ClassDecl,
    first_tests: HashMap<&'a str, &'a MethodDecl>,
    check_claims: HashMap<&'a str, usize>,
    run_claims: HashMap<&'a str, usize>,
}

impl<'a> ClassIndex<'a> {
    fn build(class: &'a ClassDecl) -> Self {
        let mut first_tests = HashMap::new();
        for m in class.test_methods() {
            first_tests.entry(m.name.as_str()).or_insert(m);
        }

        let mut check_claims = HashMap::new();
        let mut run_claims = HashMap::new();
        for m in &class.methods {
            if let Some(check) = &m.annotations.check {
                let target = check.test.trim();
                if first_tests.contains_key(target) {
                    *check_claims.entry(target).or_insert(0) += 1;
                }
            }
            if let Some(run) = &m.annotations.run {
                let mut seen = HashSet::new();
                for target in run.tests.iter().map(|t| t.trim()) {
                    if first_tests.contains_key(target) && seen.insert(target) {
                        *run_claims.entry(target).or_insert(0) += 1;
                    }
                }
            }
        }

        Self {
            class,
            first_tests,
            check_claims,
            run_claims,
        }
    }

    pub(crate) fn subject(&self, method: &MethodDecl) -> Subject {
        Subject::method(method.qualified(&self.class.name))
    }

    /// The `@Test` method called `name` (the first one, if overloaded).
    pub(crate) fn test(&self, name: &str) -> Option<&'a MethodDecl> {
        self.first_tests.get(name).copied()
    }

    pub(crate) fn check_claims(&self, name: &str) -> usize {
        self.check_claims.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn run_claims(&self, name: &str) -> usize {
        self.run_claims.get(name).copied().unwrap_or(0)
    }

    /// `@Run` handlers whose target list contains `name`.
    pub(crate) fn runs_targeting(&self, name: &str) -> impl Iterator<Item = &'a MethodDecl> + '_ {
        let name = name.to_string();
        self.class.methods.iter().filter(move |m| {
            m.annotations
                .run
                .as_ref()
                .map(|r| r.tests.iter().any(|t| t.trim() == name))
                .unwrap_or(false)
        })
    }
}

/// Non-blank, trimmed targets of a `@Run`.
pub(crate) fn run_targets(method: &MethodDecl) -> Vec<&str> {
    method
        .annotations
        .run
        .as_ref()
        .map(|r| {
            r.tests
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Outcome of validating one test class.
#[derive(Debug, Clone, Default)]
pub struct FormatReport {
    violations: Vec<Violation>,
}

impl FormatReport {
    /// Violation blocks in discovery order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Total number of units (the trailer value).
    pub fn violation_count(&self) -> usize {
        report::total(&self.violations)
    }

    /// True if the class is well formed.
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Rendered report text.
    pub fn render(&self) -> String {
        report::render(FORMAT_HEADER, &self.violations)
    }

    /// `Ok` for a well formed class, otherwise [`Error::FormatViolation`].
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        Err(Error::FormatViolation {
            violations: self.violation_count(),
            report: self.render(),
        })
    }
}

/// Validator for test classes.
pub struct FormatValidator<'c> {
    catalog: &'c FlagCatalog,
}

impl<'c> FormatValidator<'c> {
    /// Validator resolving `@IR` flag clauses against `catalog`.
    pub fn new(catalog: &'c FlagCatalog) -> Self {
        Self { catalog }
    }

    /// Validate `class` together with its helper classes.
    pub fn validate(&self, class: &ClassDecl, helpers: &[ClassDecl]) -> FormatReport {
        let mut out = Collector::default();
        let index = ClassIndex::build(class);

        classes::check(class, helpers, &mut out);
        roles::check_tests(&index, &mut out);
        roles::check_handlers(&index, &mut out);
        control::check(class, &mut out);
        for helper in helpers {
            control::check(helper, &mut out);
        }
        ir::check(&index, self.catalog, &mut out);

        let report = FormatReport {
            violations: out.into_violations(),
        };
        if report.is_ok() {
            debug!(target: "jitcheck::format", class = %class.name, "Format validation passed");
        } else {
            warn!(
                target: "jitcheck::format",
                class = %class.name,
                violations = report.violation_count(),
                "Format validation failed"
            );
        }
        report
    }
}
