//! IR rule evaluation
//!
//! - failOn: patterns are tried in order; the first one with a match fails
//!   the category and is the only one reported.
//! - counts: every pattern is counted; each failing comparison is one unit.
//!
//! Both categories are always evaluated. A rule yields at most one
//! [`Violation`] block, with failOn units ahead of counts units.

use super::dump::TestVmOutput;
use crate::report::{self, IR_HEADER};
use crate::suite::{IrRuleSpec, TestSuite};
use jitcheck_core::{
    Category, Error, IrMatchEvidence, Result, RuleStatus, SkipReason, Subject, Violation,
    ViolationUnit,
};
use serde::Serialize;
use std::fmt::Write;
use tracing::{debug, info};

/// Result of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum RuleOutcome {
    /// Rule applied and held
    Passed,
    /// Rule applied and failed
    Failed,
    /// Applicability clauses did not hold
    NotApplicable,
    /// Compilation policy prevented verification
    Skipped(SkipReason),
}

/// Outcome of one rule of one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    /// Qualified method name
    pub method: String,
    /// 1-based rule index
    pub rule: usize,
    /// What happened
    pub outcome: RuleOutcome,
}

/// Outcome of verifying a whole test VM run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IrVerification {
    results: Vec<RuleResult>,
    violations: Vec<Violation>,
}

fn bullet_list(out: &mut String, title: &str, matches: &[&str]) {
    let _ = writeln!(out, "  - {} ({}):", title, matches.len());
    for m in matches {
        let _ = writeln!(out, "    * {}", m.trim());
    }
}

fn fail_on_unit(rule: &IrRuleSpec, dump: &IrMatchEvidence) -> Option<ViolationUnit> {
    rule.fail_on.iter().enumerate().find_map(|(i, pattern)| {
        let matches = pattern.find_all(dump);
        if matches.is_empty() {
            return None;
        }
        let mut msg = format!("Regex {}: {}\n", i + 1, pattern.source);
        bullet_list(&mut msg, "Matched forbidden node(s)", &matches);
        Some(ViolationUnit::ir(Category::FailOn, i + 1, msg.trim_end()))
    })
}

fn counts_units(rule: &IrRuleSpec, dump: &IrMatchEvidence) -> Vec<ViolationUnit> {
    let mut units = Vec::new();
    for (i, count) in rule.counts.iter().enumerate() {
        let matches = count.pattern.find_all(dump);
        let actual = matches.len() as u64;
        if count.accepts(actual) {
            continue;
        }
        let mut msg = format!(
            "Regex {}: {}\n  - Failed comparison: [found] {} {} {} [given]\n",
            i + 1,
            count.pattern.source,
            actual,
            count.comparator,
            count.expected
        );
        if matches.is_empty() {
            msg.push_str("  - No nodes matched!\n");
        } else {
            bullet_list(&mut msg, "Matched node(s)", &matches);
        }
        units.push(ViolationUnit::ir(Category::Counts, i + 1, msg.trim_end()));
    }
    units
}

/// Evaluate one applicable rule against a dump. `None` if it holds.
pub fn check_rule(rule: &IrRuleSpec, dump: &IrMatchEvidence) -> Option<Violation> {
    let mut violation =
        Violation::new(Subject::method(&rule.owner)).for_rule(rule.index, &rule.summary);
    if let Some(unit) = fail_on_unit(rule, dump) {
        violation.push(unit);
    }
    for unit in counts_units(rule, dump) {
        violation.push(unit);
    }
    if violation.is_empty() {
        return None;
    }
    violation.evidence = Some(dump.clone());
    Some(violation)
}

/// Verify every IR rule of `suite` against a test VM run.
///
/// Tests the test VM did not report on (deselected) are ignored. A rule marked
/// applicable without a dump for its method is an error.
pub fn verify(suite: &TestSuite, output: &TestVmOutput) -> Result<IrVerification> {
    let mut verification = IrVerification::default();
    for test in suite.tests.iter().filter(|t| !t.rules.is_empty()) {
        let Some(encoding) = output.rules_for(&test.qualified) else {
            debug!(target: "jitcheck::ir", method = %test.qualified, "No rule encoding, test not run");
            continue;
        };
        for rule in &test.rules {
            let entry = encoding.entry(rule.index).ok_or_else(|| {
                Error::test_run(format!(
                    "test VM reported no status for {} @IR rule {}",
                    test.qualified, rule.index
                ))
            })?;
            let outcome = match entry.status {
                RuleStatus::NotApplicable => RuleOutcome::NotApplicable,
                RuleStatus::Skipped => {
                    RuleOutcome::Skipped(entry.reason.unwrap_or(SkipReason::NotC2Compiled))
                }
                RuleStatus::Applicable => {
                    let dump = output.dumps.get(&test.qualified).ok_or_else(|| {
                        Error::test_run(format!("no IR dump for {}", test.qualified))
                    })?;
                    match check_rule(rule, dump) {
                        Some(v) => {
                            verification.violations.push(v);
                            RuleOutcome::Failed
                        }
                        None => RuleOutcome::Passed,
                    }
                }
            };
            debug!(
                target: "jitcheck::ir",
                method = %test.qualified,
                rule = rule.index,
                outcome = ?outcome,
                "Verified rule"
            );
            verification.results.push(RuleResult {
                method: test.qualified.clone(),
                rule: rule.index,
                outcome,
            });
        }
    }
    info!(
        target: "jitcheck::ir",
        class = %suite.class,
        rules = verification.results.len(),
        violations = verification.violation_count(),
        "IR verification finished"
    );
    Ok(verification)
}

impl IrVerification {
    /// Per-rule outcomes in verification order.
    pub fn results(&self) -> &[RuleResult] {
        &self.results
    }

    /// Rules whose verification was skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &RuleResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Skipped(_)))
    }

    /// Outcome of rule `rule` of `method`.
    pub fn outcome(&self, method: &str, rule: usize) -> Option<RuleOutcome> {
        self.results
            .iter()
            .find(|r| r.method == method && r.rule == rule)
            .map(|r| r.outcome)
    }

    /// Failing rule blocks.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Total number of violation units.
    pub fn violation_count(&self) -> usize {
        report::total(&self.violations)
    }

    /// True if no rule failed.
    pub fn is_success(&self) -> bool {
        self.violations.is_empty()
    }

    /// Rendered report text.
    pub fn report(&self) -> String {
        report::render(IR_HEADER, &self.violations)
    }

    /// JSON summary of the per-rule outcomes and violations.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::test_run(format!("cannot serialize verification: {}", e)))
    }

    /// `Ok` if no rule failed, otherwise [`Error::IrViolation`].
    pub fn ensure_passed(&self, scenario: Option<u32>) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(Error::IrViolation {
            scenario,
            violations: self.violation_count(),
            report: self.report(),
        })
    }
}
