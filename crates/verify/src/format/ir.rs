//! `@IR` annotations: placement, applicability clauses and patterns.

use super::{ClassIndex, Collector};
use crate::applicability::Applicability;
use crate::ir::pattern::{compile_counts, compile_fail_on};
use jitcheck_core::FlagCatalog;

pub(super) fn check(index: &ClassIndex<'_>, catalog: &FlagCatalog, out: &mut Collector) {
    for method in &index.class.methods {
        let rules = &method.annotations.ir;
        if rules.is_empty() {
            continue;
        }
        let subject = index.subject(method);
        if method.annotations.test.is_none() {
            out.add(subject, "@IR is only allowed on @Test methods");
            continue;
        }

        for (i, rule) in rules.iter().enumerate() {
            let prefix = format!("@IR rule {}: ", i + 1);
            if rule.fail_on.is_empty() && rule.counts.is_empty() {
                out.add(
                    subject.clone(),
                    format!("{}must specify failOn or counts", prefix),
                );
            }
            if let Err(errors) = Applicability::parse(rule, catalog) {
                for error in errors {
                    out.add(subject.clone(), format!("{}{}", prefix, error));
                }
            }
            if let Err(errors) = compile_fail_on(&rule.fail_on) {
                for error in errors {
                    out.add(subject.clone(), format!("{}failOn: {}", prefix, error));
                }
            }
            if let Err(errors) = compile_counts(&rule.counts) {
                for error in errors {
                    out.add(subject.clone(), format!("{}counts: {}", prefix, error));
                }
            }
        }
    }
}
