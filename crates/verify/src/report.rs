//! Violation report rendering
//!
//! The report text is a contract: consumers look for `Method "`, `@IR rule`,
//! `- failOn`, `- counts`, `Regex <idx>:` and read the total from the
//! trailing `Violations (<N>)` line. N is the number of units, which can be
//! larger than the number of printed blocks.

use jitcheck_core::{Category, Subject, Violation, ViolationUnit};

/// Header of a format validation report.
pub const FORMAT_HEADER: &str = "One or more format violations have been found in the test class:";

/// Header of an IR verification report.
pub const IR_HEADER: &str = "One or more @IR rules failed:";

/// Total number of units across `violations`.
pub fn total(violations: &[Violation]) -> usize {
    violations.iter().map(Violation::count).sum()
}

/// Render `violations` under `header`.
///
/// Blocks are grouped by subject in first-appearance order; within a subject
/// they are ordered by rule index, and units by category then pattern index.
pub fn render(header: &str, violations: &[Violation]) -> String {
    let mut subjects: Vec<&Subject> = Vec::new();
    for v in violations {
        if !subjects.contains(&&v.subject) {
            subjects.push(&v.subject);
        }
    }

    let mut out = String::new();
    out.push_str(header);
    out.push_str("\n\n");

    for subject in subjects {
        out.push_str(&format!(" - {}:\n", subject));
        let mut blocks: Vec<&Violation> = violations
            .iter()
            .filter(|v| &v.subject == subject && !v.is_empty())
            .collect();
        blocks.sort_by_key(|v| v.rule);
        for block in blocks {
            render_block(&mut out, block);
        }
    }

    out.push_str(&format!("\nViolations ({})\n", total(violations)));
    out
}

fn push_indented(out: &mut String, first: &str, rest: &str, text: &str) {
    for (i, line) in text.lines().enumerate() {
        out.push_str(if i == 0 { first } else { rest });
        out.push_str(line);
        out.push('\n');
    }
}

fn sorted_units(block: &Violation) -> Vec<&ViolationUnit> {
    let mut units: Vec<&ViolationUnit> = block.units.iter().collect();
    units.sort_by_key(|u| (u.category, u.pattern));
    units
}

fn render_block(out: &mut String, block: &Violation) {
    let Some(rule) = block.rule else {
        for unit in sorted_units(block) {
            push_indented(out, "   * ", "     ", &unit.message);
        }
        return;
    };

    out.push_str(&format!("   * @IR rule {}: ", rule));
    out.push_str(block.summary.as_deref().unwrap_or(""));
    out.push('\n');

    let mut current: Option<Option<Category>> = None;
    for unit in sorted_units(block) {
        if current != Some(unit.category) {
            current = Some(unit.category);
            match unit.category {
                Some(Category::FailOn) => {
                    out.push_str("     - failOn: Graph contains forbidden nodes:\n")
                }
                Some(Category::Counts) => {
                    out.push_str("     - counts: Graph contains wrong number of nodes:\n")
                }
                None => {}
            }
        }
        push_indented(out, "         ", "         ", &unit.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_subject_and_orders_by_rule() {
        let mut a2 = Violation::new(Subject::method("A::m")).for_rule(2, "@IR(...)");
        a2.push(ViolationUnit::ir(Category::Counts, 3, "Regex 3: x"));
        a2.push(ViolationUnit::ir(Category::FailOn, 1, "Regex 1: y"));
        let mut cls = Violation::new(Subject::class("A"));
        cls.push(ViolationUnit::format("no tests"));
        let mut a1 = Violation::new(Subject::method("A::m")).for_rule(1, "@IR(...)");
        a1.push(ViolationUnit::ir(Category::Counts, 1, "Regex 1: z"));

        let text = render(IR_HEADER, &[a2, cls, a1]);
        let method = text.find("Method \"A::m\"").unwrap();
        let class = text.find("Class \"A\"").unwrap();
        assert!(method < class);
        let rule1 = text.find("@IR rule 1").unwrap();
        let rule2 = text.find("@IR rule 2").unwrap();
        assert!(rule1 < rule2);
        let fail_on = text.find("- failOn").unwrap();
        let counts = text.rfind("- counts").unwrap();
        assert!(rule2 < fail_on && fail_on < counts);
        assert!(text.trim_end().ends_with("Violations (4)"));
    }

    #[test]
    fn multi_line_messages_are_indented() {
        let mut v = Violation::new(Subject::method("A::m")).for_rule(1, "@IR(...)");
        v.push(ViolationUnit::ir(
            Category::Counts,
            1,
            "Regex 1: p\n  - Failed comparison: [found] 2 = 1 [given]",
        ));
        let text = render(IR_HEADER, &[v]);
        assert!(text.contains("         Regex 1: p\n           - Failed comparison: [found] 2 = 1 [given]\n"));
    }
}
