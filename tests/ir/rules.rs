//! Rule outcomes against simulated IR.

use crate::common::*;
use jitcheck::nodes::{ALLOC, LOAD, STORE, STORE_I};
use jitcheck::{ClassDecl, Error, IrAnnotation, MethodDecl, RuleOutcome, IR_HEADER};

const ONE_STORE: &str = "  31  StoreI  === 5 7 30 29  [[ 40 ]]";
const TWO_STORES: &str = "  31  StoreI  === 5 7 30 29  [[ 40 ]]\n  32  StoreI  === 31 7 30 29  [[ 40 ]]";
const ALLOCATING: &str = "  0x20: call,static  wrapper for: _new_instance_Java";

fn single(rule: IrAnnotation) -> ClassDecl {
    ClassDecl::new("pkg.Ir").method(MethodDecl::new("t").test().ir(rule))
}

fn ir(ideal: &'static str, assembly: &'static str) -> Vec<Ir> {
    vec![Ir {
        method: "pkg.Ir::t",
        ideal,
        assembly,
    }]
}

#[test]
fn matching_counts_pass() {
    let class = single(IrAnnotation::new().counts([STORE, "1"]).fail_on([LOAD]));
    let verification = run_and_verify(&class, &[], &ir(ONE_STORE, "  0x10: ret")).unwrap();

    assert!(verification.is_success());
    assert_eq!(verification.outcome("pkg.Ir::t", 1), Some(RuleOutcome::Passed));
    assert_eq!(verification.violation_count(), 0);
    assert!(verification.ensure_passed(None).is_ok());
}

#[test]
fn failed_count_reports_found_and_given() {
    let class = single(IrAnnotation::new().counts([STORE_I, "1"]));
    let verification = run_and_verify(&class, &[], &ir(TWO_STORES, "")).unwrap();

    assert_eq!(verification.outcome("pkg.Ir::t", 1), Some(RuleOutcome::Failed));
    assert_eq!(verification.violation_count(), 1);
    let report = verification.report();
    assert!(report.starts_with(IR_HEADER));
    assert!(report.contains(" - Method \"pkg.Ir::t\":"));
    assert!(report.contains("   * @IR rule 1: "));
    assert!(report.contains("Failed comparison: [found] 2 = 1 [given]"));
    assert!(report.contains("32  StoreI"));
    assert!(report.trim_end().ends_with("Violations (1)"));
}

#[test]
fn fail_on_checks_the_assembly_region() {
    let class = single(IrAnnotation::new().fail_on([ALLOC]));
    let verification = run_and_verify(&class, &[], &ir(ONE_STORE, ALLOCATING)).unwrap();

    assert!(!verification.is_success());
    let report = verification.report();
    assert!(report.contains("     - failOn: Graph contains forbidden nodes:"));
    assert!(report.contains("Matched forbidden node(s) (1):"));
    assert!(report.contains("_new_instance_Java"));
}

#[test]
fn violations_surface_as_ir_errors() {
    let class = single(IrAnnotation::new().counts([STORE, "0"]));
    let verification = run_and_verify(&class, &[], &ir(TWO_STORES, "")).unwrap();

    match verification.ensure_passed(Some(3)) {
        Err(Error::IrViolation {
            scenario,
            violations,
            report,
        }) => {
            assert_eq!(scenario, Some(3));
            assert_eq!(violations, 1);
            assert_eq!(report, verification.report());
        }
        other => panic!("expected an IR violation, got {:?}", other),
    }
}

#[test]
fn apply_if_selects_rules_by_flag() {
    let class = single(
        IrAnnotation::new()
            .counts([STORE, "2"])
            .apply_if(["UseCompressedOops", "false"]),
    );

    let default = run_and_verify(&class, &[], &ir(ONE_STORE, "")).unwrap();
    assert_eq!(
        default.outcome("pkg.Ir::t", 1),
        Some(RuleOutcome::NotApplicable)
    );
    assert!(default.is_success());

    let disabled =
        run_and_verify(&class, &["-XX:-UseCompressedOops"], &ir(ONE_STORE, "")).unwrap();
    assert_eq!(disabled.outcome("pkg.Ir::t", 1), Some(RuleOutcome::Failed));
}

#[test]
fn rules_of_one_method_are_reported_by_index() {
    let class = ClassDecl::new("pkg.Ir").method(
        MethodDecl::new("t")
            .test()
            .ir(IrAnnotation::new().counts([STORE, "1"]))
            .ir(IrAnnotation::new().counts([STORE, "3"]))
            .ir(IrAnnotation::new().fail_on([STORE])),
    );
    let verification = run_and_verify(&class, &[], &ir(ONE_STORE, "")).unwrap();

    let outcomes: Vec<RuleOutcome> = verification.results().iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![RuleOutcome::Passed, RuleOutcome::Failed, RuleOutcome::Failed]
    );
    let report = verification.report();
    let second = report.find("@IR rule 2:").unwrap();
    let third = report.find("@IR rule 3:").unwrap();
    assert!(second < third);
    assert!(report.trim_end().ends_with("Violations (2)"));
}
