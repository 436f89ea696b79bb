//! Rules the compilation policy keeps from being verified.

use crate::common::*;
use jitcheck::nodes::STORE;
use jitcheck::{ClassDecl, IrAnnotation, MethodDecl, RuleOutcome, SkipReason};

fn class() -> ClassDecl {
    ClassDecl::new("pkg.Skip")
        .method(
            MethodDecl::new("t")
                .test()
                .ir(IrAnnotation::new().counts([STORE, "1"]))
                .ir(IrAnnotation::new().fail_on([STORE])),
        )
        .method(MethodDecl::new("plain").test())
}

fn dumps() -> Vec<Ir> {
    vec![Ir {
        method: "pkg.Skip::t",
        ideal: "  31  StoreI  === 5 7 30 29  [[ 40 ]]",
        assembly: "",
    }]
}

fn skipped_under(flags: &[&str]) -> Vec<RuleOutcome> {
    let verification = run_and_verify(&class(), flags, &dumps()).unwrap();
    assert!(verification.is_success(), "{}", verification.report());
    verification.results().iter().map(|r| r.outcome).collect()
}

#[test]
fn interpreter_only_skips_every_rule() {
    for flags in [&["-Xint"][..], &["-XX:-UseCompiler"][..]] {
        assert_eq!(
            skipped_under(flags),
            vec![RuleOutcome::Skipped(SkipReason::InterpreterOnly); 2]
        );
    }
}

#[test]
fn stopping_below_c2_skips_rules() {
    assert_eq!(
        skipped_under(&["-XX:TieredStopAtLevel=1"]),
        vec![RuleOutcome::Skipped(SkipReason::LevelUnreachable); 2]
    );
}

#[test]
fn disabled_tiered_compilation_skips_rules() {
    assert_eq!(
        skipped_under(&["-XX:-TieredCompilation"]),
        vec![RuleOutcome::Skipped(SkipReason::TieredCompilationDisabled); 2]
    );
}

#[test]
fn the_same_class_fails_once_c2_is_reachable() {
    let verification = run_and_verify(&class(), &[], &dumps()).unwrap();
    assert_eq!(verification.outcome("pkg.Skip::t", 1), Some(RuleOutcome::Passed));
    assert_eq!(verification.outcome("pkg.Skip::t", 2), Some(RuleOutcome::Failed));
    assert_eq!(verification.skipped().count(), 0);
}

#[test]
fn verification_serializes_outcomes_as_json() {
    let verification = run_and_verify(&class(), &["-Xint"], &dumps()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&verification.to_json().unwrap()).unwrap();

    let first = &json["results"][0];
    assert_eq!(first["method"], "pkg.Skip::t");
    assert_eq!(first["rule"], 1);
    assert_eq!(first["outcome"]["outcome"], "skipped");
    assert_eq!(first["outcome"]["reason"], "interpreter_only");
    assert_eq!(json["violations"].as_array().map(Vec::len), Some(0));
}
