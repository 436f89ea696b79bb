//! Rendered format reports and how they surface as errors.

use crate::common::*;
use jitcheck::nodes::LOAD;
use jitcheck::{
    CheckAt, ClassDecl, Error, FlagCatalog, IrAnnotation, MethodDecl, Nesting, TestSuite,
    FORMAT_HEADER,
};

fn broken() -> (ClassDecl, Vec<ClassDecl>) {
    let class = ClassDecl::new("pkg.Broken")
        .method(MethodDecl::new("neg").test().warmup(-1))
        .method(MethodDecl::new("c").check("missing", CheckAt::Always))
        .method(
            MethodDecl::new("rules")
                .test()
                .ir(IrAnnotation::new().counts([LOAD, "2"]))
                .ir(IrAnnotation::new()),
        );
    let helper = ClassDecl::new("pkg.Helper").nesting(Nesting::Inner);
    (class, vec![helper])
}

#[test]
fn report_lists_subjects_in_discovery_order() {
    let (class, helpers) = broken();
    let text = validate(&class, &helpers).render();

    assert!(text.starts_with(FORMAT_HEADER));
    let helper = text.find(" - Class \"pkg.Helper\":").unwrap();
    let neg = text.find(" - Method \"pkg.Broken::neg\":").unwrap();
    let check = text.find(" - Method \"pkg.Broken::c\":").unwrap();
    let rules = text.find(" - Method \"pkg.Broken::rules\":").unwrap();
    assert!(helper < neg && neg < check && check < rules);
    assert!(text.contains("invalid warmup value -1"));
    assert!(text.contains("@Check target 'missing' is not a @Test method"));
    assert!(text.contains("@IR rule 2: must specify failOn or counts"));
    assert!(!text.contains("@IR rule 1:"));
    assert!(text.trim_end().ends_with("Violations (4)"));
}

#[test]
fn derive_refuses_malformed_classes() {
    let (class, helpers) = broken();
    let err = TestSuite::derive(&class, &helpers, &FlagCatalog::standard()).unwrap_err();

    assert!(err.is_pre_execution());
    assert_eq!(err.violation_count(), Some(4));
    match err {
        Error::FormatViolation { report, .. } => {
            assert_eq!(report, validate(&class, &helpers).render());
        }
        other => panic!("expected a format violation, got {:?}", other),
    }
}

#[test]
fn error_display_is_the_report() {
    let class = ClassDecl::new("pkg.NoTests");
    let err = validate(&class, &[]).into_result().unwrap_err();
    let shown = err.to_string();
    assert!(shown.contains("Class \"pkg.NoTests\""));
    assert!(shown.contains("at least one @Test method"));
    assert!(shown.trim_end().ends_with("Violations (1)"));
}

#[test]
fn well_formed_class_derives_rules_in_declaration_order() {
    let class = ClassDecl::new("pkg.Ok").method(
        MethodDecl::new("t")
            .test()
            .ir(IrAnnotation::new().counts([LOAD, "1"]))
            .ir(IrAnnotation::new().fail_on([LOAD])),
    );
    let suite = TestSuite::derive(&class, &[], &FlagCatalog::standard()).unwrap();
    let indices: Vec<usize> = suite.rules().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(suite.test("t").unwrap().qualified, "pkg.Ok::t");
}
