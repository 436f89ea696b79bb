//! Violation counts for complete classes.

use crate::common::*;
use jitcheck::nodes::STORE;
use jitcheck::{
    Argument, CheckAt, ClassDecl, CompLevel, CompileControl, IrAnnotation, MethodDecl, Nesting,
    ParamType, RunMode,
};

fn well_formed() -> ClassDecl {
    ClassDecl::new("pkg.Good")
        .method(
            MethodDecl::new("sum")
                .param(ParamType::Int)
                .param(ParamType::Int)
                .returns(ParamType::Int)
                .test()
                .arguments([Argument::Number42, Argument::RandomEach]),
        )
        .method(
            MethodDecl::new("c")
                .returns(ParamType::Int)
                .test()
                .control(CompileControl::ForceCompile(CompLevel::C1Simple))
                .control(CompileControl::DontCompile(CompLevel::C2))
                .control(CompileControl::DontInline),
        )
        .method(
            MethodDecl::new("verifyC")
                .param(ParamType::Int)
                .param(ParamType::TestInfo)
                .check("c", CheckAt::Always),
        )
        .method(
            MethodDecl::new("a").test().ir(IrAnnotation::new()
                .counts([STORE, ">= 1"])
                .apply_if(["UseCompressedOops", "true"])),
        )
        .method(MethodDecl::new("b").test())
        .method(
            MethodDecl::new("driveAB")
                .param(ParamType::RunInfo)
                .run(["a", "b"], RunMode::Managed)
                .warmup(20),
        )
}

#[test]
fn well_formed_class_has_no_violations() {
    let report = validate(&well_formed(), &[ClassDecl::new("pkg.Util")]);
    assert!(report.is_ok(), "{}", report.render());
    assert_eq!(report.violation_count(), 0);
}

#[test]
fn independent_problems_are_all_counted() {
    let class = ClassDecl::new("pkg.Mixed")
        .method(MethodDecl::new("t").returns(ParamType::Int).test())
        // @Test combined with @Check
        .method(MethodDecl::new("bothRoles").test().check("t", CheckAt::Always))
        // negative warmup
        .method(MethodDecl::new("neg").test().warmup(-1))
        // @Check on a method that is not a test
        .method(MethodDecl::new("c").check("missing", CheckAt::Always))
        // one unresolved @Run target, the other resolves
        .method(MethodDecl::new("u").test())
        .method(MethodDecl::new("r").run(["u", "nope"], RunMode::Managed))
        // contradicting compiler control
        .method(
            MethodDecl::new("forced")
                .test()
                .control(CompileControl::ForceCompile(CompLevel::C2))
                .control(CompileControl::DontCompile(CompLevel::C2)),
        )
        .method(
            MethodDecl::new("inl")
                .control(CompileControl::ForceInline)
                .control(CompileControl::DontInline),
        )
        // @IR without failOn or counts
        .method(MethodDecl::new("badIr").test().ir(IrAnnotation::new()));

    assert_eq!(violations(&class), 7);
}

#[test]
fn helper_problems_add_to_the_class_total() {
    let class = ClassDecl::new("pkg.T").method(MethodDecl::new("t").test().warmup(-5));
    let helper = ClassDecl::new("pkg.T.Inner")
        .nesting(Nesting::Inner)
        .method(MethodDecl::new("x").test());
    let twin = ClassDecl::new("pkg.T").method(MethodDecl::new("y").test());

    let report = validate(&class, &[helper, twin]);
    // inner helper, role in helper, helper named like the class, role in
    // that helper, negative warmup
    assert_eq!(report.violation_count(), 5);
}

#[test]
fn static_nested_helpers_are_accepted() {
    let class = ClassDecl::new("pkg.T").method(MethodDecl::new("t").test());
    let helper = ClassDecl::new("pkg.T.Nested")
        .nesting(Nesting::StaticNested)
        .method(MethodDecl::new("util").control(CompileControl::DontInline));
    assert!(validate(&class, &[helper]).is_ok());
}
