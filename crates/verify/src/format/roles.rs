//! `@Test`, `@Check` and `@Run` roles and their companion annotations.

use super::{run_targets, ClassIndex, Collector};
use jitcheck_core::{Argument, MethodDecl, ParamType, RunMode, Subject};
use std::collections::HashSet;

fn argument_problem(arg: Argument, ty: &ParamType) -> Option<&'static str> {
    if ty.is_info_handle() {
        return None;
    }
    if arg.is_boolean_only() && *ty != ParamType::Boolean {
        return Some("boolean value on a non-boolean parameter");
    }
    if arg.is_numeric_only() && !ty.is_numeric() {
        return Some("numeric value on a non-numeric parameter");
    }
    if arg.is_random() && ty.is_reference() {
        return Some("random value on a reference parameter");
    }
    if let (Argument::Default, ParamType::Object(class)) = (arg, ty) {
        if class.default_ctor.is_none() {
            return Some("reference type without a no-arg constructor");
        }
    }
    None
}

fn check_warmup(value: i64, subject: &Subject, out: &mut Collector) {
    if value < 0 {
        out.add(subject.clone(), format!("invalid warmup value {}", value));
    }
}

/// Rules on methods carrying `@Test`, plus stray `@Arguments`/`@Warmup`.
pub(super) fn check_tests(index: &ClassIndex<'_>, out: &mut Collector) {
    for method in &index.class.methods {
        let ann = &method.annotations;
        let subject = index.subject(method);

        if ann.test.is_none() {
            if ann.arguments.is_some() {
                out.add(subject.clone(), "@Arguments is only allowed on @Test methods");
            }
            if let Some(warmup) = ann.warmup {
                check_warmup(warmup, &subject, out);
                match &ann.run {
                    None => out.add(
                        subject.clone(),
                        "@Warmup is only allowed on @Test and @Run methods",
                    ),
                    Some(run) if run.mode == RunMode::Standalone => out.add(
                        subject.clone(),
                        "STANDALONE @Run is invoked once, @Warmup does not apply",
                    ),
                    Some(_) => {}
                }
            }
            continue;
        }

        let name = method.name.as_str();
        if let Some(first) = index.test(name) {
            if !std::ptr::eq(first, method) {
                out.add(
                    subject.clone(),
                    format!("only one overload of '{}' may carry @Test", name),
                );
            }
        }
        if ann.check.is_some() {
            out.add(subject.clone(), "@Test cannot be combined with @Check");
        }
        if ann.run.is_some() {
            out.add(subject.clone(), "@Test cannot be combined with @Run");
        }

        for (i, param) in method.params.iter().enumerate() {
            if param.is_info_handle() {
                out.add(
                    subject.clone(),
                    format!("@Test parameter {} uses reserved type {}", i, param),
                );
            }
        }
        if method.returns.is_info_handle() {
            out.add(
                subject.clone(),
                format!("@Test return type uses reserved type {}", method.returns),
            );
        }

        let claimed_by_run = index.run_claims(name) > 0;
        if index.check_claims(name) > 0 && claimed_by_run {
            out.add(
                subject.clone(),
                format!("test '{}' is targeted by both a @Check and a @Run", name),
            );
        }

        // reserved handles are already reported above
        let needs_values = method.params.iter().any(|p| !p.is_info_handle());
        if needs_values && ann.arguments.is_none() && !claimed_by_run {
            out.add(
                subject.clone(),
                "@Test with parameters needs @Arguments or a @Run method",
            );
        }

        if let Some(args) = &ann.arguments {
            if args.len() != method.params.len() {
                out.add(
                    subject.clone(),
                    format!(
                        "@Arguments has {} values but the method declares {} parameters",
                        args.len(),
                        method.params.len()
                    ),
                );
            } else {
                for (i, (arg, ty)) in args.iter().zip(&method.params).enumerate() {
                    if let Some(problem) = argument_problem(*arg, ty) {
                        out.add(
                            subject.clone(),
                            format!("@Arguments value {:?} for parameter {} ({}): {}", arg, i, ty, problem),
                        );
                    }
                }
            }
            if index.runs_targeting(name).any(|r| run_targets(r).len() == 1) {
                out.add(
                    subject.clone(),
                    "@Arguments is not allowed on a test invoked by a single-target @Run",
                );
            }
        }

        if let Some(warmup) = ann.warmup {
            check_warmup(warmup, &subject, out);
            if claimed_by_run {
                out.add(
                    subject.clone(),
                    "@Warmup on a test invoked by @Run has no effect, declare it on the @Run",
                );
            }
        }
    }
}

fn check_signature(index: &ClassIndex<'_>, method: &MethodDecl, subject: &Subject, out: &mut Collector) {
    let params = &method.params;
    if params.len() > 2 {
        out.add(subject.clone(), "@Check may declare at most two parameters");
    }
    for param in params.iter().filter(|p| **p == ParamType::RunInfo) {
        out.add(
            subject.clone(),
            format!("{} cannot be used in a @Check, use TestInfo", param),
        );
    }
    if params.len() == 2 && params[0].is_info_handle() && !params[1].is_info_handle() {
        out.add(
            subject.clone(),
            "the return value parameter must come before the TestInfo parameter",
        );
    }

    let Some(check) = &method.annotations.check else {
        return;
    };
    let Some(test) = index.test(check.test.trim()) else {
        return;
    };
    if let Some(value) = params.iter().find(|p| !p.is_info_handle()) {
        if test.returns == ParamType::Void {
            out.add(
                subject.clone(),
                format!("test '{}' returns void, @Check cannot take its return value", test.name),
            );
        } else if *value != test.returns {
            out.add(
                subject.clone(),
                format!(
                    "@Check parameter type {} does not match return type {} of '{}'",
                    value, test.returns, test.name
                ),
            );
        }
    }
}

/// Rules on `@Check` and `@Run` handlers.
pub(super) fn check_handlers(index: &ClassIndex<'_>, out: &mut Collector) {
    for method in &index.class.methods {
        let ann = &method.annotations;
        let subject = index.subject(method);

        if ann.check.is_some() && ann.run.is_some() {
            out.add(subject.clone(), "method cannot carry both @Check and @Run");
        }

        if let Some(check) = &ann.check {
            let target = check.test.trim();
            if target.is_empty() {
                out.add(subject.clone(), "@Check target is empty");
            } else if index.test(target).is_none() {
                out.add(
                    subject.clone(),
                    format!("@Check target '{}' is not a @Test method", target),
                );
            } else if index.check_claims(target) > 1 {
                out.add(
                    subject.clone(),
                    format!("test '{}' is targeted by more than one @Check", target),
                );
            }
            check_signature(index, method, &subject, out);
        }

        if let Some(run) = &ann.run {
            let targets = run_targets(method);
            if targets.is_empty() {
                out.add(subject.clone(), "@Run target list is empty");
            } else if targets.len() != run.tests.len() {
                out.add(subject.clone(), "@Run target list contains a blank name");
            }

            let mut seen = HashSet::new();
            let mut resolved = Vec::new();
            for target in &targets {
                if !seen.insert(*target) {
                    out.add(
                        subject.clone(),
                        format!("@Run target '{}' is listed more than once", target),
                    );
                } else if index.test(target).is_none() {
                    out.add(
                        subject.clone(),
                        format!("@Run target '{}' is not a @Test method", target),
                    );
                } else {
                    resolved.push(*target);
                }
            }
            for target in &resolved {
                if index.run_claims(target) > 1 {
                    out.add(
                        subject.clone(),
                        format!("test '{}' is targeted by more than one @Run", target),
                    );
                }
            }
            if targets.len() > 1
                && resolved
                    .iter()
                    .filter_map(|t| index.test(t))
                    .any(|t| t.annotations.arguments.is_some())
            {
                out.add(
                    subject.clone(),
                    "multi-target @Run cannot invoke tests that declare @Arguments",
                );
            }

            for (i, param) in method.params.iter().enumerate() {
                match param {
                    ParamType::RunInfo => {}
                    ParamType::TestInfo => out.add(
                        subject.clone(),
                        "TestInfo cannot be used in a @Run, use RunInfo",
                    ),
                    other => out.add(
                        subject.clone(),
                        format!("@Run parameter {} must be RunInfo, found {}", i, other),
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::FormatValidator;
    use jitcheck_core::{
        Argument, CheckAt, ClassDecl, ClassRef, FlagCatalog, MethodDecl, ParamType, RunMode,
    };

    fn count(class: ClassDecl) -> usize {
        FormatValidator::new(&FlagCatalog::standard())
            .validate(&class, &[])
            .violation_count()
    }

    fn base() -> ClassDecl {
        ClassDecl::new("A").method(MethodDecl::new("t").returns(ParamType::Int).test())
    }

    #[test]
    fn extra_overloads_are_reported() {
        let class = base().method(
            MethodDecl::new("t")
                .param(ParamType::Int)
                .arguments([Argument::Default])
                .test(),
        );
        assert_eq!(count(class), 1);
    }

    #[test]
    fn roles_cannot_be_mixed() {
        let class = base().method(
            MethodDecl::new("u")
                .test()
                .check("t", CheckAt::Always)
                .run(["t"], RunMode::Managed),
        );
        // @Test+@Check, @Test+@Run, @Check+@Run, t claimed by both
        assert_eq!(count(class), 4);
    }

    #[test]
    fn reserved_types_on_tests() {
        let class = base().method(
            MethodDecl::new("r")
                .param(ParamType::TestInfo)
                .param(ParamType::RunInfo)
                .returns(ParamType::TestInfo)
                .arguments([Argument::Default, Argument::Default])
                .test(),
        );
        assert_eq!(count(class), 3);
    }

    #[test]
    fn reserved_only_parameters_are_one_mistake() {
        let class = base().method(MethodDecl::new("r").param(ParamType::TestInfo).test());
        assert_eq!(count(class), 1);

        let mixed = base().method(
            MethodDecl::new("m")
                .param(ParamType::Int)
                .param(ParamType::TestInfo)
                .test(),
        );
        // reserved parameter, plus the int still lacking a value
        assert_eq!(count(mixed), 2);
    }

    #[test]
    fn arguments_validation() {
        let no_ctor = ParamType::Object(ClassRef::new("pkg.NoCtor"));
        let class = base()
            .method(MethodDecl::new("missing").param(ParamType::Int).test())
            .method(
                MethodDecl::new("arity")
                    .param(ParamType::Int)
                    .arguments([Argument::Default, Argument::Default])
                    .test(),
            )
            .method(
                MethodDecl::new("kinds")
                    .param(ParamType::Int)
                    .param(ParamType::Boolean)
                    .param(no_ctor.clone())
                    .param(no_ctor)
                    .arguments([
                        Argument::True,
                        Argument::Max,
                        Argument::RandomEach,
                        Argument::Default,
                    ])
                    .test(),
            )
            .method(MethodDecl::new("stray").arguments([Argument::Default]));
        assert_eq!(count(class), 1 + 1 + 4 + 1);
    }

    #[test]
    fn warmup_rules() {
        let class = base()
            .method(MethodDecl::new("neg").test().warmup(-1))
            .method(MethodDecl::new("ran").test().warmup(5))
            .method(MethodDecl::new("runner").run(["ran"], RunMode::Managed).warmup(10))
            .method(MethodDecl::new("alone").run(["t"], RunMode::Standalone).warmup(-3))
            .method(MethodDecl::new("plain").warmup(1));
        // neg: 1, ran: 1, alone: invalid + standalone, plain: 1
        assert_eq!(count(class), 5);
    }

    #[test]
    fn duplicate_claimants_are_all_counted() {
        let class = base()
            .method(MethodDecl::new("c1").check("t", CheckAt::Always))
            .method(MethodDecl::new("c2").check("t", CheckAt::Always));
        assert_eq!(count(class), 2);
    }

    #[test]
    fn run_target_lists() {
        let class = base()
            .method(MethodDecl::new("u").test())
            .method(MethodDecl::new("empty").run(Vec::<String>::new(), RunMode::Managed))
            .method(MethodDecl::new("unknown").run(["nope", "u"], RunMode::Managed))
            .method(MethodDecl::new("dup").run(["t", "t"], RunMode::Managed));
        // empty, unknown, duplicate
        assert_eq!(count(class), 3);
    }

    #[test]
    fn multi_target_run_with_arguments() {
        let class = base()
            .method(
                MethodDecl::new("p")
                    .param(ParamType::Int)
                    .arguments([Argument::Number42])
                    .test(),
            )
            .method(MethodDecl::new("both").run(["t", "p"], RunMode::Managed));
        assert_eq!(count(class), 1);
    }

    #[test]
    fn arguments_on_single_target_run() {
        let class = base()
            .method(
                MethodDecl::new("p")
                    .param(ParamType::Int)
                    .arguments([Argument::Number42])
                    .test(),
            )
            .method(MethodDecl::new("r").run(["p"], RunMode::Managed));
        assert_eq!(count(class), 1);
    }

    #[test]
    fn check_signatures() {
        let class = base()
            .method(MethodDecl::new("v").test())
            .method(
                MethodDecl::new("tooMany")
                    .param(ParamType::Int)
                    .param(ParamType::TestInfo)
                    .param(ParamType::TestInfo)
                    .check("t", CheckAt::Always),
            );
        assert_eq!(count(class), 1);

        let class = base()
            .method(MethodDecl::new("v").test())
            .method(
                MethodDecl::new("order")
                    .param(ParamType::TestInfo)
                    .param(ParamType::Long)
                    .check("t", CheckAt::Always),
            )
            .method(
                MethodDecl::new("voidValue")
                    .param(ParamType::Int)
                    .check("v", CheckAt::Always),
            );
        // order, type mismatch (long vs int), void return
        assert_eq!(count(class), 3);

        let class = base().method(MethodDecl::new("ri").param(ParamType::RunInfo).check("t", CheckAt::Always));
        assert_eq!(count(class), 1);
    }

    #[test]
    fn run_signatures() {
        let class = base().method(
            MethodDecl::new("r")
                .param(ParamType::TestInfo)
                .param(ParamType::Int)
                .param(ParamType::RunInfo)
                .run(["t"], RunMode::Managed),
        );
        assert_eq!(count(class), 2);
    }
}
