//! Compiler control annotations.

use super::Collector;
use jitcheck_core::{ClassDecl, CompLevel, CompileControl, Subject};

fn contradicts(force: CompLevel, dont: CompLevel) -> bool {
    force == dont
        || (force == CompLevel::Any && dont.is_concrete())
        || (dont == CompLevel::Any && force.is_concrete())
}

pub(super) fn check(class: &ClassDecl, out: &mut Collector) {
    for method in &class.methods {
        let controls = &method.annotations.compile_control;
        if controls.is_empty() {
            continue;
        }
        let subject = Subject::method(method.qualified(&class.name));

        let forced: Vec<CompLevel> = controls
            .iter()
            .filter_map(|c| match c {
                CompileControl::ForceCompile(level) => Some(*level),
                _ => None,
            })
            .collect();
        let excluded: Vec<CompLevel> = controls
            .iter()
            .filter_map(|c| match c {
                CompileControl::DontCompile(level) => Some(*level),
                _ => None,
            })
            .collect();

        for force in &forced {
            if matches!(force, CompLevel::Skip | CompLevel::WaitForCompilation) {
                out.add(
                    subject.clone(),
                    format!("@ForceCompile({}) does not name a compilation level", force),
                );
            }
        }
        for force in &forced {
            for dont in excluded.iter().filter(|d| contradicts(*force, **d)) {
                out.add(
                    subject.clone(),
                    format!("@ForceCompile({}) contradicts @DontCompile({})", force, dont),
                );
            }
        }

        if controls.contains(&CompileControl::ForceInline)
            && controls.contains(&CompileControl::DontInline)
        {
            out.add(subject, "@ForceInline contradicts @DontInline");
        }
    }
}
