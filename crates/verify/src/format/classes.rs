//! Class-level structure: the test class and its helpers.

use super::Collector;
use jitcheck_core::{ClassDecl, Nesting, Subject};

pub(super) fn check(class: &ClassDecl, helpers: &[ClassDecl], out: &mut Collector) {
    if class.test_methods().next().is_none() {
        out.add(
            Subject::class(&class.name),
            "test class must declare at least one @Test method",
        );
    }

    for helper in helpers {
        let subject = Subject::class(&helper.name);
        if helper.name == class.name {
            out.add(
                subject.clone(),
                "class cannot be both the test class and a helper class",
            );
        }
        if helper.nesting == Nesting::Inner {
            out.add(
                subject.clone(),
                "helper class must not be a non-static inner class",
            );
        }
        for method in helper.methods.iter().filter(|m| m.annotations.has_role()) {
            out.add(
                Subject::method(method.qualified(&helper.name)),
                "helper class methods cannot carry @Test, @Check or @Run",
            );
        }
    }
}
