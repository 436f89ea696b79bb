//! Validated, immutable test specs derived from a declaration
//!
//! [`TestSuite::derive`] validates the class first and refuses to build
//! anything from a class with format violations. The specs it produces are
//! what the test VM executes and what the driver verifies IR against.

use crate::applicability::Applicability;
use crate::format::FormatValidator;
use crate::ir::pattern::{compile_counts, compile_fail_on, CountPattern, IrPattern};
use jitcheck_core::{
    Argument, CheckAt, ClassDecl, CompLevel, CompileControl, Error, FlagCatalog, IrAnnotation,
    MethodDecl, ParamType, Result, RunMode,
};
use tracing::debug;

/// One `@IR` rule, ready for matching.
#[derive(Debug, Clone)]
pub struct IrRuleSpec {
    /// Qualified name of the owning test
    pub owner: String,
    /// 1-based rule index
    pub index: usize,
    /// Forbidden patterns
    pub fail_on: Vec<IrPattern>,
    /// Counted patterns
    pub counts: Vec<CountPattern>,
    /// Flag conditions; `None` means always
    pub applicability: Option<Applicability>,
    /// Printable summary of the annotation
    pub summary: String,
}

/// One `@Test` method.
#[derive(Debug, Clone)]
pub struct TestSpec {
    /// Simple method name
    pub name: String,
    /// `Class::method`
    pub qualified: String,
    /// Declared compilation level
    pub level: CompLevel,
    /// Declared warmup count, if any
    pub warmup: Option<u64>,
    /// Argument providers, one per parameter
    pub arguments: Option<Vec<Argument>>,
    /// Compiler control annotations
    pub controls: Vec<CompileControl>,
    /// IR rules in declaration order
    pub rules: Vec<IrRuleSpec>,
    /// The declaration (signature and body)
    pub method: MethodDecl,
}

impl TestSpec {
    /// Parameter types.
    pub fn params(&self) -> &[ParamType] {
        &self.method.params
    }

    /// Return type.
    pub fn returns(&self) -> &ParamType {
        &self.method.returns
    }
}

/// One `@Check` method.
#[derive(Debug, Clone)]
pub struct CheckSpec {
    /// Checked test
    pub test: String,
    /// Invocation timing
    pub when: CheckAt,
    /// The declaration of the check body
    pub method: MethodDecl,
}

/// One `@Run` method.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Targeted tests
    pub tests: Vec<String>,
    /// Invocation mode
    pub mode: RunMode,
    /// Declared warmup count, if any
    pub warmup: Option<u64>,
    /// The declaration of the run body
    pub method: MethodDecl,
}

/// All specs of one test class.
#[derive(Debug, Clone)]
pub struct TestSuite {
    /// Qualified class name
    pub class: String,
    /// Tests in declaration order
    pub tests: Vec<TestSpec>,
    /// Check handlers
    pub checks: Vec<CheckSpec>,
    /// Run handlers
    pub runs: Vec<RunSpec>,
}

/// Printable form of an `@IR` annotation.
pub fn summarize(ir: &IrAnnotation) -> String {
    let fields = [
        ("failOn", &ir.fail_on),
        ("counts", &ir.counts),
        ("applyIf", &ir.apply_if),
        ("applyIfNot", &ir.apply_if_not),
        ("applyIfAnd", &ir.apply_if_and),
        ("applyIfOr", &ir.apply_if_or),
    ];
    let parts = fields
        .iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(name, items)| {
            let quoted = items
                .iter()
                .map(|s| format!("\"{}\"", s))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}={{{}}}", name, quoted)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("@IR({})", parts)
}

fn compile_rule(
    owner: &str,
    index: usize,
    ir: &IrAnnotation,
    catalog: &FlagCatalog,
) -> Result<IrRuleSpec> {
    let unexpected =
        |what: String| Error::test_run(format!("{} @IR rule {}: {}", owner, index, what));
    let fail_on = compile_fail_on(&ir.fail_on).map_err(|e| unexpected(format!("{:?}", e)))?;
    let counts = compile_counts(&ir.counts).map_err(|e| unexpected(format!("{:?}", e)))?;
    let applicability =
        Applicability::parse(ir, catalog).map_err(|e| unexpected(format!("{:?}", e)))?;
    Ok(IrRuleSpec {
        owner: owner.to_string(),
        index,
        fail_on,
        counts,
        applicability,
        summary: summarize(ir),
    })
}

fn warmup(value: Option<i64>) -> Option<u64> {
    value.and_then(|w| u64::try_from(w).ok())
}

impl TestSuite {
    /// Validate `class` (with `helpers`) and derive its specs.
    ///
    /// # Errors
    ///
    /// [`Error::FormatViolation`] carrying the full report if the class is malformed.
    pub fn derive(class: &ClassDecl, helpers: &[ClassDecl], catalog: &FlagCatalog) -> Result<Self> {
        FormatValidator::new(catalog)
            .validate(class, helpers)
            .into_result()?;

        let mut tests = Vec::new();
        let mut checks = Vec::new();
        let mut runs = Vec::new();
        for method in &class.methods {
            let ann = &method.annotations;
            if let Some(test) = ann.test {
                let qualified = method.qualified(&class.name);
                let rules = ann
                    .ir
                    .iter()
                    .enumerate()
                    .map(|(i, ir)| compile_rule(&qualified, i + 1, ir, catalog))
                    .collect::<Result<Vec<_>>>()?;
                tests.push(TestSpec {
                    name: method.name.clone(),
                    qualified,
                    level: test.level,
                    warmup: warmup(ann.warmup),
                    arguments: ann.arguments.clone(),
                    controls: ann.compile_control.clone(),
                    rules,
                    method: method.clone(),
                });
            } else if let Some(check) = &ann.check {
                checks.push(CheckSpec {
                    test: check.test.trim().to_string(),
                    when: check.when,
                    method: method.clone(),
                });
            } else if let Some(run) = &ann.run {
                runs.push(RunSpec {
                    tests: run.tests.iter().map(|t| t.trim().to_string()).collect(),
                    mode: run.mode,
                    warmup: warmup(ann.warmup),
                    method: method.clone(),
                });
            }
        }

        debug!(
            target: "jitcheck::suite",
            class = %class.name,
            tests = tests.len(),
            checks = checks.len(),
            runs = runs.len(),
            "Derived test suite"
        );
        Ok(TestSuite {
            class: class.name.clone(),
            tests,
            checks,
            runs,
        })
    }

    /// Test called `name`.
    pub fn test(&self, name: &str) -> Option<&TestSpec> {
        self.tests.iter().find(|t| t.name == name)
    }

    /// Check handler targeting `test`, if any.
    pub fn check_for(&self, test: &str) -> Option<&CheckSpec> {
        self.checks.iter().find(|c| c.test == test)
    }

    /// Run handler targeting `test`, if any.
    pub fn run_for(&self, test: &str) -> Option<&RunSpec> {
        self.runs.iter().find(|r| r.tests.iter().any(|t| t == test))
    }

    /// All IR rules of all tests.
    pub fn rules(&self) -> impl Iterator<Item = &IrRuleSpec> {
        self.tests.iter().flat_map(|t| t.rules.iter())
    }
}
