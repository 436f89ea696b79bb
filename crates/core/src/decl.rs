//! Declarative test classes
//!
//! A test class is registered as plain data: a [`ClassDecl`] holding
//! [`MethodDecl`]s, each carrying raw [`Annotations`] and an optional body.
//! Annotations are deliberately loose (strings, optional fields, free lists)
//! so that malformed declarations can be expressed and then rejected by the
//! format validator with a precise report.

use crate::error::Error;
use crate::info::{RunInfo, TestInfo};
use crate::level::CompLevel;
use crate::value::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Types
// ============================================================================

/// Reference to a class usable as a parameter or return type.
#[derive(Clone)]
pub struct ClassRef {
    /// Fully qualified class name
    pub name: String,
    /// No-arg constructor; `None` if the class has none
    pub default_ctor: Option<fn() -> Value>,
}

impl ClassRef {
    /// Reference type without a no-arg constructor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_ctor: None,
        }
    }

    /// Reference type constructible through `ctor`.
    pub fn constructible(name: impl Into<String>, ctor: fn() -> Value) -> Self {
        Self {
            name: name.into(),
            default_ctor: Some(ctor),
        }
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("name", &self.name)
            .field("default_ctor", &self.default_ctor.is_some())
            .finish()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.default_ctor.is_some() == other.default_ctor.is_some()
    }
}

/// Declared parameter or return type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void` (returns only)
    Void,
    /// A reference type
    Object(ClassRef),
    /// Reserved handle for Check bodies
    TestInfo,
    /// Reserved handle for Run bodies
    RunInfo,
}

impl ParamType {
    /// Numeric primitive (everything but boolean and void).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ParamType::Byte
                | ParamType::Char
                | ParamType::Short
                | ParamType::Int
                | ParamType::Long
                | ParamType::Float
                | ParamType::Double
        )
    }

    /// Floating point primitive.
    pub fn is_floating(&self) -> bool {
        matches!(self, ParamType::Float | ParamType::Double)
    }

    /// Reference type.
    pub fn is_reference(&self) -> bool {
        matches!(self, ParamType::Object(_))
    }

    /// One of the two reserved info handles.
    pub fn is_info_handle(&self) -> bool {
        matches!(self, ParamType::TestInfo | ParamType::RunInfo)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Boolean => "boolean",
            ParamType::Byte => "byte",
            ParamType::Char => "char",
            ParamType::Short => "short",
            ParamType::Int => "int",
            ParamType::Long => "long",
            ParamType::Float => "float",
            ParamType::Double => "double",
            ParamType::Void => "void",
            ParamType::Object(class) => class.name.as_str(),
            ParamType::TestInfo => "TestInfo",
            ParamType::RunInfo => "RunInfo",
        };
        f.write_str(name)
    }
}

/// Where a class sits relative to its enclosing class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nesting {
    /// Top-level class
    #[default]
    TopLevel,
    /// `static` nested class
    StaticNested,
    /// Non-static inner class (needs an enclosing instance)
    Inner,
}

// ============================================================================
// Annotations
// ============================================================================

/// `@Test`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestAnnotation {
    /// Requested compilation level
    pub level: CompLevel,
}

impl Default for TestAnnotation {
    fn default() -> Self {
        Self {
            level: CompLevel::Any,
        }
    }
}

/// When a Check body is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckAt {
    /// After every invocation of the test, warmups included
    #[default]
    Always,
    /// Only after the test has been compiled
    AfterCompilation,
}

/// `@Check`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAnnotation {
    /// Name of the checked test
    pub test: String,
    /// Invocation timing
    pub when: CheckAt,
}

/// How the harness drives a Run body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Warmup, compile and steady invocation are driven by the harness
    #[default]
    Managed,
    /// Invoked exactly once; the body controls everything
    Standalone,
}

/// `@Run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAnnotation {
    /// Names of the targeted tests
    pub tests: Vec<String>,
    /// Invocation mode
    pub mode: RunMode,
}

/// Per-parameter argument provider for `@Arguments`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// Zero for primitives, a default-constructed instance for references
    Default,
    /// `42` in the parameter's type
    Number42,
    /// `-42` in the parameter's type
    NumberMinus42,
    /// Minimum value of the parameter's type
    Min,
    /// Maximum value of the parameter's type
    Max,
    /// `true`
    True,
    /// `false`
    False,
    /// Alternates, starting with `false`
    BooleanToggleFirstFalse,
    /// Alternates, starting with `true`
    BooleanToggleFirstTrue,
    /// A random value chosen once and reused for every invocation
    RandomOnce,
    /// A fresh random value for each invocation
    RandomEach,
}

impl Argument {
    /// Token that only makes sense on a `boolean` parameter.
    pub fn is_boolean_only(self) -> bool {
        matches!(
            self,
            Argument::True
                | Argument::False
                | Argument::BooleanToggleFirstFalse
                | Argument::BooleanToggleFirstTrue
        )
    }

    /// Token that only makes sense on a numeric parameter.
    pub fn is_numeric_only(self) -> bool {
        matches!(
            self,
            Argument::Number42 | Argument::NumberMinus42 | Argument::Min | Argument::Max
        )
    }

    /// Random token.
    pub fn is_random(self) -> bool {
        matches!(self, Argument::RandomOnce | Argument::RandomEach)
    }
}

/// Compiler control annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileControl {
    /// `@ForceCompile(level)`
    ForceCompile(CompLevel),
    /// `@DontCompile(level)`
    DontCompile(CompLevel),
    /// `@ForceInline`
    ForceInline,
    /// `@DontInline`
    DontInline,
}

/// `@IR`
///
/// Every field is a flat list exactly as written by the test author:
/// - `fail_on`: patterns, each followed by its parameter if it is a
///   parameterized node macro
/// - `counts`: `pattern [parameter] constraint` groups
/// - `apply_if*`: `flag, value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrAnnotation {
    /// Forbidden patterns
    pub fail_on: Vec<String>,
    /// Counted patterns with their constraints
    pub counts: Vec<String>,
    /// Single clause that must hold
    pub apply_if: Vec<String>,
    /// Single clause that must not hold
    pub apply_if_not: Vec<String>,
    /// Two or more clauses that must all hold
    pub apply_if_and: Vec<String>,
    /// Two or more clauses of which one must hold
    pub apply_if_or: Vec<String>,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl IrAnnotation {
    /// Empty rule; add clauses with the builder methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `failOn` list.
    pub fn fail_on<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.fail_on = strings(items);
        self
    }

    /// Set the `counts` list.
    pub fn counts<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.counts = strings(items);
        self
    }

    /// Set `applyIf`.
    pub fn apply_if<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.apply_if = strings(items);
        self
    }

    /// Set `applyIfNot`.
    pub fn apply_if_not<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.apply_if_not = strings(items);
        self
    }

    /// Set `applyIfAnd`.
    pub fn apply_if_and<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.apply_if_and = strings(items);
        self
    }

    /// Set `applyIfOr`.
    pub fn apply_if_or<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.apply_if_or = strings(items);
        self
    }
}

/// All annotations on one method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    /// `@Test`
    pub test: Option<TestAnnotation>,
    /// `@Check`
    pub check: Option<CheckAnnotation>,
    /// `@Run`
    pub run: Option<RunAnnotation>,
    /// `@Arguments`
    pub arguments: Option<Vec<Argument>>,
    /// `@Warmup`
    pub warmup: Option<i64>,
    /// `@IR` rules in declaration order
    pub ir: Vec<IrAnnotation>,
    /// Compiler control annotations in declaration order
    pub compile_control: Vec<CompileControl>,
}

impl Annotations {
    /// True if any of `@Test`, `@Check`, `@Run` is present.
    pub fn has_role(&self) -> bool {
        self.test.is_some() || self.check.is_some() || self.run.is_some()
    }
}

// ============================================================================
// Bodies
// ============================================================================

/// Error escaping a Test, Check or Run body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body reported a failure
    #[error("{0}")]
    Thrown(String),
    /// The body panicked
    #[error("panicked: {0}")]
    Panicked(String),
    /// The body misused the harness (e.g. a wrong info-handle query)
    #[error(transparent)]
    Harness(#[from] Error),
}

impl From<&str> for BodyError {
    fn from(msg: &str) -> Self {
        BodyError::Thrown(msg.to_string())
    }
}

impl From<String> for BodyError {
    fn from(msg: String) -> Self {
        BodyError::Thrown(msg)
    }
}

/// Info handle passed along with an invocation.
#[derive(Debug, Clone, Copy)]
pub enum CallInfo<'a> {
    /// Plain test invocation
    None,
    /// Check body invocation
    Test(&'a TestInfo),
    /// Run body invocation
    Run(&'a RunInfo),
}

/// One invocation of a body.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Positional arguments (for Check bodies: the test's return value, if declared)
    pub args: &'a [Value],
    /// Info handle, if the body declares one
    pub info: CallInfo<'a>,
}

impl<'a> Call<'a> {
    /// Invocation with arguments and no info handle.
    pub fn plain(args: &'a [Value]) -> Self {
        Self {
            args,
            info: CallInfo::None,
        }
    }

    /// Positional argument `idx`.
    pub fn arg(&self, idx: usize) -> Result<&'a Value, BodyError> {
        self.args
            .get(idx)
            .ok_or_else(|| BodyError::Thrown(format!("missing argument {}", idx)))
    }

    /// The `TestInfo` handle of a Check invocation.
    pub fn test_info(&self) -> Result<&'a TestInfo, BodyError> {
        match self.info {
            CallInfo::Test(info) => Ok(info),
            _ => Err(Error::test_run("no TestInfo handle in this invocation").into()),
        }
    }

    /// The `RunInfo` handle of a Run invocation.
    pub fn run_info(&self) -> Result<&'a RunInfo, BodyError> {
        match self.info {
            CallInfo::Run(info) => Ok(info),
            _ => Err(Error::test_run("no RunInfo handle in this invocation").into()),
        }
    }
}

/// Shared body closure.
pub type Body = Arc<dyn Fn(&Call<'_>) -> Result<Value, BodyError> + Send + Sync>;

// ============================================================================
// Declarations
// ============================================================================

/// One method of a test class.
#[derive(Clone)]
pub struct MethodDecl {
    /// Simple method name; overloads share it
    pub name: String,
    /// Parameter types in order
    pub params: Vec<ParamType>,
    /// Return type
    pub returns: ParamType,
    /// Raw annotations
    pub annotations: Annotations,
    /// Executable body; `None` returns the zero value of `returns`
    pub body: Option<Body>,
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("annotations", &self.annotations)
            .field("body", &self.body.is_some())
            .finish()
    }
}

impl MethodDecl {
    /// `void name()` with no annotations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ParamType::Void,
            annotations: Annotations::default(),
            body: None,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, ty: ParamType) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ty: ParamType) -> Self {
        self.returns = ty;
        self
    }

    /// `@Test` at the default level.
    pub fn test(self) -> Self {
        self.test_at(CompLevel::Any)
    }

    /// `@Test(compLevel = level)`.
    pub fn test_at(mut self, level: CompLevel) -> Self {
        self.annotations.test = Some(TestAnnotation { level });
        self
    }

    /// `@Check(test = target, when = when)`.
    pub fn check(mut self, target: impl Into<String>, when: CheckAt) -> Self {
        self.annotations.check = Some(CheckAnnotation {
            test: target.into(),
            when,
        });
        self
    }

    /// `@Run(test = targets, mode = mode)`.
    pub fn run<I, S>(mut self, targets: I, mode: RunMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations.run = Some(RunAnnotation {
            tests: strings(targets),
            mode,
        });
        self
    }

    /// `@Arguments(...)`.
    pub fn arguments(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.annotations.arguments = Some(args.into_iter().collect());
        self
    }

    /// `@Warmup(n)`.
    pub fn warmup(mut self, n: i64) -> Self {
        self.annotations.warmup = Some(n);
        self
    }

    /// Append an `@IR` rule.
    pub fn ir(mut self, rule: IrAnnotation) -> Self {
        self.annotations.ir.push(rule);
        self
    }

    /// Append a compiler control annotation.
    pub fn control(mut self, control: CompileControl) -> Self {
        self.annotations.compile_control.push(control);
        self
    }

    /// Attach the executable body.
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> Result<Value, BodyError> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(f));
        self
    }

    /// `Class::method` identity.
    pub fn qualified(&self, class: &str) -> String {
        format!("{}::{}", class, self.name)
    }

    /// Run the body. A panic escaping it is turned into [`BodyError::Panicked`].
    pub fn invoke(&self, call: &Call<'_>) -> Result<Value, BodyError> {
        let Some(body) = &self.body else {
            return Ok(Value::zero(&self.returns));
        };
        match panic::catch_unwind(AssertUnwindSafe(|| body(call))) {
            Ok(result) => result,
            Err(payload) => Err(BodyError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A test class (or helper class) registered with the harness.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    /// Fully qualified class name
    pub name: String,
    /// Nesting kind
    pub nesting: Nesting,
    /// Methods in declaration order
    pub methods: Vec<MethodDecl>,
}

impl ClassDecl {
    /// Empty top-level class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nesting: Nesting::TopLevel,
            methods: Vec::new(),
        }
    }

    /// Set the nesting kind.
    pub fn nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = nesting;
        self
    }

    /// Append a method.
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Methods carrying `@Test`, in declaration order.
    pub fn test_methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.methods.iter().filter(|m| m.annotations.test.is_some())
    }

    /// First `@Test` method called `name`.
    pub fn test_named(&self, name: &str) -> Option<&MethodDecl> {
        self.test_methods().find(|m| m.name == name)
    }
}
