//! Introspection handles for Check and Run bodies
//!
//! [`TestInfo`] is handed to Check bodies and [`RunInfo`] to Run bodies. Both
//! are thin views over a [`TestContext`] implemented by the test VM. A
//! single-test accessor on a multi-target `RunInfo` (and the reverse) fails
//! with [`Error::TestRun`] instead of guessing.

use crate::decl::BodyError;
use crate::error::{Error, Result};
use crate::level::CompLevel;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// What the test VM exposes to info handles.
pub trait TestContext: Send + Sync {
    /// Level at which test `name` is currently compiled, `None` if interpreted.
    fn compiled_level(&self, name: &str) -> Result<Option<CompLevel>>;

    /// Request compilation of test `name` at `level` and wait for it.
    fn compile(&self, name: &str, level: CompLevel) -> Result<()>;

    /// Invoke test `name` with `args`.
    fn invoke(&self, name: &str, args: &[Value]) -> std::result::Result<Value, BodyError>;
}

fn compiled_at(level: Option<CompLevel>, wanted: fn(CompLevel) -> bool) -> bool {
    level.map(wanted).unwrap_or(false)
}

/// Handle passed to Check bodies.
#[derive(Clone)]
pub struct TestInfo {
    test: String,
    warmup: bool,
    ctx: Arc<dyn TestContext>,
}

impl fmt::Debug for TestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestInfo")
            .field("test", &self.test)
            .field("warmup", &self.warmup)
            .finish()
    }
}

impl TestInfo {
    /// Handle for `test`; `warmup` tells whether this is a warmup invocation.
    pub fn new(test: impl Into<String>, warmup: bool, ctx: Arc<dyn TestContext>) -> Self {
        Self {
            test: test.into(),
            warmup,
            ctx,
        }
    }

    /// Name of the checked test.
    pub fn test(&self) -> &str {
        &self.test
    }

    /// True during warmup invocations, false for the steady invocation.
    pub fn is_warmup(&self) -> bool {
        self.warmup
    }

    /// Current compilation level of the checked test.
    pub fn compilation_level(&self) -> Result<Option<CompLevel>> {
        self.ctx.compiled_level(&self.test)
    }

    /// True if compiled at any tier.
    pub fn is_compiled(&self) -> Result<bool> {
        Ok(self.compilation_level()?.is_some())
    }

    /// True if compiled by one of the C1 tiers.
    pub fn is_c1_compiled(&self) -> Result<bool> {
        Ok(compiled_at(self.compilation_level()?, CompLevel::is_c1))
    }

    /// True if compiled by C2.
    pub fn is_c2_compiled(&self) -> Result<bool> {
        Ok(compiled_at(self.compilation_level()?, CompLevel::is_c2))
    }
}

/// Handle passed to Run bodies.
#[derive(Clone)]
pub struct RunInfo {
    tests: Vec<String>,
    warmup: bool,
    ctx: Arc<dyn TestContext>,
}

impl fmt::Debug for RunInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunInfo")
            .field("tests", &self.tests)
            .field("warmup", &self.warmup)
            .finish()
    }
}

impl RunInfo {
    /// Handle for a Run targeting `tests`.
    pub fn new(tests: Vec<String>, warmup: bool, ctx: Arc<dyn TestContext>) -> Self {
        Self { tests, warmup, ctx }
    }

    /// Names of all targeted tests.
    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    /// True during warmup invocations, false for the steady invocation.
    pub fn is_warmup(&self) -> bool {
        self.warmup
    }

    fn single(&self) -> Result<&str> {
        match self.tests.as_slice() {
            [only] => Ok(only.as_str()),
            _ => Err(Error::test_run(format!(
                "single-test accessor used from a Run targeting {} tests; use the accessors taking a test name",
                self.tests.len()
            ))),
        }
    }

    fn named(&self, name: &str) -> Result<&str> {
        if self.tests.len() == 1 {
            return Err(Error::test_run(
                "named accessor used from a single-target Run; use the accessors without a test name",
            ));
        }
        self.tests
            .iter()
            .find(|t| *t == name)
            .map(String::as_str)
            .ok_or_else(|| Error::test_run(format!("'{}' is not a target of this Run", name)))
    }

    /// The only targeted test.
    pub fn test(&self) -> Result<&str> {
        self.single()
    }

    /// Compilation level of the only targeted test.
    pub fn compilation_level(&self) -> Result<Option<CompLevel>> {
        self.ctx.compiled_level(self.single()?)
    }

    /// True if the only targeted test is compiled.
    pub fn is_compiled(&self) -> Result<bool> {
        Ok(self.compilation_level()?.is_some())
    }

    /// True if the only targeted test is compiled by C1.
    pub fn is_c1_compiled(&self) -> Result<bool> {
        Ok(compiled_at(self.compilation_level()?, CompLevel::is_c1))
    }

    /// True if the only targeted test is compiled by C2.
    pub fn is_c2_compiled(&self) -> Result<bool> {
        Ok(compiled_at(self.compilation_level()?, CompLevel::is_c2))
    }

    /// Compilation level of target `name` in a multi-target Run.
    pub fn compilation_level_of(&self, name: &str) -> Result<Option<CompLevel>> {
        self.ctx.compiled_level(self.named(name)?)
    }

    /// True if target `name` in a multi-target Run is compiled.
    pub fn is_compiled_of(&self, name: &str) -> Result<bool> {
        Ok(self.compilation_level_of(name)?.is_some())
    }

    /// True if target `name` in a multi-target Run is compiled by C2.
    pub fn is_c2_compiled_of(&self, name: &str) -> Result<bool> {
        Ok(compiled_at(self.compilation_level_of(name)?, CompLevel::is_c2))
    }

    /// Invoke the only targeted test.
    pub fn invoke(&self, args: &[Value]) -> std::result::Result<Value, BodyError> {
        let name = self.single()?;
        self.ctx.invoke(name, args)
    }

    /// Invoke target `name` of a multi-target Run.
    pub fn invoke_of(&self, name: &str, args: &[Value]) -> std::result::Result<Value, BodyError> {
        let name = self.named(name)?;
        self.ctx.invoke(name, args)
    }

    /// Compile target `name` at `level`. Valid for single and multi-target Runs.
    pub fn compile(&self, name: &str, level: CompLevel) -> Result<()> {
        if !self.tests.iter().any(|t| t == name) {
            return Err(Error::test_run(format!("'{}' is not a target of this Run", name)));
        }
        self.ctx.compile(name, level)
    }
}
