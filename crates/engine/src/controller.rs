//! Compilation controller
//!
//! Drives every test of a suite through its lifecycle inside the test VM:
//!
//! ```text
//! Unstarted -> Warmup(1..=N) -> Compiled(level) | Skipped -> Steady
//! ```
//!
//! Tests are grouped into units:
//! - a base test, invoked directly
//! - a checked test, whose Check body wraps every invocation
//! - a custom run, whose Run body is invoked instead of its targets
//!
//! Units run one at a time. A body error aborts its unit (every co-target of
//! a multi-target Run included) and is recorded as a [`TestFailure`]; the
//! remaining units still run. After a unit completes, the rule statuses and
//! IR dumps of its tests are collected for the driver.

use crate::arguments::ArgumentsProvider;
use crate::policy::CompilationPolicy;
use crate::whitebox::WhiteBox;
use jitcheck_core::{
    BodyError, Call, CallInfo, CheckAt, CompLevel, Error, FlagCatalog, FlagSource,
    IrMatchEvidence, Result, RuleEncoding, RuleEntry, RuleStatus, RunInfo, RunMode, SkipReason,
    TestContext, TestInfo, Value, VmFlags,
};
use jitcheck_verify::{render_dump, rule_applies, CheckSpec, RunSpec, TestSpec, TestSuite};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Warmup iterations for tests and Runs that do not declare `@Warmup`.
pub const DEFAULT_WARMUP: u64 = 2000;

/// Compilation level polls before giving up on a compilation.
pub const DEFAULT_MAX_COMPILE_POLLS: u32 = 1000;

/// Tunables of one test VM run.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Warmup iterations when none is declared
    pub default_warmup: u64,
    /// Polls of the compilation level (and invocations for
    /// `WAIT_FOR_COMPILATION`) before giving up
    pub max_compile_polls: u32,
    /// Level used for tests declared `ANY`
    pub default_level: Option<CompLevel>,
    /// Run units in declaration order instead of shuffling
    pub deterministic: bool,
    /// Seed for shuffling and random arguments; drawn at random if unset
    pub seed: Option<u64>,
    /// Simple names of the tests to run; empty runs all
    pub selection: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_warmup: DEFAULT_WARMUP,
            max_compile_polls: DEFAULT_MAX_COMPILE_POLLS,
            default_level: None,
            deterministic: false,
            seed: None,
            selection: Vec::new(),
        }
    }
}

/// Lifecycle state of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    /// Not invoked yet
    Unstarted,
    /// Warmup invocation `n` (1-based)
    Warmup(u64),
    /// Compiled at the given level
    Compiled(CompLevel),
    /// Compilation skipped or refused
    Skipped,
    /// Final invocation done or in progress
    Steady,
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestState::Unstarted => f.write_str("UNSTARTED"),
            TestState::Warmup(n) => write!(f, "WARMUP({})", n),
            TestState::Compiled(level) => write!(f, "COMPILED({})", level),
            TestState::Skipped => f.write_str("SKIPPED"),
            TestState::Steady => f.write_str("STEADY"),
        }
    }
}

/// A unit aborted by an error escaping a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Simple names of every test of the unit
    pub tests: Vec<String>,
    /// Rendered cause
    pub message: String,
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test \"{}\" failed: {}", self.tests.join("\", \""), self.message)
    }
}

/// What one test VM run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Aborted units
    pub failures: Vec<TestFailure>,
    /// Rule statuses of every completed test with IR rules
    pub encodings: Vec<RuleEncoding>,
    /// IR dumps of methods with applicable rules
    pub dumps: Vec<IrMatchEvidence>,
    /// Total test body invocations
    pub invocations: u64,
}

impl RunReport {
    /// True if no unit failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write rule encodings and dumps in stdout protocol form.
    pub fn write_protocol(&self, out: &mut dyn Write) -> Result<()> {
        for encoding in &self.encodings {
            writeln!(out, "{}", encoding.to_line()?)?;
        }
        for dump in &self.dumps {
            out.write_all(render_dump(dump).as_bytes())?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Unit {
    Base(usize),
    Checked(usize, usize),
    Custom(usize, Vec<usize>),
}

impl Unit {
    fn tests(&self) -> Vec<usize> {
        match self {
            Unit::Base(t) | Unit::Checked(t, _) => vec![*t],
            Unit::Custom(_, targets) => targets.clone(),
        }
    }
}

/// State shared with info handles.
struct VmContext {
    suite: Arc<TestSuite>,
    whitebox: Arc<dyn WhiteBox>,
    policy: CompilationPolicy,
    max_compile_polls: u32,
    states: Mutex<HashMap<String, TestState>>,
    invocations: AtomicU64,
}

impl VmContext {
    fn spec(&self, name: &str) -> Result<&TestSpec> {
        self.suite
            .test(name)
            .ok_or_else(|| Error::test_run(format!("'{}' is not a test of {}", name, self.suite.class)))
    }

    fn transition(&self, name: &str, to: TestState) {
        let from = self
            .states
            .lock()
            .insert(name.to_string(), to)
            .unwrap_or(TestState::Unstarted);
        match to {
            TestState::Warmup(_) => {
                trace!(target: "jitcheck::controller", test = name, %from, %to, "Transition")
            }
            _ => debug!(target: "jitcheck::controller", test = name, %from, %to, "Transition"),
        }
    }

    fn state(&self, name: &str) -> TestState {
        self.states
            .lock()
            .get(name)
            .copied()
            .unwrap_or(TestState::Unstarted)
    }

    fn invoke_test(&self, name: &str, args: &[Value]) -> std::result::Result<Value, BodyError> {
        let spec = self.spec(name)?;
        let result = spec.method.invoke(&Call::plain(args));
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.whitebox.notify_invocation(&spec.qualified);
        result
    }

    /// Compile test `name` at `level` and wait until the VM reports it compiled.
    ///
    /// Returns `false` if the policy or the VM refused the request.
    fn compile_at(&self, name: &str, level: CompLevel) -> Result<bool> {
        let qualified = &self.spec(name)?.qualified;
        if !self.policy.can_compile(level) {
            debug!(target: "jitcheck::controller", test = name, %level, policy = %self.policy, "Level unreachable");
            self.transition(name, TestState::Skipped);
            return Ok(false);
        }
        match self.whitebox.compilation_level(qualified)? {
            Some(current) if current == level => {
                self.transition(name, TestState::Compiled(level));
                return Ok(true);
            }
            Some(_) => self.whitebox.deoptimize(qualified)?,
            None => {}
        }
        if !self.whitebox.enqueue_compilation(qualified, level)? {
            warn!(target: "jitcheck::controller", test = name, %level, "Compilation request refused");
            self.transition(name, TestState::Skipped);
            return Ok(false);
        }
        for _ in 0..self.max_compile_polls {
            if let Some(compiled) = self.whitebox.compilation_level(qualified)? {
                self.transition(name, TestState::Compiled(compiled));
                return Ok(true);
            }
            std::thread::yield_now();
        }
        Err(Error::test_run(format!(
            "{} was not compiled at {} after {} polls",
            qualified, level, self.max_compile_polls
        )))
    }
}

impl TestContext for VmContext {
    fn compiled_level(&self, name: &str) -> Result<Option<CompLevel>> {
        let qualified = &self.spec(name)?.qualified;
        self.whitebox.compilation_level(qualified)
    }

    fn compile(&self, name: &str, level: CompLevel) -> Result<()> {
        self.compile_at(name, self.policy.resolve(level)).map(|_| ())
    }

    fn invoke(&self, name: &str, args: &[Value]) -> std::result::Result<Value, BodyError> {
        self.invoke_test(name, args)
    }
}

/// Runs the units of one suite against a [`WhiteBox`].
pub struct CompilationController {
    suite: Arc<TestSuite>,
    ctx: Arc<VmContext>,
    flags: VmFlags,
    catalog: FlagCatalog,
    config: ControllerConfig,
    seed: u64,
}

impl CompilationController {
    /// Controller for `suite` under `flags`.
    ///
    /// # Errors
    ///
    /// [`Error::TestRun`] if a policy flag has the wrong type.
    pub fn new(
        suite: TestSuite,
        whitebox: Arc<dyn WhiteBox>,
        flags: VmFlags,
        catalog: FlagCatalog,
        config: ControllerConfig,
    ) -> Result<Self> {
        let policy = CompilationPolicy::from_flags(&flags.resolve(&catalog))?
            .with_default_level(config.default_level);
        let suite = Arc::new(suite);
        let seed = config.seed.unwrap_or_else(rand::random);
        let ctx = Arc::new(VmContext {
            suite: Arc::clone(&suite),
            whitebox,
            policy,
            max_compile_polls: config.max_compile_polls.max(1),
            states: Mutex::new(HashMap::new()),
            invocations: AtomicU64::new(0),
        });
        Ok(Self {
            suite,
            ctx,
            flags,
            catalog,
            config,
            seed,
        })
    }

    /// Compilation policy in effect.
    pub fn policy(&self) -> CompilationPolicy {
        self.ctx.policy
    }

    /// Seed used for ordering and random arguments.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current state of test `name`.
    pub fn state(&self, name: &str) -> TestState {
        self.ctx.state(name)
    }

    fn selected(&self, name: &str) -> bool {
        self.config.selection.is_empty() || self.config.selection.iter().any(|s| s == name)
    }

    fn units(&self) -> Vec<Unit> {
        let tests = &self.suite.tests;
        let index_of = |name: &str| tests.iter().position(|t| t.name == name);
        let mut units = Vec::new();
        let mut claimed_runs = Vec::new();
        for (i, test) in tests.iter().enumerate() {
            if let Some(r) = self.suite.runs.iter().position(|r| r.tests.contains(&test.name)) {
                if !claimed_runs.contains(&r) {
                    claimed_runs.push(r);
                    let targets = self.suite.runs[r]
                        .tests
                        .iter()
                        .filter_map(|t| index_of(t.as_str()))
                        .collect();
                    units.push(Unit::Custom(r, targets));
                }
            } else if let Some(c) = self.suite.checks.iter().position(|c| c.test == test.name) {
                units.push(Unit::Checked(i, c));
            } else {
                units.push(Unit::Base(i));
            }
        }
        units.retain(|u| u.tests().iter().any(|t| self.selected(&tests[*t].name)));
        if !self.config.deterministic {
            units.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }
        units
    }

    /// Run every selected unit and collect the results.
    pub fn run(&self) -> RunReport {
        let units = self.units();
        info!(
            target: "jitcheck::controller",
            class = %self.suite.class,
            units = units.len(),
            policy = %self.ctx.policy,
            seed = self.seed,
            deterministic = self.config.deterministic,
            "Running tests"
        );

        let resolved = self.flags.resolve(&self.catalog);
        let mut report = RunReport::default();
        for unit in &units {
            let names: Vec<String> = unit
                .tests()
                .iter()
                .map(|t| self.suite.tests[*t].name.clone())
                .collect();
            if let Err(cause) = self.run_unit(unit) {
                error!(target: "jitcheck::controller", tests = ?names, error = %cause, "Test failed");
                report.failures.push(TestFailure {
                    tests: names,
                    message: cause.to_string(),
                });
                continue;
            }
            for t in unit.tests() {
                let test = &self.suite.tests[t];
                if test.rules.is_empty() {
                    continue;
                }
                if let Err(cause) = self.collect_rules(test, &resolved, &mut report) {
                    report.failures.push(TestFailure {
                        tests: vec![test.name.clone()],
                        message: cause.to_string(),
                    });
                }
            }
        }
        report.invocations = self.ctx.invocations.load(Ordering::Relaxed);
        info!(
            target: "jitcheck::controller",
            class = %self.suite.class,
            failures = report.failures.len(),
            invocations = report.invocations,
            "Tests finished"
        );
        report
    }

    fn run_unit(&self, unit: &Unit) -> std::result::Result<(), BodyError> {
        match unit {
            Unit::Base(t) => self.run_test(&self.suite.tests[*t], None, *t),
            Unit::Checked(t, c) => {
                self.run_test(&self.suite.tests[*t], Some(&self.suite.checks[*c]), *t)
            }
            Unit::Custom(r, targets) => {
                let targets: Vec<&TestSpec> =
                    targets.iter().map(|t| &self.suite.tests[*t]).collect();
                self.run_custom(&self.suite.runs[*r], &targets)
            }
        }
    }

    fn provider(&self, test: &TestSpec, salt: usize) -> Result<ArgumentsProvider> {
        match &test.arguments {
            Some(arguments) => ArgumentsProvider::new(
                arguments,
                test.params(),
                self.seed.wrapping_add(salt as u64),
            ),
            None => Ok(ArgumentsProvider::empty()),
        }
    }

    fn invoke_checked(
        &self,
        test: &TestSpec,
        check: Option<&CheckSpec>,
        args: &[Value],
        warmup: bool,
    ) -> std::result::Result<(), BodyError> {
        let returned = self.ctx.invoke_test(&test.name, args)?;
        let Some(check) = check else {
            return Ok(());
        };
        if warmup && check.when == CheckAt::AfterCompilation {
            return Ok(());
        }
        let ctx: Arc<dyn TestContext> = self.ctx.clone();
        let info = TestInfo::new(test.name.clone(), warmup, ctx);
        let takes_value = check.method.params.iter().any(|p| !p.is_info_handle());
        let values = if takes_value { vec![returned] } else { Vec::new() };
        check.method.invoke(&Call {
            args: &values,
            info: CallInfo::Test(&info),
        })?;
        Ok(())
    }

    fn run_test(
        &self,
        test: &TestSpec,
        check: Option<&CheckSpec>,
        salt: usize,
    ) -> std::result::Result<(), BodyError> {
        let mut provider = self.provider(test, salt)?;

        if test.level == CompLevel::Skip {
            self.ctx.transition(&test.name, TestState::Skipped);
            self.ctx.transition(&test.name, TestState::Steady);
            let args = provider.next_args()?;
            return self.invoke_checked(test, check, &args, false);
        }

        let warmup = test.warmup.unwrap_or(self.config.default_warmup);
        for n in 1..=warmup {
            self.ctx.transition(&test.name, TestState::Warmup(n));
            let args = provider.next_args()?;
            self.invoke_checked(test, check, &args, true)?;
        }

        if test.level == CompLevel::WaitForCompilation {
            let mut compiled = false;
            for _ in 0..self.ctx.max_compile_polls {
                if let Some(level) = self.ctx.whitebox.compilation_level(&test.qualified)? {
                    self.ctx.transition(&test.name, TestState::Compiled(level));
                    compiled = true;
                    break;
                }
                let args = provider.next_args()?;
                self.invoke_checked(test, check, &args, true)?;
            }
            if !compiled {
                warn!(target: "jitcheck::controller", test = %test.name, "VM never compiled the test");
                self.ctx.transition(&test.name, TestState::Skipped);
            }
        } else {
            self.ctx
                .compile_at(&test.name, self.ctx.policy.resolve(test.level))?;
        }

        self.ctx.transition(&test.name, TestState::Steady);
        let args = provider.next_args()?;
        self.invoke_checked(test, check, &args, false)
    }

    fn invoke_run(
        &self,
        run: &RunSpec,
        names: &[String],
        warmup: bool,
    ) -> std::result::Result<(), BodyError> {
        let ctx: Arc<dyn TestContext> = self.ctx.clone();
        let info = RunInfo::new(names.to_vec(), warmup, ctx);
        run.method.invoke(&Call {
            args: &[],
            info: CallInfo::Run(&info),
        })?;
        Ok(())
    }

    fn run_custom(&self, run: &RunSpec, targets: &[&TestSpec]) -> std::result::Result<(), BodyError> {
        let names: Vec<String> = targets.iter().map(|t| t.name.clone()).collect();

        if run.mode == RunMode::Standalone {
            for name in &names {
                self.ctx.transition(name, TestState::Steady);
            }
            return self.invoke_run(run, &names, false);
        }

        let warmup = run.warmup.unwrap_or(self.config.default_warmup);
        for n in 1..=warmup {
            for name in &names {
                self.ctx.transition(name, TestState::Warmup(n));
            }
            self.invoke_run(run, &names, true)?;
        }

        let mut waiting = Vec::new();
        for test in targets {
            match test.level {
                CompLevel::Skip => self.ctx.transition(&test.name, TestState::Skipped),
                CompLevel::WaitForCompilation => waiting.push(*test),
                level => {
                    self.ctx.compile_at(&test.name, self.ctx.policy.resolve(level))?;
                }
            }
        }
        for _ in 0..self.ctx.max_compile_polls {
            let mut pending = Vec::new();
            for test in waiting {
                match self.ctx.whitebox.compilation_level(&test.qualified)? {
                    Some(level) => self.ctx.transition(&test.name, TestState::Compiled(level)),
                    None => pending.push(test),
                }
            }
            waiting = pending;
            if waiting.is_empty() {
                break;
            }
            self.invoke_run(run, &names, true)?;
        }
        for test in waiting {
            warn!(target: "jitcheck::controller", test = %test.name, "VM never compiled the test");
            self.ctx.transition(&test.name, TestState::Skipped);
        }

        for name in &names {
            self.ctx.transition(name, TestState::Steady);
        }
        self.invoke_run(run, &names, false)
    }

    fn collect_rules(
        &self,
        test: &TestSpec,
        flags: &dyn FlagSource,
        report: &mut RunReport,
    ) -> Result<()> {
        let level = self.ctx.whitebox.compilation_level(&test.qualified)?;
        let skipped = self.ctx.policy.skip_reason(test.level);
        let mut rules = Vec::with_capacity(test.rules.len());
        let mut applicable = false;
        for rule in &test.rules {
            let (status, reason) = if let Some(reason) = skipped {
                (RuleStatus::Skipped, Some(reason))
            } else if !rule_applies(rule.applicability.as_ref(), flags)? {
                (RuleStatus::NotApplicable, None)
            } else if level != Some(CompLevel::C2) {
                (RuleStatus::Skipped, Some(SkipReason::NotC2Compiled))
            } else {
                applicable = true;
                (RuleStatus::Applicable, None)
            };
            rules.push(RuleEntry {
                index: rule.index,
                status,
                reason,
            });
        }
        if applicable {
            match self.ctx.whitebox.ir_dump(&test.qualified)? {
                Some(dump) => report.dumps.push(dump),
                None => warn!(target: "jitcheck::controller", test = %test.qualified, "No IR dump available"),
            }
        }
        debug!(
            target: "jitcheck::controller",
            test = %test.qualified,
            level = ?level,
            rules = rules.len(),
            "Collected rule statuses"
        );
        report.encodings.push(RuleEncoding {
            method: test.qualified.clone(),
            level,
            rules,
        });
        Ok(())
    }
}
