//! Test VM entry point
//!
//! The driver re-launches the user's binary with [`TEST_VM_MARKER`] followed
//! by the test VM arguments:
//!
//! ```text
//! --jitcheck-test-vm --class <name> [--test <name>]* [--flag <vm flag>]*
//!     [--default-level <level>] [--seed <n>] [--deterministic] [--verify-vm]
//! ```
//!
//! A binary hosting tests registers its classes on a [`TestVm`] and hands
//! control to [`TestVm::main`] when [`is_test_vm`] says so. Stdout carries
//! the rule encodings and IR dumps; everything else goes to stderr.

use crate::controller::{CompilationController, ControllerConfig, RunReport};
use crate::policy::CompilationPolicy;
use crate::whitebox::WhiteBox;
use clap::{Arg, ArgMatches, Command};
use jitcheck_core::protocol::TEST_VM_MARKER;
use jitcheck_core::{ClassDecl, CompLevel, Error, FlagCatalog, Result, VmFlags};
use jitcheck_verify::TestSuite;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Exit code when every unit passed.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when at least one unit failed.
pub const EXIT_TEST_FAILURE: i32 = 1;

/// Exit code when the run could not be set up.
pub const EXIT_SETUP_FAILURE: i32 = 2;

/// Flags appended to the VM flags by `--verify-vm`.
pub const VERIFY_VM_FLAGS: &[&str] = &["-XX:+VerifyOops", "-XX:+VerifyStack"];

/// Environment variable holding the test VM log level.
pub const LOG_ENV: &str = "JITCHECK_LOG";

/// Parsed test VM arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestVmArgs {
    /// Fully qualified name of the test class
    pub class: String,
    /// Selected tests; empty runs all
    pub tests: Vec<String>,
    /// VM flags of the scenario
    pub flags: Vec<String>,
    /// Level for tests declared `ANY`
    pub default_level: Option<CompLevel>,
    /// Seed for ordering and random arguments
    pub seed: Option<u64>,
    /// Keep declaration order
    pub deterministic: bool,
    /// Append [`VERIFY_VM_FLAGS`]
    pub verify_vm: bool,
}

impl TestVmArgs {
    /// Arguments for running `class`.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Self::default()
        }
    }

    /// Render back to the argument list following [`TEST_VM_MARKER`].
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![TEST_VM_MARKER.to_string(), "--class".into(), self.class.clone()];
        for test in &self.tests {
            args.push("--test".into());
            args.push(test.clone());
        }
        for flag in &self.flags {
            args.push(format!("--flag={}", flag));
        }
        if let Some(level) = self.default_level {
            args.push("--default-level".into());
            args.push(level.value().to_string());
        }
        if let Some(seed) = self.seed {
            args.push("--seed".into());
            args.push(seed.to_string());
        }
        if self.deterministic {
            args.push("--deterministic".into());
        }
        if self.verify_vm {
            args.push("--verify-vm".into());
        }
        args
    }

    /// VM flags including the verification set if requested.
    pub fn vm_flags(&self) -> VmFlags {
        let mut flags = VmFlags::from_args(self.flags.iter());
        if self.verify_vm {
            flags.extend(VERIFY_VM_FLAGS.iter().copied());
        }
        flags
    }
}

/// True if `args` contain [`TEST_VM_MARKER`].
pub fn is_test_vm<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().any(|a| a.as_ref() == TEST_VM_MARKER)
}

fn build_cli() -> Command {
    Command::new("jitcheck-test-vm")
        .about("Run the tests of one class and report rule statuses")
        .no_binary_name(true)
        .disable_help_flag(true)
        .arg(
            Arg::new("class")
                .long("class")
                .help("Fully qualified name of the test class")
                .required(true),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .help("Simple name of a test to run (repeatable)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("flag")
                .long("flag")
                .help("VM flag of the scenario (repeatable)")
                .allow_hyphen_values(true)
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("default-level")
                .long("default-level")
                .help("Compilation level for tests declared ANY"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for test order and random arguments"),
        )
        .arg(
            Arg::new("deterministic")
                .long("deterministic")
                .help("Run tests in declaration order")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verify-vm")
                .long("verify-vm")
                .help("Enable VM self-verification flags")
                .action(clap::ArgAction::SetTrue),
        )
}

fn strings(m: &ArgMatches, id: &str) -> Vec<String> {
    m.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// Parse the arguments following [`TEST_VM_MARKER`].
///
/// Anything before the marker belongs to the hosting binary and is ignored.
///
/// # Errors
///
/// [`Error::Config`] if the marker is missing or the arguments are malformed.
pub fn parse_args<I, S>(args: I) -> Result<TestVmArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let start = args
        .iter()
        .position(|a| a == TEST_VM_MARKER)
        .ok_or_else(|| Error::Config(format!("missing {}", TEST_VM_MARKER)))?;
    let m = build_cli()
        .try_get_matches_from(&args[start + 1..])
        .map_err(|e| Error::Config(e.to_string().trim_end().to_string()))?;

    let class = m
        .get_one::<String>("class")
        .cloned()
        .ok_or_else(|| Error::Config("missing --class".into()))?;
    let default_level = m
        .get_one::<String>("default-level")
        .map(|s| s.parse::<CompLevel>())
        .transpose()
        .map_err(Error::Config)?;
    let seed = m
        .get_one::<String>("seed")
        .map(|s| s.parse::<u64>())
        .transpose()
        .map_err(|e| Error::Config(format!("invalid --seed: {}", e)))?;

    Ok(TestVmArgs {
        class,
        tests: strings(&m, "test"),
        flags: strings(&m, "flag"),
        default_level,
        seed,
        deterministic: m.get_flag("deterministic"),
        verify_vm: m.get_flag("verify-vm"),
    })
}

/// Install the stderr log subscriber.
///
/// The level comes from [`LOG_ENV`] and defaults to `warn`. Calling this
/// more than once is harmless.
pub fn init_logging() {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|s| s.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::WARN);
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_ansi(false)
        .try_init();
}

/// Builds the runtime binding for one test VM run.
pub type WhiteBoxFactory = Box<dyn Fn(&VmFlags, CompilationPolicy) -> Arc<dyn WhiteBox> + Send + Sync>;

struct Registered {
    class: ClassDecl,
    helpers: Vec<ClassDecl>,
}

/// Registry of test classes runnable inside this process.
pub struct TestVm {
    catalog: FlagCatalog,
    classes: Vec<Registered>,
    whitebox: WhiteBoxFactory,
    config: ControllerConfig,
}

impl TestVm {
    /// Test VM binding its runtime through `whitebox`.
    pub fn new<F>(whitebox: F) -> Self
    where
        F: Fn(&VmFlags, CompilationPolicy) -> Arc<dyn WhiteBox> + Send + Sync + 'static,
    {
        Self {
            catalog: FlagCatalog::standard(),
            classes: Vec::new(),
            whitebox: Box::new(whitebox),
            config: ControllerConfig::default(),
        }
    }

    /// Replace the flag catalog.
    pub fn with_catalog(mut self, catalog: FlagCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the controller defaults; per-run arguments still override
    /// level, seed, ordering and selection.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Make `class` runnable, with helper classes.
    pub fn register(mut self, class: ClassDecl, helpers: Vec<ClassDecl>) -> Self {
        self.classes.push(Registered { class, helpers });
        self
    }

    /// Run the class named in `args`.
    ///
    /// Writes the protocol to `out` and every test failure to `err`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unknown class, [`Error::FormatViolation`] if
    /// the class is malformed, [`Error::TestRun`] for bad policy flags.
    pub fn execute(
        &self,
        args: &TestVmArgs,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<RunReport> {
        let registered = self
            .classes
            .iter()
            .find(|r| r.class.name == args.class)
            .ok_or_else(|| Error::Config(format!("unknown test class {}", args.class)))?;
        let suite = TestSuite::derive(&registered.class, &registered.helpers, &self.catalog)?;

        let flags = args.vm_flags();
        let policy = CompilationPolicy::from_flags(&flags.resolve(&self.catalog))?
            .with_default_level(args.default_level);
        let whitebox = (self.whitebox)(&flags, policy);
        debug!(target: "jitcheck::test_vm", class = %args.class, flags = ?flags.args(), %policy, "Starting test VM");

        let config = ControllerConfig {
            default_level: args.default_level,
            deterministic: args.deterministic || self.config.deterministic,
            seed: args.seed.or(self.config.seed),
            selection: args.tests.clone(),
            ..self.config.clone()
        };
        let controller =
            CompilationController::new(suite, whitebox, flags, self.catalog.clone(), config)?;
        let report = controller.run();

        report.write_protocol(out)?;
        for failure in &report.failures {
            writeln!(err, "{}", failure)?;
        }
        if !report.is_success() {
            writeln!(
                err,
                "{} test(s) failed (seed {})",
                report.failures.len(),
                controller.seed()
            )?;
        }
        err.flush()?;
        Ok(report)
    }

    /// Run with already parsed arguments and map the result to an exit code.
    pub fn run(&self, args: &TestVmArgs, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
        match self.execute(args, out, err) {
            Ok(report) if report.is_success() => EXIT_SUCCESS,
            Ok(_) => EXIT_TEST_FAILURE,
            Err(e) => {
                let _ = writeln!(err, "{}", e);
                EXIT_SETUP_FAILURE
            }
        }
    }

    /// Parse `args`, run, and return the exit code.
    pub fn run_args<I, S>(&self, args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match parse_args(args) {
            Ok(parsed) => self.run(&parsed, out, err),
            Err(e) => {
                let _ = writeln!(err, "{}", e);
                EXIT_SETUP_FAILURE
            }
        }
    }

    /// Process entry point: log to stderr, run on the process arguments.
    pub fn main(&self) -> i32 {
        init_logging();
        info!(target: "jitcheck::test_vm", classes = self.classes.len(), "Test VM started");
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();
        self.run_args(std::env::args(), &mut out, &mut err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whitebox::SimulatedWhiteBox;
    use jitcheck_core::{BodyError, Call, IrAnnotation, MethodDecl, ParamType};
    use jitcheck_verify::nodes::STORE;
    use jitcheck_verify::parse_output;

    fn vm() -> TestVm {
        let class = ClassDecl::new("pkg.Foo")
            .method(
                MethodDecl::new("store")
                    .test()
                    .warmup(2)
                    .ir(IrAnnotation::new().counts([STORE, "1"])),
            )
            .method(MethodDecl::new("plain").returns(ParamType::Int).test().warmup(1));
        let failing = ClassDecl::new("pkg.Bad").method(
            MethodDecl::new("t")
                .test()
                .body(|_call: &Call<'_>| Err(BodyError::from("kaboom"))),
        );
        TestVm::new(|_flags, policy| {
            Arc::new(SimulatedWhiteBox::new(policy).with_ir(
                "pkg.Foo::store",
                "  10  StoreI  === 1 2 3",
                "",
            ))
        })
        .register(class, Vec::new())
        .register(failing, Vec::new())
    }

    fn run(args: &[&str]) -> (i32, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = vm().run_args(args.iter().copied(), &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn parses_every_option() {
        let args = parse_args([
            "host-binary",
            TEST_VM_MARKER,
            "--class",
            "pkg.Foo",
            "--test",
            "a",
            "--test",
            "b",
            "--flag",
            "-XX:+UseNewCode",
            "--flag=-Xint",
            "--default-level",
            "C1",
            "--seed",
            "9",
            "--deterministic",
            "--verify-vm",
        ])
        .unwrap();
        assert_eq!(args.class, "pkg.Foo");
        assert_eq!(args.tests, vec!["a", "b"]);
        assert_eq!(args.flags, vec!["-XX:+UseNewCode", "-Xint"]);
        assert_eq!(args.default_level, Some(CompLevel::C1Simple));
        assert_eq!(args.seed, Some(9));
        assert!(args.deterministic);
        assert!(args.verify_vm);
    }

    #[test]
    fn rendered_args_parse_back() {
        let args = TestVmArgs {
            class: "pkg.Foo".into(),
            tests: vec!["t".into()],
            flags: vec!["-XX:TieredStopAtLevel=1".into()],
            default_level: Some(CompLevel::C2),
            seed: Some(3),
            deterministic: true,
            verify_vm: false,
        };
        assert!(is_test_vm(args.to_args()));
        assert_eq!(parse_args(args.to_args()).unwrap(), args);
    }

    #[test]
    fn malformed_args_are_config_errors() {
        assert!(matches!(parse_args(["--class", "A"]), Err(Error::Config(_))));
        assert!(matches!(parse_args([TEST_VM_MARKER]), Err(Error::Config(_))));
        assert!(matches!(
            parse_args([TEST_VM_MARKER, "--class", "A", "--default-level", "C7"]),
            Err(Error::Config(_))
        ));
        assert!(!is_test_vm(["--class", "A"]));
    }

    #[test]
    fn verify_vm_appends_verification_flags() {
        let mut args = TestVmArgs::new("A");
        args.flags.push("-Xbatch".into());
        args.verify_vm = true;
        let flags = args.vm_flags();
        assert_eq!(flags.args()[0], "-Xbatch");
        assert!(flags.args().iter().any(|f| f == "-XX:+VerifyOops"));
    }

    #[test]
    fn successful_run_writes_protocol() {
        let (code, out, err) = run(&[TEST_VM_MARKER, "--class", "pkg.Foo", "--deterministic"]);
        assert_eq!(code, EXIT_SUCCESS, "stderr: {}", err);
        let parsed = parse_output(&out).unwrap();
        assert_eq!(parsed.rules.len(), 1);
        assert!(parsed.dumps.contains_key("pkg.Foo::store"));
    }

    #[test]
    fn failing_body_exits_with_test_failure() {
        let (code, _out, err) = run(&[TEST_VM_MARKER, "--class", "pkg.Bad"]);
        assert_eq!(code, EXIT_TEST_FAILURE);
        assert!(err.contains("Test \"t\" failed"));
        assert!(err.contains("kaboom"));
    }

    #[test]
    fn unknown_class_is_a_setup_failure() {
        let (code, out, err) = run(&[TEST_VM_MARKER, "--class", "pkg.Missing"]);
        assert_eq!(code, EXIT_SETUP_FAILURE);
        assert!(out.is_empty());
        assert!(err.contains("unknown test class pkg.Missing"));
    }

    #[test]
    fn interpreter_only_scenario_still_succeeds() {
        let (code, out, _err) = run(&[TEST_VM_MARKER, "--class", "pkg.Foo", "--flag=-Xint"]);
        assert_eq!(code, EXIT_SUCCESS);
        let parsed = parse_output(&out).unwrap();
        assert!(parsed.dumps.is_empty());
    }
}
