//! Scenario fan-out and aggregation
//!
//! Each launch request becomes one test VM process. Results are judged in
//! the driver: a nonzero exit is a test VM failure, otherwise the stdout
//! protocol is parsed and every applicable IR rule is verified. Failing
//! scenarios are aggregated in ascending index order regardless of the order
//! in which they finished.

use crate::launcher::{LaunchRequest, Launcher, VmOutput};
use jitcheck_core::{Error, Result};
use jitcheck_verify::{parse_output, verify, IrVerification, RuleResult, TestSuite};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of one launch request.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Scenario index, `None` for a run without scenarios
    pub scenario: Option<u32>,
    /// Verification of a passing run, or why it failed
    pub result: Result<IrVerification>,
}

impl ScenarioOutcome {
    /// True if the scenario passed.
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Serialize)]
struct ScenarioSummary<'a> {
    scenario: Option<u32>,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    results: &'a [RuleResult],
}

fn reproduce_hint(output: &VmOutput) -> String {
    format!("\nReproduce with: {}", output.command_line)
}

/// Judge one finished test VM.
///
/// # Errors
///
/// [`Error::TestVm`] on a nonzero exit, [`Error::IrViolation`] if an
/// applicable rule failed, [`Error::TestRun`] for a malformed protocol.
pub fn evaluate(
    suite: &TestSuite,
    scenario: Option<u32>,
    output: &VmOutput,
    reproducer: bool,
) -> Result<IrVerification> {
    if !output.success() {
        let mut message = match output.exit_code {
            Some(code) => format!("test VM exited with code {}", code),
            None => "test VM was terminated by a signal".to_string(),
        };
        let stderr = output.stderr.trim_end();
        if !stderr.is_empty() {
            message.push_str(":\n");
            message.push_str(stderr);
        }
        if reproducer {
            message.push_str(&reproduce_hint(output));
        }
        return Err(Error::TestVm {
            scenario,
            exit_code: output.exit_code,
            message,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        });
    }

    let parsed = parse_output(&output.stdout)?;
    let verification = verify(suite, &parsed)?;
    if let Err(Error::IrViolation {
        scenario,
        violations,
        mut report,
    }) = verification.ensure_passed(scenario)
    {
        if reproducer {
            report.push_str(&reproduce_hint(output));
        }
        return Err(Error::IrViolation {
            scenario,
            violations,
            report,
        });
    }
    Ok(verification)
}

/// Runs launch requests and judges their output.
pub struct ScenarioRunner<'a> {
    suite: &'a TestSuite,
    launcher: &'a dyn Launcher,
    reproducer: bool,
    parallel: bool,
    threads: Option<usize>,
}

impl<'a> ScenarioRunner<'a> {
    /// Sequential runner without reproducer hints.
    pub fn new(suite: &'a TestSuite, launcher: &'a dyn Launcher) -> Self {
        Self {
            suite,
            launcher,
            reproducer: false,
            parallel: false,
            threads: None,
        }
    }

    /// Append the test VM command line to failure text.
    pub fn with_reproducer(mut self, enabled: bool) -> Self {
        self.reproducer = enabled;
        self
    }

    /// Run scenarios concurrently, on `threads` workers if given.
    pub fn with_parallel(mut self, enabled: bool, threads: Option<usize>) -> Self {
        self.parallel = enabled;
        self.threads = threads;
        self
    }

    /// Launch and judge one request.
    pub fn run_one(&self, request: &LaunchRequest) -> ScenarioOutcome {
        let result = self
            .launcher
            .launch(request)
            .and_then(|output| evaluate(self.suite, request.scenario, &output, self.reproducer));
        match &result {
            Ok(v) => debug!(
                target: "jitcheck::runner",
                scenario = ?request.scenario,
                rules = v.results().len(),
                skipped = v.skipped().count(),
                "Scenario passed"
            ),
            Err(e) => warn!(target: "jitcheck::runner", scenario = ?request.scenario, error = %e, "Scenario failed"),
        }
        ScenarioOutcome {
            scenario: request.scenario,
            result,
        }
    }

    /// Run every request; outcomes come back in request order.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the worker pool cannot be built.
    pub fn run_all(&self, requests: &[LaunchRequest]) -> Result<Vec<ScenarioOutcome>> {
        info!(
            target: "jitcheck::runner",
            scenarios = requests.len(),
            parallel = self.parallel,
            "Running scenarios"
        );
        if !self.parallel || requests.len() < 2 {
            return Ok(requests.iter().map(|r| self.run_one(r)).collect());
        }
        let run = || -> Vec<ScenarioOutcome> {
            requests.par_iter().map(|r| self.run_one(r)).collect()
        };
        match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::Config(format!("cannot build scenario pool: {}", e)))?;
                Ok(pool.install(run))
            }
            None => Ok(run()),
        }
    }
}

/// Fold scenario outcomes into one result.
///
/// # Errors
///
/// [`Error::ScenarioAggregate`] naming every failed scenario in ascending
/// index order.
pub fn aggregate(outcomes: Vec<ScenarioOutcome>) -> Result<Vec<IrVerification>> {
    let mut passed = Vec::new();
    let mut failed: Vec<(u32, String)> = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(v) => passed.push(v),
            Err(e) => failed.push((outcome.scenario.unwrap_or_default(), e.to_string())),
        }
    }
    if failed.is_empty() {
        return Ok(passed);
    }
    failed.sort_by_key(|(index, _)| *index);
    let (failed, details) = failed.into_iter().unzip();
    Err(Error::ScenarioAggregate { failed, details })
}

/// Write a JSON summary of `outcomes` to `path`.
pub fn write_summary(path: &Path, outcomes: &[ScenarioOutcome]) -> Result<()> {
    let summary: Vec<ScenarioSummary<'_>> = outcomes
        .iter()
        .map(|o| ScenarioSummary {
            scenario: o.scenario,
            passed: o.passed(),
            error: o.result.as_ref().err().map(ToString::to_string),
            results: o.result.as_ref().map(|v| v.results()).unwrap_or(&[]),
        })
        .collect();
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| Error::Config(format!("cannot serialize summary: {}", e)))?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitcheck_core::protocol::{
        ASSEMBLY_SECTION, DUMP_BEGIN, DUMP_END, IDEAL_SECTION, RULES_PREFIX,
    };
    use jitcheck_core::{ClassDecl, FlagCatalog, IrAnnotation, MethodDecl};
    use jitcheck_engine::TestVmArgs;
    use jitcheck_verify::nodes::STORE;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn suite() -> TestSuite {
        let class = ClassDecl::new("pkg.Foo").method(
            MethodDecl::new("t")
                .test()
                .ir(IrAnnotation::new().counts([STORE, "1"])),
        );
        TestSuite::derive(&class, &[], &FlagCatalog::standard()).unwrap()
    }

    fn stdout(stores: usize) -> String {
        let mut out = format!(
            "{}{{\"method\":\"pkg.Foo::t\",\"level\":\"C2\",\"rules\":[{{\"index\":1,\"status\":\"applicable\"}}]}}\n",
            RULES_PREFIX
        );
        out.push_str(&format!("{}pkg.Foo::t\n{}\n", DUMP_BEGIN, IDEAL_SECTION));
        for i in 0..stores {
            out.push_str(&format!("  {}  StoreI  === 1 2 3\n", 10 + i));
        }
        out.push_str(&format!("{}\n{}\n", ASSEMBLY_SECTION, DUMP_END));
        out
    }

    fn ok(stdout: String) -> VmOutput {
        VmOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
            command_line: "host --jitcheck-test-vm --class pkg.Foo".into(),
        }
    }

    /// Serves canned output per scenario and records launches.
    struct Scripted {
        outputs: HashMap<Option<u32>, VmOutput>,
        launched: Mutex<Vec<Option<u32>>>,
    }

    impl Launcher for Scripted {
        fn launch(&self, request: &LaunchRequest) -> Result<VmOutput> {
            self.launched.lock().push(request.scenario);
            self.outputs
                .get(&request.scenario)
                .cloned()
                .ok_or_else(|| Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such binary",
                )))
        }
    }

    fn request(scenario: u32) -> LaunchRequest {
        LaunchRequest {
            scenario: Some(scenario),
            args: TestVmArgs::new("pkg.Foo"),
        }
    }

    #[test]
    fn passing_output_verifies() {
        let v = evaluate(&suite(), None, &ok(stdout(1)), false).unwrap();
        assert!(v.is_success());
        assert_eq!(v.results().len(), 1);
    }

    #[test]
    fn wrong_count_is_ir_violation_with_reproducer() {
        let err = evaluate(&suite(), Some(3), &ok(stdout(2)), true).unwrap_err();
        match err {
            Error::IrViolation {
                scenario,
                violations,
                report,
            } => {
                assert_eq!(scenario, Some(3));
                assert_eq!(violations, 1);
                assert!(report.contains("Reproduce with: host --jitcheck-test-vm"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nonzero_exit_is_test_vm_failure() {
        let output = VmOutput {
            exit_code: Some(1),
            stdout: stdout(1),
            stderr: "Test \"t\" failed: boom\n".into(),
            command_line: "host".into(),
        };
        let err = evaluate(&suite(), Some(0), &output, false).unwrap_err();
        assert!(matches!(err, Error::TestVm { exit_code: Some(1), .. }));
        assert!(err.to_string().contains("boom"));
        assert!(!err.to_string().contains("Reproduce with"));
    }

    #[test]
    fn aggregate_lists_failures_ascending() {
        let mut outputs = HashMap::new();
        outputs.insert(Some(0), ok(stdout(1)));
        outputs.insert(Some(5), ok(stdout(3)));
        let launcher = Scripted {
            outputs,
            launched: Mutex::new(Vec::new()),
        };
        let s = suite();
        let runner = ScenarioRunner::new(&s, &launcher).with_parallel(true, Some(2));
        let outcomes = runner
            .run_all(&[request(5), request(2), request(0)])
            .unwrap();
        assert_eq!(
            outcomes.iter().map(|o| o.scenario).collect::<Vec<_>>(),
            vec![Some(5), Some(2), Some(0)]
        );
        assert_eq!(launcher.launched.lock().len(), 3);
        match aggregate(outcomes).unwrap_err() {
            Error::ScenarioAggregate { failed, details } => {
                assert_eq!(failed, vec![2, 5]);
                assert!(details[0].contains("no such binary"));
                assert!(details[1].contains("IR verification failed"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn summary_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let s = suite();
        let outcomes = vec![ScenarioOutcome {
            scenario: Some(1),
            result: evaluate(&s, Some(1), &ok(stdout(1)), false),
        }];
        write_summary(&path, &outcomes).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["scenario"], 1);
        assert_eq!(json[0]["passed"], true);
        assert_eq!(json[0]["results"][0]["outcome"]["outcome"], "passed");
    }
}
