//! Driver entry point
//!
//! [`TestFramework`] validates a test class in-process, then runs it in one
//! test VM per scenario (or a single test VM without scenarios) and turns
//! the outcomes into one result.

use crate::config::DriverConfig;
use crate::launcher::{LaunchRequest, Launcher, ProcessLauncher};
use crate::runner::{aggregate, write_summary, ScenarioRunner};
use crate::scenario::Scenario;
use jitcheck_core::{ClassDecl, Error, FlagCatalog, Result};
use jitcheck_engine::TestVmArgs;
use jitcheck_verify::{IrVerification, TestSuite};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Runs one test class under zero or more flag scenarios.
pub struct TestFramework {
    class: ClassDecl,
    helpers: Vec<ClassDecl>,
    catalog: FlagCatalog,
    flags: Vec<String>,
    scenarios: Vec<Scenario>,
    config: DriverConfig,
    launcher: Option<Arc<dyn Launcher>>,
}

impl TestFramework {
    /// Framework for `class` with default configuration.
    pub fn new(class: ClassDecl) -> Self {
        Self {
            class,
            helpers: Vec::new(),
            catalog: FlagCatalog::standard(),
            flags: Vec::new(),
            scenarios: Vec::new(),
            config: DriverConfig::default(),
            launcher: None,
        }
    }

    /// Replace the driver configuration.
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the flag catalog used for validation and applicability.
    pub fn with_catalog(mut self, catalog: FlagCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Launch test VMs through `launcher` instead of re-executing the
    /// current binary.
    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Classes whose methods tests may call; they are validated too.
    pub fn add_helper_classes<I>(&mut self, helpers: I) -> &mut Self
    where
        I: IntoIterator<Item = ClassDecl>,
    {
        self.helpers.extend(helpers);
        self
    }

    /// Flags passed to every test VM, before scenario flags.
    pub fn add_flags<I, S>(&mut self, flags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Register scenarios.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateScenario`] if an index is already registered or
    /// repeated in `scenarios`; nothing is registered then.
    pub fn add_scenarios<I>(&mut self, scenarios: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Scenario>,
    {
        let mut seen: BTreeSet<u32> = self.scenarios.iter().map(|s| s.index).collect();
        let batch: Vec<Scenario> = scenarios.into_iter().collect();
        for scenario in &batch {
            if !seen.insert(scenario.index) {
                return Err(Error::DuplicateScenario(scenario.index));
            }
        }
        self.scenarios.extend(batch);
        Ok(self)
    }

    /// Registered scenarios in registration order.
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Tests left after selection and exclusion, in declaration order.
    ///
    /// # Errors
    ///
    /// [`Error::NoTestsRun`] if nothing is left.
    pub fn selected_tests(&self, suite: &TestSuite) -> Result<Vec<String>> {
        let selected: Vec<String> = suite
            .tests
            .iter()
            .map(|t| t.name.clone())
            .filter(|name| self.config.tests.is_empty() || self.config.tests.contains(name))
            .filter(|name| !self.config.exclude.contains(name))
            .collect();
        if selected.is_empty() {
            return Err(Error::NoTestsRun(format!(
                "selection [{}] and exclusion [{}] leave no test of {}",
                self.config.tests.join(", "),
                self.config.exclude.join(", "),
                suite.class
            )));
        }
        Ok(selected)
    }

    fn chosen_scenarios(&self) -> Result<Vec<&Scenario>> {
        let Some(selection) = self.config.scenario_selection()? else {
            return Ok(self.scenarios.iter().collect());
        };
        let unknown: Vec<String> = selection
            .iter()
            .filter(|idx| !self.scenarios.iter().any(|s| s.index == **idx))
            .map(u32::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidSelection(format!(
                "no scenario registered with index {}",
                unknown.join(", ")
            )));
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| selection.contains(&s.index))
            .collect())
    }

    fn base_args(&self, suite: &TestSuite, tests: Vec<String>) -> Result<TestVmArgs> {
        let narrowed = tests.len() < suite.tests.len();
        Ok(TestVmArgs {
            class: self.class.name.clone(),
            tests: if narrowed { tests } else { Vec::new() },
            flags: self.flags.clone(),
            default_level: self.config.default_level()?,
            seed: self.config.seed,
            deterministic: self.config.deterministic,
            verify_vm: self.config.verify_vm,
        })
    }

    fn requests(&self, suite: &TestSuite) -> Result<Vec<LaunchRequest>> {
        let tests = self.selected_tests(suite)?;
        let base = self.base_args(suite, tests)?;
        if self.scenarios.is_empty() {
            if self.config.scenarios.is_some() {
                return Err(Error::InvalidSelection(
                    "scenario selection given but no scenarios are registered".to_string(),
                ));
            }
            return Ok(vec![LaunchRequest {
                scenario: None,
                args: base,
            }]);
        }
        Ok(self
            .chosen_scenarios()?
            .into_iter()
            .map(|scenario| {
                let mut args = base.clone();
                args.flags.extend(scenario.flags.iter().cloned());
                LaunchRequest {
                    scenario: Some(scenario.index),
                    args,
                }
            })
            .collect())
    }

    /// Validate, launch and verify.
    ///
    /// Returns one verification per test VM, in scenario order.
    ///
    /// # Errors
    ///
    /// Before any launch: [`Error::FormatViolation`], [`Error::NoTestsRun`],
    /// [`Error::InvalidSelection`], [`Error::Config`]. Without scenarios the
    /// single test VM's error is returned as is; with scenarios every failure
    /// is folded into [`Error::ScenarioAggregate`].
    pub fn run(&self) -> Result<Vec<IrVerification>> {
        let suite = TestSuite::derive(&self.class, &self.helpers, &self.catalog)?;
        let requests = self.requests(&suite)?;

        let launcher: Arc<dyn Launcher> = match &self.launcher {
            Some(launcher) => Arc::clone(launcher),
            None => Arc::new(ProcessLauncher::current_exe()?),
        };
        info!(
            target: "jitcheck::driver",
            class = %self.class.name,
            test_vms = requests.len(),
            scenarios = self.scenarios.len(),
            "Starting test run"
        );

        let runner = ScenarioRunner::new(&suite, launcher.as_ref())
            .with_reproducer(self.config.reproducer)
            .with_parallel(self.config.parallel, self.config.threads);
        let mut outcomes = runner.run_all(&requests)?;
        if let Some(path) = &self.config.summary_path {
            write_summary(path, &outcomes)?;
        }

        if self.scenarios.is_empty() {
            return match outcomes.pop() {
                Some(outcome) => outcome.result.map(|v| vec![v]),
                None => Err(Error::NoTestsRun(format!("no test VM ran for {}", self.class.name))),
            };
        }
        aggregate(outcomes)
    }
}
