//! Driver configuration via `jitcheck.toml` and `JITCHECK_*` variables
//!
//! The file named by `JITCHECK_CONFIG` is read first, if any; environment
//! variables then override individual fields.

use crate::scenario::{parse_names, parse_selection};
use jitcheck_core::{CompLevel, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "jitcheck.toml";

/// Variable naming the config file.
pub const ENV_CONFIG: &str = "JITCHECK_CONFIG";
/// Comma separated tests to run.
pub const ENV_TESTS: &str = "JITCHECK_TESTS";
/// Comma separated tests to skip.
pub const ENV_EXCLUDE: &str = "JITCHECK_EXCLUDE";
/// Comma separated scenario indices to run.
pub const ENV_SCENARIOS: &str = "JITCHECK_SCENARIOS";
/// Level for tests declared `ANY`.
pub const ENV_DEFAULT_LEVEL: &str = "JITCHECK_DEFAULT_LEVEL";
/// Enable VM self-verification flags.
pub const ENV_VERIFY_VM: &str = "JITCHECK_VERIFY_VM";
/// Include the test VM command line in failures.
pub const ENV_REPRODUCER: &str = "JITCHECK_REPRODUCER";
/// Run tests in declaration order.
pub const ENV_DETERMINISTIC: &str = "JITCHECK_DETERMINISTIC";
/// Run scenarios concurrently.
pub const ENV_PARALLEL: &str = "JITCHECK_PARALLEL";

/// Driver configuration loaded from `jitcheck.toml`.
///
/// # Example
///
/// ```toml
/// tests = ["testAdd"]
/// scenarios = "0,2"
/// default_level = "C2"
/// verify_vm = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Tests to run; empty runs all
    pub tests: Vec<String>,
    /// Tests never to run
    pub exclude: Vec<String>,
    /// Scenario index selection, e.g. `"1,3"`; unset runs all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<String>,
    /// Level for tests declared `ANY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_level: Option<String>,
    /// Append the VM self-verification flags
    pub verify_vm: bool,
    /// Put the full test VM command line into failure text
    pub reproducer: bool,
    /// Run tests in declaration order instead of shuffling
    pub deterministic: bool,
    /// Seed for test order and random arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Run scenarios concurrently
    pub parallel: bool,
    /// Worker threads for concurrent scenarios; unset uses the rayon default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Write a JSON summary of every scenario here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tests: Vec::new(),
            exclude: Vec::new(),
            scenarios: None,
            default_level: None,
            verify_vm: false,
            reproducer: false,
            deterministic: false,
            seed: None,
            parallel: true,
            threads: None,
            summary_path: None,
        }
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, found '{}'",
            var, other
        ))),
    }
}

impl DriverConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# jitcheck driver configuration
#
# Tests to run (default: all) and tests to skip.
tests = []
exclude = []

# Scenario indices to run, comma separated (default: all).
# scenarios = "0,2"

# Compilation level for tests declared ANY (default: highest reachable tier).
# default_level = "C2"

# Append VM self-verification flags to every test VM.
verify_vm = false

# Include the full test VM command line in failure text.
reproducer = false

# Run tests in declaration order instead of shuffling them.
deterministic = false
# seed = 42

# Run scenarios concurrently.
parallel = true
# threads = 4

# summary_path = "target/jitcheck-summary.json"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: DriverConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Config from `JITCHECK_CONFIG` (or defaults) overridden by the process
    /// environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`DriverConfig::from_env`] with variables looked up through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match var(ENV_CONFIG) {
            Some(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(var)?;
        Ok(config)
    }

    /// Override fields from `JITCHECK_*` variables looked up through `var`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a malformed boolean or level,
    /// [`Error::InvalidSelection`] for a malformed scenario selection.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = var(ENV_TESTS) {
            self.tests = parse_names(&raw);
        }
        if let Some(raw) = var(ENV_EXCLUDE) {
            self.exclude = parse_names(&raw);
        }
        if let Some(raw) = var(ENV_SCENARIOS) {
            self.scenarios = Some(raw);
        }
        if let Some(raw) = var(ENV_DEFAULT_LEVEL) {
            self.default_level = Some(raw.trim().to_string()).filter(|s| !s.is_empty());
        }
        for (name, field) in [
            (ENV_VERIFY_VM, &mut self.verify_vm),
            (ENV_REPRODUCER, &mut self.reproducer),
            (ENV_DETERMINISTIC, &mut self.deterministic),
            (ENV_PARALLEL, &mut self.parallel),
        ] {
            if let Some(raw) = var(name) {
                *field = parse_bool(name, &raw)?;
            }
        }
        self.validate()
    }

    /// Parsed default level override.
    pub fn default_level(&self) -> Result<Option<CompLevel>> {
        self.default_level
            .as_deref()
            .map(|raw| {
                raw.parse::<CompLevel>()
                    .map_err(|e| Error::Config(format!("default_level: {}", e)))
            })
            .transpose()
    }

    /// Parsed scenario selection; `None` selects every scenario.
    pub fn scenario_selection(&self) -> Result<Option<BTreeSet<u32>>> {
        self.scenarios.as_deref().map(parse_selection).transpose()
    }

    fn validate(&self) -> Result<()> {
        self.default_level()?;
        self.scenario_selection()?;
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        Ok(())
    }
}
