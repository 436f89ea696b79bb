//! Error types for jitcheck
//!
//! This module defines the error taxonomy shared by the validator, the test VM
//! and the scenario driver. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.
//!
//! | Variant | Raised | Fatal for |
//! |---------|--------|-----------|
//! | `FormatViolation` | before any execution | whole run |
//! | `NoTestsRun` | before any execution | whole run |
//! | `TestRun` | misuse at runtime (info handles, compilation) | current test |
//! | `TestVm` | a test body threw, or the test VM exited nonzero | its scenario |
//! | `IrViolation` | after compilation settled | its scenario |
//! | `ScenarioAggregate` | after all scenarios finished | whole run |

use std::io;
use thiserror::Error;

/// Result type alias for jitcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for jitcheck
#[derive(Debug, Error)]
pub enum Error {
    /// Static format violations found before any test ran.
    ///
    /// `report` is the fully rendered report including the `Violations (<N>)` trailer.
    #[error("{report}")]
    FormatViolation {
        /// Exact number of violation units (the trailer value)
        violations: usize,
        /// Rendered report text
        report: String,
    },

    /// Runtime misuse, e.g. querying a single-test accessor from a multi-target run.
    #[error("test run error: {0}")]
    TestRun(String),

    /// A Test/Check/Run body failed or the test VM exited with a nonzero status.
    #[error("test VM failure{}: {message}", scenario_suffix(.scenario))]
    TestVm {
        /// Scenario index, if the run belonged to a scenario
        scenario: Option<u32>,
        /// Exit code of the test VM, `None` when killed by a signal
        exit_code: Option<i32>,
        /// Summary of the failure
        message: String,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// One or more applicable IR rules failed.
    #[error("IR verification failed{}:\n{report}", scenario_suffix(.scenario))]
    IrViolation {
        /// Scenario index, if the run belonged to a scenario
        scenario: Option<u32>,
        /// Exact number of violation units (the trailer value)
        violations: usize,
        /// Rendered report text
        report: String,
    },

    /// At least one scenario failed. `failed` is sorted ascending.
    #[error("{}", render_aggregate(.failed, .details))]
    ScenarioAggregate {
        /// Indices of all failing scenarios, ascending
        failed: Vec<u32>,
        /// Per-scenario failure text, in the same order as `failed`
        details: Vec<String>,
    },

    /// Selection and exclusion left nothing to run.
    #[error("no tests run: {0}")]
    NoTestsRun(String),

    /// Malformed test or scenario selection.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A scenario index was registered twice.
    #[error("duplicate scenario index {0}")]
    DuplicateScenario(u32),

    /// Invalid driver configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (spawning, reading config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a [`Error::TestRun`] from anything printable.
    pub fn test_run(msg: impl Into<String>) -> Self {
        Error::TestRun(msg.into())
    }

    /// Number of violation units carried by this error, if it is a violation error.
    pub fn violation_count(&self) -> Option<usize> {
        match self {
            Error::FormatViolation { violations, .. } | Error::IrViolation { violations, .. } => {
                Some(*violations)
            }
            _ => None,
        }
    }

    /// True for failures that were detected before any test VM was spawned.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Error::FormatViolation { .. }
                | Error::NoTestsRun(_)
                | Error::InvalidSelection(_)
                | Error::DuplicateScenario(_)
                | Error::Config(_)
        )
    }
}

fn scenario_suffix(scenario: &Option<u32>) -> String {
    match scenario {
        Some(idx) => format!(" in scenario #{}", idx),
        None => String::new(),
    }
}

fn render_aggregate(failed: &[u32], details: &[String]) -> String {
    let list = failed
        .iter()
        .map(|idx| format!("#{}", idx))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!(
        "the following scenarios have failed: {}. Please check the details below:",
        list
    );
    for (idx, detail) in failed.iter().zip(details) {
        out.push_str(&format!("\n\n##### Scenario #{} #####\n{}", idx, detail));
    }
    out
}
