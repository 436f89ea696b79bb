//! Test VM process launch
//!
//! Every scenario runs in a fresh process so that contradictory VM flags of
//! different scenarios never meet. The [`Launcher`] seam lets tests swap the
//! process for a scripted one.

use jitcheck_core::{Error, Result};
use jitcheck_engine::TestVmArgs;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// One test VM launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Scenario index, `None` for a run without scenarios
    pub scenario: Option<u32>,
    /// Arguments following the test VM marker
    pub args: TestVmArgs,
}

/// Captured result of a finished test VM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmOutput {
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Full command line, for reproducing the run by hand
    pub command_line: String,
}

impl VmOutput {
    /// True if the test VM exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Starts test VMs and waits for them.
pub trait Launcher: Send + Sync {
    /// Run one test VM to completion.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the process could not be started or awaited. A test
    /// VM that ran and failed is a successful launch.
    fn launch(&self, request: &LaunchRequest) -> Result<VmOutput>;
}

/// Launches `<program> <leading args> <test VM args>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    leading_args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ProcessLauncher {
    /// Launcher for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Launcher re-executing the current binary.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Arguments placed before the test VM arguments.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Full argument list for `request`.
    pub fn arguments(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(request.args.to_args());
        args
    }

    /// Printable command line for `request`.
    pub fn command_line(&self, request: &LaunchRequest) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.arguments(request).into_iter().map(|a| quote(&a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=+:.,/@%".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<VmOutput> {
        let command_line = self.command_line(request);
        debug!(target: "jitcheck::launcher", scenario = ?request.scenario, command = %command_line, "Spawning test VM");
        let output = Command::new(&self.program)
            .args(self.arguments(request))
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("cannot launch {}: {}", self.program.display(), e),
                ))
            })?;
        debug!(
            target: "jitcheck::launcher",
            scenario = ?request.scenario,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Test VM exited"
        );
        Ok(VmOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            command_line,
        })
    }
}
