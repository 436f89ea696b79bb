//! # jitcheck Executor
//!
//! The driver side of jitcheck. It provides:
//! - [`TestFramework`] - validate a test class, run it per scenario, verify IR
//! - [`Scenario`] - one VM flag configuration, run in its own process
//! - [`DriverConfig`] - `jitcheck.toml` plus `JITCHECK_*` overrides
//! - [`Launcher`] - the seam between the driver and test VM processes
//!
//! ## Quick Start
//!
//! ```text
//! use jitcheck_executor::{DriverConfig, Scenario, TestFramework};
//!
//! let mut framework = TestFramework::new(my_class())
//!     .with_config(DriverConfig::from_env()?);
//! framework.add_scenarios([
//!     Scenario::new(0, ["-XX:-TieredCompilation"]),
//!     Scenario::new(1, ["-XX:TieredStopAtLevel=1"]),
//! ])?;
//! framework.run()?;
//! ```
//!
//! The same binary must hand control to a `jitcheck_engine::TestVm` when
//! started with the test VM marker; the driver re-executes itself for every
//! scenario.
//!
//! ## Failure Kinds
//!
//! | Error | Raised |
//! |-------|--------|
//! | `FormatViolation` | before any launch, malformed class |
//! | `NoTestsRun` | before any launch, selection left nothing |
//! | `InvalidSelection` | before any launch, bad scenario selection |
//! | `TestVm` | a test VM exited nonzero |
//! | `IrViolation` | an applicable IR rule failed |
//! | `ScenarioAggregate` | one or more scenarios failed |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod framework;
pub mod launcher;
pub mod runner;
pub mod scenario;

pub use config::DriverConfig;
pub use framework::TestFramework;
pub use launcher::{LaunchRequest, Launcher, ProcessLauncher, VmOutput};
pub use runner::{aggregate, evaluate, ScenarioOutcome, ScenarioRunner};
pub use scenario::{parse_selection, Scenario};
