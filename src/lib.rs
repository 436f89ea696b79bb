//! jitcheck - annotation-driven verification of JIT compiler IR
//!
//! Test classes are declared as data ([`ClassDecl`] / [`MethodDecl`]) with
//! `@Test`, `@Check`, `@Run` and `@IR` annotations. The driver validates the
//! declaration, runs it in one test VM process per flag [`Scenario`], and
//! matches the IR the compiler produced against every applicable rule.
//!
//! # Quick Start
//!
//! ```ignore
//! use jitcheck::{is_test_vm, ClassDecl, MethodDecl, TestFramework, TestVm};
//! use jitcheck::nodes::STORE;
//!
//! fn main() {
//!     if is_test_vm(std::env::args()) {
//!         std::process::exit(test_vm().main());
//!     }
//!     TestFramework::new(my_class()).run().unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! - `jitcheck-core`: declarations, levels, flags, errors, stdout protocol
//! - `jitcheck-verify`: format validation, applicability, IR matching, reports
//! - `jitcheck-engine`: the test VM side, driving warmup and compilation
//! - `jitcheck-executor`: the driver side, launching and judging test VMs

pub use jitcheck_core::*;
pub use jitcheck_engine::{
    init_logging, is_test_vm, CompilationController, CompilationPolicy, ControllerConfig,
    RunReport, SimulatedWhiteBox, TestVm, TestVmArgs, WhiteBox, EXIT_SETUP_FAILURE, EXIT_SUCCESS,
    EXIT_TEST_FAILURE,
};
pub use jitcheck_executor::{
    DriverConfig, LaunchRequest, Launcher, ProcessLauncher, Scenario, TestFramework, VmOutput,
};
pub use jitcheck_verify::{
    nodes, parse_output, verify, FormatReport, FormatValidator, IrVerification, RuleOutcome,
    TestSuite, FORMAT_HEADER, IR_HEADER,
};
