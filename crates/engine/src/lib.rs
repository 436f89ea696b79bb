//! Test VM side of jitcheck
//!
//! This crate runs inside the test VM process:
//! - WhiteBox: compilation control and introspection of the runtime
//! - CompilationPolicy: reachable tiers and skip decisions from VM flags
//! - ArgumentsProvider: values for `@Arguments`
//! - CompilationController: warmup, compile, steady invocation per test
//! - TestVm: argument parsing, logging and the stdout protocol
//!
//! The controller is the only component that invokes test bodies. The
//! driver only ever sees what [`TestVm`] writes to stdout and stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arguments;
pub mod controller;
pub mod policy;
pub mod test_vm;
pub mod whitebox;

pub use arguments::ArgumentsProvider;
pub use controller::{
    CompilationController, ControllerConfig, RunReport, TestFailure, TestState, DEFAULT_WARMUP,
};
pub use policy::CompilationPolicy;
pub use test_vm::{
    init_logging, is_test_vm, parse_args, TestVm, TestVmArgs, WhiteBoxFactory, EXIT_SETUP_FAILURE,
    EXIT_SUCCESS, EXIT_TEST_FAILURE, VERIFY_VM_FLAGS,
};
pub use whitebox::{SimulatedWhiteBox, WhiteBox};
