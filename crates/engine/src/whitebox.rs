//! The runtime collaborator
//!
//! The harness never compiles anything itself. It asks a [`WhiteBox`] to
//! enqueue compilations, reports invocations to it, and reads back compiled
//! levels and IR dumps. A real binding wraps a VM's whitebox API; the
//! [`SimulatedWhiteBox`] models tiering from flags alone and serves canned
//! IR text, which is what the harness's own tests run against.

use crate::policy::CompilationPolicy;
use jitcheck_core::{CompLevel, IrMatchEvidence, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::trace;

/// Compilation control and introspection of the runtime under test.
///
/// Methods are identified by their qualified `Class::method` name.
pub trait WhiteBox: Send + Sync {
    /// Ask the runtime to compile `method` at `level`.
    ///
    /// Returns `false` if the runtime refused the request.
    fn enqueue_compilation(&self, method: &str, level: CompLevel) -> Result<bool>;

    /// Level `method` is currently compiled at, `None` while interpreted.
    fn compilation_level(&self, method: &str) -> Result<Option<CompLevel>>;

    /// Throw away compiled code of `method`.
    fn deoptimize(&self, method: &str) -> Result<()>;

    /// IR dump of the current compilation of `method`.
    fn ir_dump(&self, method: &str) -> Result<Option<IrMatchEvidence>>;

    /// Called after every invocation of `method`.
    fn notify_invocation(&self, _method: &str) {}
}

#[derive(Debug, Default)]
struct SimState {
    levels: HashMap<String, CompLevel>,
    invocations: HashMap<String, u64>,
}

/// In-memory runtime model.
///
/// Compilation requests succeed iff the policy can reach the level. Methods
/// invoked `compile_threshold` times are compiled at the highest reachable
/// tier on their own.
pub struct SimulatedWhiteBox {
    policy: CompilationPolicy,
    compile_threshold: u64,
    ir: HashMap<String, (String, String)>,
    state: Mutex<SimState>,
}

impl SimulatedWhiteBox {
    /// Runtime obeying `policy`.
    pub fn new(policy: CompilationPolicy) -> Self {
        Self {
            policy,
            compile_threshold: 10_000,
            ir: HashMap::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Invocations after which a method compiles by itself.
    pub fn with_compile_threshold(mut self, threshold: u64) -> Self {
        self.compile_threshold = threshold.max(1);
        self
    }

    /// IR text served for `method` once it is compiled.
    pub fn with_ir(
        mut self,
        method: impl Into<String>,
        ideal: impl Into<String>,
        assembly: impl Into<String>,
    ) -> Self {
        self.ir.insert(method.into(), (ideal.into(), assembly.into()));
        self
    }

    /// Number of recorded invocations of `method`.
    pub fn invocations(&self, method: &str) -> u64 {
        self.state.lock().invocations.get(method).copied().unwrap_or(0)
    }
}

impl WhiteBox for SimulatedWhiteBox {
    fn enqueue_compilation(&self, method: &str, level: CompLevel) -> Result<bool> {
        let level = self.policy.resolve(level);
        if !self.policy.can_compile(level) {
            trace!(target: "jitcheck::whitebox", method, %level, "Compilation refused");
            return Ok(false);
        }
        self.state.lock().levels.insert(method.to_string(), level);
        Ok(true)
    }

    fn compilation_level(&self, method: &str) -> Result<Option<CompLevel>> {
        Ok(self.state.lock().levels.get(method).copied())
    }

    fn deoptimize(&self, method: &str) -> Result<()> {
        self.state.lock().levels.remove(method);
        Ok(())
    }

    fn ir_dump(&self, method: &str) -> Result<Option<IrMatchEvidence>> {
        if self.compilation_level(method)?.is_none() {
            return Ok(None);
        }
        Ok(self.ir.get(method).map(|(ideal, assembly)| IrMatchEvidence {
            method: method.to_string(),
            ideal: ideal.clone(),
            assembly: assembly.clone(),
        }))
    }

    fn notify_invocation(&self, method: &str) {
        let mut state = self.state.lock();
        let count = state.invocations.entry(method.to_string()).or_insert(0);
        *count += 1;
        if *count >= self.compile_threshold && !state.levels.contains_key(method) {
            let level = self.policy.resolve(CompLevel::Any);
            if self.policy.can_compile(level) {
                state.levels.insert(method.to_string(), level);
            }
        }
    }
}
