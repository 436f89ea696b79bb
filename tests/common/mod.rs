//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use jitcheck::{
    CompilationController, CompilationPolicy, ControllerConfig, FlagCatalog, FormatReport,
    FormatValidator, IrVerification, ProcessLauncher, RunReport, SimulatedWhiteBox, TestSuite,
    VmFlags,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// Format validation
// ============================================================================

pub fn validate(class: &jitcheck::ClassDecl, helpers: &[jitcheck::ClassDecl]) -> FormatReport {
    FormatValidator::new(&FlagCatalog::standard()).validate(class, helpers)
}

pub fn violations(class: &jitcheck::ClassDecl) -> usize {
    validate(class, &[]).violation_count()
}

// ============================================================================
// In-process test VM
// ============================================================================

/// IR text served for one method by the simulated runtime.
pub struct Ir {
    pub method: &'static str,
    pub ideal: &'static str,
    pub assembly: &'static str,
}

/// Run `class` inside this process under `flags` and return what the test
/// VM would have reported.
pub fn run_in_process(class: &jitcheck::ClassDecl, flags: &[&str], ir: &[Ir]) -> RunReport {
    let catalog = FlagCatalog::standard();
    let suite = TestSuite::derive(class, &[], &catalog).expect("class should be well formed");
    let flags = VmFlags::from_args(flags.iter().copied());
    let policy = CompilationPolicy::from_flags(&flags.resolve(&catalog)).unwrap();
    let mut whitebox = SimulatedWhiteBox::new(policy);
    for i in ir {
        whitebox = whitebox.with_ir(i.method, i.ideal, i.assembly);
    }
    let config = ControllerConfig {
        default_warmup: 10,
        deterministic: true,
        seed: Some(7),
        ..ControllerConfig::default()
    };
    CompilationController::new(suite, Arc::new(whitebox), flags, catalog, config)
        .unwrap()
        .run()
}

/// Run in process, then verify the protocol output the way the driver does.
pub fn run_and_verify(
    class: &jitcheck::ClassDecl,
    flags: &[&str],
    ir: &[Ir],
) -> jitcheck::Result<IrVerification> {
    let report = run_in_process(class, flags, ir);
    assert!(report.is_success(), "test VM failures: {:?}", report.failures);
    let mut stdout = Vec::new();
    report.write_protocol(&mut stdout).unwrap();
    let output = jitcheck::parse_output(&String::from_utf8(stdout).unwrap())?;
    let suite = TestSuite::derive(class, &[], &FlagCatalog::standard())?;
    jitcheck::verify(&suite, &output)
}

// ============================================================================
// Scripted test VMs
// ============================================================================

/// Write an executable shell script standing in for a test VM.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Launcher running `script` through `/bin/sh`.
pub fn sh(script: &Path) -> ProcessLauncher {
    ProcessLauncher::new("/bin/sh").with_leading_args([script.display().to_string()])
}

/// Shell snippet printing `text` to stdout verbatim.
pub fn print(text: &str) -> String {
    format!("cat <<'JITCHECK_EOF'\n{}\nJITCHECK_EOF", text.trim_end())
}

/// Protocol output for `method` with one applicable rule and `ideal` as dump.
pub fn protocol(method: &str, ideal: &str) -> String {
    format!(
        "##### jitcheck-rules: {{\"method\":\"{m}\",\"level\":\"C2\",\"rules\":[{{\"index\":1,\"status\":\"applicable\"}}]}}\n\
         ##### jitcheck-ir-dump: {m}\n\
         --- ideal ---\n\
         {ideal}\n\
         --- assembly ---\n\
         ##### jitcheck-ir-dump-end\n",
        m = method,
        ideal = ideal
    )
}
