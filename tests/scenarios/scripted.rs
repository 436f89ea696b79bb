//! Shell scripts standing in for test VMs.
#![cfg(unix)]

use crate::common::*;
use jitcheck::nodes::STORE;
use jitcheck::{
    ClassDecl, DriverConfig, Error, IrAnnotation, LaunchRequest, Launcher, MethodDecl,
    ProcessLauncher, Result, Scenario, TestFramework, VmOutput,
};
use tempfile::TempDir;

const ONE_STORE: &str = "  31  StoreI  === 5 7 30 29  [[ 40 ]]";
const TWO_STORES: &str = "  31  StoreI  === 5 7 30 29  [[ 40 ]]\n  32  StoreI  === 31 7 30 29  [[ 40 ]]";

fn class() -> ClassDecl {
    ClassDecl::new("pkg.S").method(
        MethodDecl::new("t")
            .test()
            .ir(IrAnnotation::new().counts([STORE, "1"])),
    )
}

fn framework(program: &std::path::Path, config: DriverConfig) -> TestFramework {
    TestFramework::new(class())
        .with_config(config)
        .with_launcher(sh(program))
}

/// Passes unless started with `-XX:+StressIGVN`.
fn stress_sensitive(dir: &TempDir) -> std::path::PathBuf {
    let body = format!(
        "case \"$*\" in\n*StressIGVN*)\n{}\n;;\n*)\n{}\n;;\nesac",
        print(&protocol("pkg.S::t", TWO_STORES)),
        print(&protocol("pkg.S::t", ONE_STORE)),
    );
    script(dir.path(), "vm.sh", &body)
}

#[test]
fn test_vm_failure_without_scenarios_is_returned_directly() {
    let dir = TempDir::new().unwrap();
    let vm = script(dir.path(), "vm.sh", "echo 'boom in t' >&2\nexit 1");

    match framework(&vm, DriverConfig::default()).run() {
        Err(Error::TestVm {
            scenario,
            exit_code,
            message,
            stderr,
            ..
        }) => {
            assert_eq!(scenario, None);
            assert_eq!(exit_code, Some(1));
            assert!(message.contains("boom in t"));
            assert!(!message.contains("Reproduce with"));
            assert!(stderr.contains("boom in t"));
        }
        other => panic!("expected a test VM failure, got {:?}", other.map(|v| v.len())),
    }
}

#[test]
fn reproducer_names_the_command_line() {
    let dir = TempDir::new().unwrap();
    let vm = script(dir.path(), "vm.sh", "exit 3");
    let config = DriverConfig {
        reproducer: true,
        ..DriverConfig::default()
    };

    let err = framework(&vm, config).run().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("test VM exited with code 3"));
    assert!(text.contains("Reproduce with: "));
    assert!(text.contains(&vm.display().to_string()));
    assert!(text.contains("--jitcheck-test-vm --class pkg.S"));
}

#[test]
fn only_stressed_scenarios_fail() {
    let dir = TempDir::new().unwrap();
    let vm = stress_sensitive(&dir);
    let mut fw = framework(&vm, DriverConfig::default());
    fw.add_scenarios([
        Scenario::new(0, Vec::<String>::new()),
        Scenario::new(1, ["-XX:+StressIGVN"]),
        Scenario::new(2, ["-XX:-UseCompressedOops"]),
    ])
    .unwrap();

    match fw.run() {
        Err(Error::ScenarioAggregate { failed, details }) => {
            assert_eq!(failed, vec![1]);
            assert!(details[0].contains("[found] 2 = 1 [given]"));
            assert!(details[0].contains("Violations (1)"));
        }
        other => panic!("expected an aggregate, got {:?}", other.map(|v| v.len())),
    }
}

#[test]
fn every_failing_scenario_is_listed_in_ascending_order() {
    let dir = TempDir::new().unwrap();
    let vm = script(dir.path(), "vm.sh", "echo crashed >&2\nexit 1");
    let config = DriverConfig {
        threads: Some(2),
        ..DriverConfig::default()
    };
    let mut fw = framework(&vm, config);
    fw.add_scenarios([
        Scenario::new(3, ["-XX:+StressGCM"]),
        Scenario::new(1, ["-XX:+StressLCM"]),
        Scenario::new(2, Vec::<String>::new()),
    ])
    .unwrap();

    let err = fw.run().unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("the following scenarios have failed: #1, #2, #3."));
    let first = text.find("##### Scenario #1 #####").unwrap();
    let last = text.find("##### Scenario #3 #####").unwrap();
    assert!(first < last);
    match err {
        Error::ScenarioAggregate { failed, details } => {
            assert_eq!(failed, vec![1, 2, 3]);
            assert!(details.iter().all(|d| d.contains("crashed")));
        }
        other => panic!("expected an aggregate, got {:?}", other),
    }
}

/// Sends scenario 1 to a program that does not exist.
struct Unlaunchable {
    good: ProcessLauncher,
    missing: ProcessLauncher,
}

impl Launcher for Unlaunchable {
    fn launch(&self, request: &LaunchRequest) -> Result<VmOutput> {
        match request.scenario {
            Some(1) => self.missing.launch(request),
            _ => self.good.launch(request),
        }
    }
}

#[test]
fn launch_errors_do_not_stop_other_scenarios() {
    let dir = TempDir::new().unwrap();
    let vm = stress_sensitive(&dir);
    let summary = dir.path().join("summary.json");
    let config = DriverConfig {
        summary_path: Some(summary.clone()),
        ..DriverConfig::default()
    };
    let mut fw = TestFramework::new(class())
        .with_config(config)
        .with_launcher(Unlaunchable {
            good: sh(&vm),
            missing: ProcessLauncher::new(dir.path().join("missing.sh")),
        });
    fw.add_scenarios([
        Scenario::new(0, Vec::<String>::new()),
        Scenario::new(1, Vec::<String>::new()),
        Scenario::new(2, ["-XX:+StressIGVN"]),
    ])
    .unwrap();

    match fw.run() {
        Err(Error::ScenarioAggregate { failed, details }) => {
            assert_eq!(failed, vec![1, 2]);
            assert!(details[0].contains("missing.sh"));
            assert!(details[1].contains("Violations (1)"));
        }
        other => panic!("expected an aggregate, got {:?}", other.map(|v| v.len())),
    }

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    let entries = written.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["scenario"], 0);
    assert_eq!(entries[0]["passed"], true);
    assert_eq!(entries[0]["results"][0]["outcome"]["outcome"], "passed");
    assert_eq!(entries[1]["passed"], false);
}

#[test]
fn passing_run_returns_one_verification_per_scenario() {
    let dir = TempDir::new().unwrap();
    let vm = stress_sensitive(&dir);
    let mut fw = framework(&vm, DriverConfig::default());
    fw.add_flags(["-XX:+UseG1GC"]);
    fw.add_scenarios([
        Scenario::new(5, ["-XX:-UseTLAB"]),
        Scenario::new(6, ["-XX:+UseSerialGC"]),
    ])
    .unwrap();

    let verifications = fw.run().unwrap();
    assert_eq!(verifications.len(), 2);
    assert!(verifications.iter().all(|v| v.is_success()));
}
