//! The self-hosting demo binary, driver and test VM in one.

use std::process::{Command, Output};

fn demo(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jitcheck-demo"));
    cmd.args(args);
    for key in [
        "JITCHECK_CONFIG",
        "JITCHECK_TESTS",
        "JITCHECK_EXCLUDE",
        "JITCHECK_SCENARIOS",
        "JITCHECK_DEFAULT_LEVEL",
    ] {
        cmd.env_remove(key);
    }
    cmd.envs(env.iter().copied());
    cmd.output().unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn default_scenarios_pass() {
    let out = demo(&[], &[]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("test VM 0: 3 rule(s) checked, 0 skipped"));
    // -TieredCompilation and TieredStopAtLevel=1 skip every rule
    assert!(text.contains("test VM 1: 3 rule(s) checked, 3 skipped"));
    assert!(text.contains("test VM 2: 3 rule(s) checked, 3 skipped"));
}

#[test]
fn stressed_scenario_fails_and_is_named() {
    let out = demo(&["", "-XX:+StressIGVN"], &[]);
    assert_eq!(out.status.code(), Some(jitcheck::EXIT_TEST_FAILURE));
    let text = stderr(&out);
    assert!(text.contains("the following scenarios have failed: #1."));
    assert!(text.contains("Method \"demo.Arithmetic::store\""));
    assert!(text.contains("[found] 2 = 1 [given]"));
    assert!(text.contains("Violations (1)"));
}

#[test]
fn scenario_selection_limits_the_run() {
    let out = demo(&["", "-XX:+StressIGVN"], &[("JITCHECK_SCENARIOS", "0")]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out).lines().count(), 1);
}

#[test]
fn malformed_selection_is_a_setup_failure() {
    let out = demo(&[], &[("JITCHECK_SCENARIOS", "x")]);
    assert_eq!(out.status.code(), Some(jitcheck::EXIT_SETUP_FAILURE));
    assert!(stderr(&out).contains("invalid selection"));
}

#[test]
fn unknown_scenario_index_fails_before_launch() {
    let out = demo(&[], &[("JITCHECK_SCENARIOS", "0,7")]);
    assert_eq!(out.status.code(), Some(jitcheck::EXIT_TEST_FAILURE));
    let text = stderr(&out);
    assert!(text.contains("no scenario registered with index 7"));
    assert!(stdout(&out).is_empty());
}

#[test]
fn duplicate_scenarios_are_rejected() {
    let mut framework = jitcheck::TestFramework::new(jitcheck::ClassDecl::new("pkg.D"));
    let err = framework
        .add_scenarios([
            jitcheck::Scenario::new(4, ["-Xint"]),
            jitcheck::Scenario::new(4, ["-Xint"]),
        ])
        .err()
        .unwrap();
    assert!(matches!(err, jitcheck::Error::DuplicateScenario(4)));
    assert!(framework.scenarios().is_empty());
}

#[test]
fn written_default_config_drives_a_passing_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("jitcheck.toml");
    let path_str = path.to_str().unwrap();

    let out = demo(&["--write-config", path_str], &[]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("# jitcheck driver configuration"));
    assert!(stdout(&out).is_empty());

    let out = demo(&[], &[("JITCHECK_CONFIG", path_str)]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out).lines().count(), 3);
}

#[test]
fn write_config_without_a_path_is_a_setup_failure() {
    let out = demo(&["--write-config"], &[]);
    assert_eq!(out.status.code(), Some(jitcheck::EXIT_SETUP_FAILURE));
    assert!(stderr(&out).contains("--write-config needs a path"));
}

#[test]
fn excluding_every_test_runs_nothing() {
    let out = demo(&[], &[("JITCHECK_EXCLUDE", "add,store,noAlloc")]);
    assert_eq!(out.status.code(), Some(jitcheck::EXIT_TEST_FAILURE));
    assert!(stderr(&out).contains("no tests run"));
}
