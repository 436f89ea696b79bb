//! Self-hosting demo: this binary is both the driver and the test VM.
//!
//! Without arguments `demo.Arithmetic` runs under three scenarios. Each
//! argument replaces them with one scenario whose comma separated flags are
//! the argument (an empty argument is a scenario without extra flags).
//!
//! `--write-config <path>` writes the commented default driver config to
//! `path` unless it exists, and exits.
//!
//! The simulated compiler emits a duplicate store under `-XX:+StressIGVN`,
//! so any scenario enabling it fails IR verification.

use jitcheck::nodes::{ADD_I, ALLOC, STORE};
use jitcheck::{
    init_logging, is_test_vm, Argument, Call, CheckAt, ClassDecl, CompilationPolicy,
    DriverConfig, IrAnnotation, MethodDecl, ParamType, Scenario, SimulatedWhiteBox, TestFramework,
    TestVm, Value, VmFlags, WhiteBox, EXIT_SETUP_FAILURE, EXIT_TEST_FAILURE,
};
use std::path::Path;
use std::process;
use std::sync::Arc;

const CLASS: &str = "demo.Arithmetic";

fn arithmetic() -> ClassDecl {
    ClassDecl::new(CLASS)
        .method(
            MethodDecl::new("add")
                .param(ParamType::Int)
                .param(ParamType::Int)
                .returns(ParamType::Int)
                .test()
                .arguments([Argument::Number42, Argument::RandomEach])
                .ir(IrAnnotation::new().counts([ADD_I, "1"]))
                .body(|call: &Call<'_>| {
                    let a = call.args[0].as_i64().unwrap_or_default() as i32;
                    let b = call.args[1].as_i64().unwrap_or_default() as i32;
                    Ok(Value::Int(a.wrapping_add(b)))
                }),
        )
        .method(
            MethodDecl::new("checkAdd")
                .param(ParamType::Int)
                .param(ParamType::TestInfo)
                .check("add", CheckAt::Always)
                .body(|call: &Call<'_>| {
                    if call.args.first().and_then(Value::as_i64).is_none() {
                        return Err("add returned no int".into());
                    }
                    Ok(Value::Void)
                }),
        )
        .method(
            MethodDecl::new("store")
                .test()
                .ir(IrAnnotation::new()
                    .counts([STORE, "1"])
                    .apply_if(["UseCompressedOops", "true"])),
        )
        .method(
            MethodDecl::new("noAlloc")
                .test()
                .ir(IrAnnotation::new().fail_on([ALLOC])),
        )
}

fn whitebox(flags: &VmFlags, policy: CompilationPolicy) -> Arc<dyn WhiteBox> {
    let stressed = flags.args().iter().any(|f| f == "-XX:+StressIGVN");
    let mut store = String::from("  31  StoreI  === 5 7 30 29  [[ 40 ]]");
    if stressed {
        store.push_str("\n  32  StoreI  === 31 7 30 29  [[ 40 ]]");
    }
    let wb = SimulatedWhiteBox::new(policy)
        .with_ir(
            format!("{}::add", CLASS),
            "  25  AddI  === _ 10 11  [[ 26 ]]",
            "  0x10: add eax, esi",
        )
        .with_ir(format!("{}::store", CLASS), store, "  0x10: mov [rsi+12], eax")
        .with_ir(
            format!("{}::noAlloc", CLASS),
            "  12  Return  === 5 6 7 8 9  [[ 0 ]]",
            "  0x10: ret",
        );
    Arc::new(wb)
}

fn scenarios(args: &[String]) -> Vec<Scenario> {
    if args.is_empty() {
        return vec![
            Scenario::new(0, Vec::<String>::new()),
            Scenario::new(1, ["-XX:-TieredCompilation"]),
            Scenario::new(2, ["-XX:TieredStopAtLevel=1"]),
        ];
    }
    args.iter()
        .enumerate()
        .map(|(i, raw)| {
            let flags = raw.split(',').map(str::trim).filter(|f| !f.is_empty());
            Scenario::new(i as u32, flags)
        })
        .collect()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if is_test_vm(&args) {
        let vm = TestVm::new(whitebox).register(arithmetic(), Vec::new());
        process::exit(vm.main());
    }

    init_logging();
    if args.get(1).map(String::as_str) == Some("--write-config") {
        let Some(path) = args.get(2) else {
            eprintln!("--write-config needs a path");
            process::exit(EXIT_SETUP_FAILURE);
        };
        if let Err(e) = DriverConfig::write_default_if_missing(Path::new(path)) {
            eprintln!("{}", e);
            process::exit(EXIT_SETUP_FAILURE);
        }
        return;
    }
    let config = match DriverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_SETUP_FAILURE);
        }
    };
    let mut framework = TestFramework::new(arithmetic()).with_config(config);
    if let Err(e) = framework.add_scenarios(scenarios(args.get(1..).unwrap_or_default())) {
        eprintln!("{}", e);
        process::exit(EXIT_SETUP_FAILURE);
    }
    match framework.run() {
        Ok(verifications) => {
            for (i, v) in verifications.iter().enumerate() {
                println!(
                    "test VM {}: {} rule(s) checked, {} skipped",
                    i,
                    v.results().len(),
                    v.skipped().count()
                );
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_TEST_FAILURE);
        }
    }
}
