//! Reading and writing IR dumps on the test VM's stdout

use jitcheck_core::protocol::{ASSEMBLY_SECTION, DUMP_BEGIN, DUMP_END, IDEAL_SECTION};
use jitcheck_core::{Error, IrMatchEvidence, Result, RuleEncoding};
use std::collections::HashMap;
use tracing::debug;

/// Everything the driver extracts from one test VM run.
#[derive(Debug, Clone, Default)]
pub struct TestVmOutput {
    /// Rule encodings in output order
    pub rules: Vec<RuleEncoding>,
    /// IR dumps by qualified method name; a later dump replaces an earlier one
    pub dumps: HashMap<String, IrMatchEvidence>,
}

impl TestVmOutput {
    /// Rule encoding for `method`, if the test VM emitted one.
    pub fn rules_for(&self, method: &str) -> Option<&RuleEncoding> {
        self.rules.iter().rev().find(|r| r.method == method)
    }
}

/// Render a dump in protocol form, terminated by a newline.
pub fn render_dump(dump: &IrMatchEvidence) -> String {
    let mut out = String::new();
    out.push_str(DUMP_BEGIN);
    out.push_str(&dump.method);
    out.push('\n');
    for (header, body) in [(IDEAL_SECTION, &dump.ideal), (ASSEMBLY_SECTION, &dump.assembly)] {
        out.push_str(header);
        out.push('\n');
        if !body.is_empty() {
            out.push_str(body);
            if !body.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out.push_str(DUMP_END);
    out.push('\n');
    out
}

enum State {
    Outside,
    AwaitIdeal(String),
    Ideal(String, Vec<String>),
    Assembly(String, Vec<String>, Vec<String>),
}

fn malformed(line_no: usize, what: &str) -> Error {
    Error::test_run(format!("malformed IR dump at stdout line {}: {}", line_no, what))
}

/// Parse the test VM's stdout.
pub fn parse_output(stdout: &str) -> Result<TestVmOutput> {
    let mut output = TestVmOutput::default();
    let mut state = State::Outside;

    for (idx, line) in stdout.lines().enumerate() {
        let line_no = idx + 1;
        state = match state {
            State::Outside => {
                if let Some(method) = line.strip_prefix(DUMP_BEGIN) {
                    State::AwaitIdeal(method.trim().to_string())
                } else {
                    if let Some(enc) = RuleEncoding::from_line(line)? {
                        output.rules.push(enc);
                    }
                    State::Outside
                }
            }
            State::AwaitIdeal(method) => {
                if line != IDEAL_SECTION {
                    return Err(malformed(line_no, "expected ideal section header"));
                }
                State::Ideal(method, Vec::new())
            }
            State::Ideal(method, mut ideal) => {
                if line == ASSEMBLY_SECTION {
                    State::Assembly(method, ideal, Vec::new())
                } else if line.starts_with(DUMP_BEGIN) || line == DUMP_END {
                    return Err(malformed(line_no, "dump ended before its assembly section"));
                } else {
                    ideal.push(line.to_string());
                    State::Ideal(method, ideal)
                }
            }
            State::Assembly(method, ideal, mut assembly) => {
                if line == DUMP_END {
                    debug!(
                        target: "jitcheck::ir",
                        method = %method,
                        ideal_lines = ideal.len(),
                        assembly_lines = assembly.len(),
                        "Parsed IR dump"
                    );
                    output.dumps.insert(
                        method.clone(),
                        IrMatchEvidence {
                            method,
                            ideal: ideal.join("\n"),
                            assembly: assembly.join("\n"),
                        },
                    );
                    State::Outside
                } else if line.starts_with(DUMP_BEGIN) {
                    return Err(malformed(line_no, "nested dump"));
                } else {
                    assembly.push(line.to_string());
                    State::Assembly(method, ideal, assembly)
                }
            }
        };
    }

    match state {
        State::Outside => Ok(output),
        _ => Err(Error::test_run("unterminated IR dump at end of stdout")),
    }
}
