//! Plan command implementation

use std::process::ExitCode;

use super::{prepare_pass, PassArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Print the sprite plan of one pass as JSON; nothing is written to disk.
pub fn run_plan(pass: &PassArgs) -> ExitCode {
    let mut prepared = match prepare_pass(pass, None) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    let plan = prepared.engine.plan();
    let diagnostics = prepared.engine.diagnostics();

    match serde_json::to_string_pretty(&plan) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot serialize plan: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    for advisory in &diagnostics.advisories {
        eprintln!("Warning: {}", advisory);
    }
    if diagnostics.has_errors() {
        eprintln!("{}", diagnostics.summary());
        return ExitCode::from(EXIT_ERROR);
    }
    ExitCode::from(EXIT_SUCCESS)
}
