//! Build command implementation

use std::path::Path;
use std::process::ExitCode;

use super::{prepare_pass, PassArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::resolve_path;
use crate::output::write_build_output;

/// Run the build command
pub fn run_build(pass: &PassArgs, out: Option<&Path>, verbose: bool) -> ExitCode {
    let mut prepared = match prepare_pass(pass, out) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    let out_dir = resolve_path(&prepared.project_root, &prepared.config.output.dir);
    if verbose {
        println!("Mode: {}", prepared.engine.options().mode);
        println!("Output: {}", out_dir.display());
    }

    let output = prepared.engine.build(&prepared.stylesheet);

    match write_build_output(&out_dir, &output) {
        Ok(written) => {
            if verbose {
                for path in &written {
                    println!("  wrote {}", path.display());
                }
            }
        }
        Err(e) => {
            eprintln!("Error writing output: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let summary = output.diagnostics.summary();
    if output.diagnostics.has_errors() {
        eprintln!("{}", summary);
        ExitCode::from(EXIT_ERROR)
    } else {
        println!("{}", summary);
        ExitCode::from(EXIT_SUCCESS)
    }
}
