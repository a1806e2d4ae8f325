//! Slicepack - command-line tool for slicing images into CSS sprites

use std::process::ExitCode;

use slicepack::cli;

fn main() -> ExitCode {
    cli::run()
}
