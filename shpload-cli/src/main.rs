//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use shpload_cli::{CliError, run};

fn main() {
    match run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("shpload: {err}");
            std::process::exit(1);
        }
    }
}
