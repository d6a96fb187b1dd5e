//! libsig - extracts wildcard byte signatures from Microsoft-format static
//! libraries.
//!
//! Usage:
//!   libsig <archive.lib> <output-dir>
//!
//! Walks every x86/x64 object in the archive, derives each code function
//! from the symbol table, masks relocation-sensitive operand bytes, and
//! writes a `Signatures.json` mapping function names to patterns.

use clap::error::ErrorKind;
use clap::Parser;
use libsig::logger::{Logger, StdoutSink};
use libsig::pipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "libsig")]
#[command(about = "Extract wildcard byte signatures from a static library", long_about = None)]
struct Cli {
    /// Path to the input archive (.lib)
    archive: PathBuf,

    /// Directory to write Signatures.json into
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let logger = Logger::new(Arc::new(StdoutSink::new()));
    match pipeline::run(&cli.archive, &cli.output_dir, &logger) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            logger.line(format!("error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}
