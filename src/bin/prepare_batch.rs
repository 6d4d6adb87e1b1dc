//! prepare-batch - convert a sound list into a makesound batch file
//!
//! Reads `toddler_sounds.json` and writes `batch.json` in the current
//! directory unless told otherwise.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use makesound::{
    cli_style::{print_error, print_hint, print_success},
    config::{init_tracing, load_dotenv, PrepareArgs},
    manifest::convert_manifest,
};

fn main() -> ExitCode {
    load_dotenv();
    let args = PrepareArgs::parse();
    init_tracing(&args.log);

    match convert_manifest(&args.source, &args.output) {
        Ok(count) => {
            print_success(&format!(
                "Created {} with {} sounds",
                args.output.display(),
                count
            ));
            println!();
            print_hint(&format!("makesound --batch {}", args.output.display()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!(error = %e, "conversion failed");
            print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
