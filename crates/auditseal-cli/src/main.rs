//! Entry point for the `auditseal` binary.

use std::process::ExitCode;

use auditseal_cli::{Cli, Exit};
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = auditseal_common_log::init(cli.log_config()) {
        eprintln!("warning: logging disabled: {err}");
    }

    match cli.execute(&mut std::io::stdout().lock()) {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("error: {err:#}");
            Exit::Error.into()
        }
    }
}
