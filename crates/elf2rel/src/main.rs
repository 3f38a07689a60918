//! elf2rel CLI - PowerPC ELF to REL converter

mod cli;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, EXIT_FAILURE, EXIT_SUCCESS};
use elf2rel::ConvertOptions;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_FAILURE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let Some(input) = cli.input_path() else {
        error!("no input file given");
        std::process::exit(EXIT_FAILURE);
    };

    info!(input = %input.display(), "converting");

    let mut options = ConvertOptions::new(input)
        .with_module_id(cli.rel_id)
        .with_version(cli.rel_version);
    for path in &cli.symbol_files {
        options = options.with_symbol_file(path);
    }
    if let Some(output) = &cli.output_file {
        options = options.with_output(output);
    }

    match elf2rel::convert(&options) {
        Ok(path) => {
            info!(output = %path.display(), "done");
            std::process::exit(EXIT_SUCCESS);
        }
        Err(e) => {
            error!(error = %e, "conversion failed");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
