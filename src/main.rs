use std::process::ExitCode;

use clap::Parser;

use hubedit::cli::{self, CliArgs};
use hubedit::{log_info, logger};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    logger::init();
    logger::set_stderr_mirror(args.verbose);
    log_info!("HubEdit {} starting (CLI)", env!("CARGO_PKG_VERSION"));
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        eprintln!("session log: {}", path.display());
    }

    let code = cli::run(args);
    log_info!("HubEdit exiting, success={}", code == ExitCode::SUCCESS);
    code
}
