use clap::error::ErrorKind;
use clap::Parser;
use log::error;

use rfextract::cli::Cli;
use rfextract::terminate::{INVALID_ARGUMENT_EXIT_CODE, SETUP_FAILURE_EXIT_CODE};
use rfextract::{async_api, EngineConfig, EventEmitter};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                std::process::exit(0);
            }
            _ => {
                eprintln!("ERROR: Invalid Argument.\n");
                let _ = err.print();
                std::process::exit(INVALID_ARGUMENT_EXIT_CODE);
            }
        },
    };

    let config = cli.into_config();
    rfextract::logging::init_logging(config.debug);

    // The engine's own network timeout never cuts the session short.
    let engine_config = EngineConfig {
        timeout_ms: config.timeout_ms,
        ..Default::default()
    };
    let emitter = EventEmitter::stdout(config.verbose);

    match async_api::extract_with_default_engine(engine_config, config, emitter, rfextract::process_exit()).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(SETUP_FAILURE_EXIT_CODE);
        }
    }
}
