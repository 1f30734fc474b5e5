//! `cvs-capacity` binary entrypoint.

use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cvs_cli::{Cli, CliError, Commands, Settings, run_alert, run_resize};

const DEFAULT_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "warn,cvs_auth=info,cvs_api=info,cvs_capacity=info,cvs_cli=info";

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_payload(arg: Option<&str>) -> Result<String, CliError> {
    match arg {
        Some(payload) if payload != "-" => Ok(payload.to_string()),
        _ => {
            let mut payload = String::new();
            io::stdin().read_to_string(&mut payload)?;
            Ok(payload)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.command {
        Commands::Resize(args) => Settings::for_resize(&cli.global, args),
        Commands::Alert(_) => Settings::for_alert(&cli.global),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.debug);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let run_id = Uuid::new_v4();
    let mut stdout = io::stdout().lock();
    let result = match &cli.command {
        Commands::Resize(_) => {
            let span = tracing::info_span!("run", %run_id, mode = "resize");
            runtime
                .block_on(run_resize(&settings, &mut stdout).instrument(span))
                .map(|_| ())
        }
        Commands::Alert(args) => read_payload(args.payload.as_deref()).and_then(|payload| {
            let span = tracing::info_span!("run", %run_id, mode = "alert");
            runtime
                .block_on(run_alert(&settings, &payload, &mut stdout).instrument(span))
                .map(|_| ())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
