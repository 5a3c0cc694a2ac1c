//! session-keeper binary entry point.

use std::process::ExitCode;

use chrono::Utc;
use session_keeper::cli::{self, Args};
use session_keeper::config::Config;
use session_keeper::{admin, logging, SessionStore};
use tracing::debug;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'session-keeper --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let Some(ref command) = args.command else {
        cli::print_help();
        return Err("no command given".into());
    };

    let config = Config::load(args)?;
    let _ = logging::try_init_with(config.log_filter());
    debug!(store = %config.store.path.display(), ?command, "running command");

    let store = SessionStore::open(&config.store.path)?;
    let stdout = std::io::stdout();
    admin::execute(command, &store, Utc::now(), &mut stdout.lock())?;
    Ok(())
}
