//! Command-line interface for session-keeper.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

use crate::session::Identity;

/// Store administration command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List stored identities with their expiry.
    List,
    /// Print the stored record for an identity.
    Show(Identity),
    /// Remove the stored session for an identity.
    Forget(Identity),
    /// Remove every expired session.
    Prune,
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Command to run.
    pub command: Option<Command>,
    /// Path of the session document (overrides config file).
    pub store: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('s') | Long("store") => {
                result.store = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                positional.push(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    result.command = parse_command(positional)?;
    Ok(result)
}

fn parse_command(positional: Vec<String>) -> Result<Option<Command>, ArgsError> {
    let mut words = positional.into_iter();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "list" | "ls" => Command::List,
        "prune" => Command::Prune,
        "show" => Command::Show(identity_arg(&mut words, "show")?),
        "forget" => Command::Forget(identity_arg(&mut words, "forget")?),
        _ => return Err(ArgsError::UnknownCommand(name)),
    };

    if let Some(extra) = words.next() {
        return Err(ArgsError::UnexpectedArgument(extra));
    }

    Ok(Some(command))
}

fn identity_arg<I>(words: &mut I, command: &'static str) -> Result<Identity, ArgsError>
where
    I: Iterator<Item = String>,
{
    words
        .next()
        .filter(|id| !id.is_empty())
        .map(Identity::new)
        .ok_or(ArgsError::MissingIdentity(command))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"session-keeper {version}
Inspect and maintain stored account sessions

USAGE:
    session-keeper [OPTIONS] <COMMAND>

COMMANDS:
    list                List stored identities and when their tokens expire
    show <IDENTITY>     Print the stored record for an identity as JSON
    forget <IDENTITY>   Remove the stored session, forcing a new login
    prune               Remove every expired session

OPTIONS:
    -s, --store <FILE>      Session document [default: sessions.json]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SESSION_KEEPER_STORE      Session document (overrides config)
    SESSION_KEEPER_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Show which sessions are stored
    session-keeper list

    # Force a fresh login next time
    session-keeper -s ~/.local/share/keeper/sessions.json forget 12345678901

    # Drop everything that has expired
    session-keeper prune
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("session-keeper {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Command name not recognised.
    UnknownCommand(String),
    /// Command requires an identity argument.
    MissingIdentity(&'static str),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
            Self::MissingIdentity(command) => {
                write!(f, "'{}' requires an identity argument", command)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
