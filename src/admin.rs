//! Store administration commands behind the `session-keeper` binary.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::cli::Command;
use crate::error::Error;
use crate::session::SessionStore;
use crate::Result;

/// Run `command` against `store`, writing the report to `out`.
///
/// `now` decides which sessions count as expired.
pub fn execute<W: Write>(
    command: &Command,
    store: &SessionStore,
    now: DateTime<Utc>,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::List => {
            let records = store.records()?;
            if records.is_empty() {
                writeln!(out, "no stored sessions in {}", store.path().display())?;
            }
            for record in records {
                let status = if record.is_valid_at(now) {
                    "valid"
                } else {
                    "expired"
                };
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    record.identity,
                    record
                        .token
                        .expires_at()
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                    status
                )?;
            }
        }
        Command::Show(identity) => match store.find(identity)? {
            Some(record) => {
                let json = serde_json::to_string_pretty(&record).map_err(|source| {
                    Error::Corrupt {
                        path: store.path().to_path_buf(),
                        source,
                    }
                })?;
                writeln!(out, "{}", json)?;
            }
            None => writeln!(out, "no session stored for {}", identity)?,
        },
        Command::Forget(identity) => {
            if store.remove(identity)? {
                info!(%identity, "session forgotten");
                writeln!(out, "forgot session for {}", identity)?;
            } else {
                writeln!(out, "no session stored for {}", identity)?;
            }
        }
        Command::Prune => {
            let removed = store.remove_expired(now)?;
            info!(removed, "expired sessions pruned");
            writeln!(out, "removed {} expired session(s)", removed)?;
        }
    }

    Ok(())
}
