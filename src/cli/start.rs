use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;
use tracing::Level;

/// Parse the command line, set up logging and tracing, and return the action to run.
///
/// # Errors
/// Returns an error if telemetry cannot be initialized or the arguments are inconsistent.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(Some(verbosity_level(
        matches.get_one::<u8>("verbosity").copied(),
    )))?;

    handler(&matches)
}

fn verbosity_level(verbosity: Option<u8>) -> Level {
    match verbosity.unwrap_or(0) {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
