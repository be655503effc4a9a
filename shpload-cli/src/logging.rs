//! Subscriber setup for the CLI.
//!
//! Library crates log through the `log` facade; [`LogTracer`] forwards those
//! records into the `tracing` subscriber installed here.

use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use crate::CliError;

/// `--debug` wins over `--verbose`; neither means warnings only.
pub(crate) const fn level(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

pub(crate) fn init(level: Level) -> Result<(), CliError> {
    LogTracer::init().map_err(|err| CliError::Logging(Box::new(err)))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| CliError::Logging(Box::new(err)))
}
