//! Command-line driver for loading shapefiles into PostGIS and merging polygon
//! layers.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use tracing::Level;

mod error;
mod load;
mod logging;
mod merge;

pub use error::CliError;
use load::{LoadArgs, run_load};
use merge::{MergeArgs, run_merge};

const ARG_SHAPEFILE: &str = "shapefile";
const ARG_TABLE: &str = "table";
const ARG_SEQUENCE: &str = "sequence";
const ARG_ENCODING: &str = "encoding";
const ARG_DATABASE_URL: &str = "database-url";
const ARG_BATCH_SIZE: &str = "batch-size";
const ARG_REPROJECTION: &str = "reprojection";
const ARG_INPUT: &str = "input";
const ARG_OUTPUT: &str = "output";
const ENV_SHAPEFILE: &str = "SHPLOAD_CMDS_LOAD_SHAPEFILE";
const ENV_TABLE: &str = "SHPLOAD_CMDS_LOAD_TABLE";
const ENV_DATABASE_URL: &str = "SHPLOAD_CMDS_LOAD_DATABASE_URL";
const ENV_INPUT: &str = "SHPLOAD_CMDS_MERGE_INPUT";
const ENV_OUTPUT: &str = "SHPLOAD_CMDS_MERGE_OUTPUT";

/// Run the `shpload` CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments are invalid, logging cannot be
/// installed, or the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    logging::init(cli.level())?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Load(args) => run_load(args, &mut stdout),
        Command::Merge(args) => run_merge(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "shpload",
    about = "Load shapefiles into PostGIS and merge polygon layers",
    version
)]
struct Cli {
    /// Log progress at INFO level.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log diagnostics, including generated SQL, at DEBUG level.
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn level(&self) -> Level {
        logging::level(self.verbose, self.debug)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a shapefile into a PostGIS table.
    Load(LoadArgs),
    /// Merge polygon shapefiles into one layer.
    Merge(MergeArgs),
}

/// Accept a path naming a shapefile or a directory holding one.
fn require_source(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    if shpload_fs::path_is_dir(path) {
        return Ok(());
    }
    match shpload_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
