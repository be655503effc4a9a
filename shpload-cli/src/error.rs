//! Error types emitted by the `shpload` CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use shpload_core::{ExecutorError, IngestError};
use shpload_data::MergeError;
use thiserror::Error;

/// Errors emitted by the `shpload` CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        feature: &'static str,
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// `merge` was given fewer inputs than it needs.
    #[error("merge needs at least {required} --input paths, got {actual}")]
    NotEnoughInputs { required: usize, actual: usize },
    /// Connecting to the database failed.
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] ExecutorError),
    /// Loading the shapefile failed.
    #[error("failed to load {path:?}: {source}")]
    Load {
        path: Utf8PathBuf,
        #[source]
        source: IngestError,
    },
    /// Merging the shapefiles failed.
    #[error("failed to merge shapefiles: {0}")]
    Merge(#[from] MergeError),
    /// The global subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Writing the command summary to stdout failed.
    #[error("failed to write command output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
