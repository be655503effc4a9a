//! `load` command: import one shapefile into a PostGIS table.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use shpload_data::{DEFAULT_BATCH_SIZE, LoadOptions, LoadReport, ReprojectionMode};

use crate::{
    ARG_BATCH_SIZE, ARG_DATABASE_URL, ARG_ENCODING, ARG_REPROJECTION, ARG_SEQUENCE,
    ARG_SHAPEFILE, ARG_TABLE, CliError, ENV_DATABASE_URL, ENV_SHAPEFILE, ENV_TABLE,
    require_source,
};

/// Where source geometries are reprojected to the canonical SRID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Reprojection {
    /// Wrap each geometry in `ST_Transform` on the server.
    #[default]
    Database,
    /// Transform geometries before binding them.
    InProcess,
}

impl From<Reprojection> for ReprojectionMode {
    fn from(value: Reprojection) -> Self {
        match value {
            Reprojection::Database => Self::Database,
            Reprojection::InProcess => Self::InProcess,
        }
    }
}

/// CLI arguments for the `load` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Import a shapefile into a PostGIS table, creating the id \
                 sequence and table on first use. Options can come from CLI \
                 flags, configuration files, or environment variables.",
    about = "Import a shapefile into PostGIS"
)]
#[ortho_config(prefix = "SHPLOAD")]
pub(crate) struct LoadArgs {
    /// Path to the `.shp` file or a directory containing one.
    #[arg(long = ARG_SHAPEFILE, value_name = "path")]
    #[serde(default)]
    pub(crate) shapefile: Option<Utf8PathBuf>,
    /// Target table name.
    #[arg(long = ARG_TABLE, value_name = "name")]
    #[serde(default)]
    pub(crate) table: Option<String>,
    /// Id sequence name; defaults to `<table>_seq`.
    #[arg(long = ARG_SEQUENCE, value_name = "name")]
    #[serde(default)]
    pub(crate) sequence: Option<String>,
    /// Attribute encoding label, overriding any `.cpg` hint.
    #[arg(long = ARG_ENCODING, value_name = "label")]
    #[serde(default)]
    pub(crate) encoding: Option<String>,
    /// PostgreSQL connection string.
    #[arg(long = ARG_DATABASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) database_url: Option<String>,
    /// Rows per insert batch.
    #[arg(long = ARG_BATCH_SIZE, value_name = "rows")]
    #[serde(default)]
    pub(crate) batch_size: Option<usize>,
    /// Where geometries are reprojected.
    #[arg(long = ARG_REPROJECTION, value_enum, value_name = "mode")]
    #[serde(default)]
    pub(crate) reprojection: Option<Reprojection>,
}

impl LoadArgs {
    fn into_config(self) -> Result<LoadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LoadConfig::try_from(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadConfig {
    pub(crate) shapefile: Utf8PathBuf,
    pub(crate) table: String,
    pub(crate) sequence: Option<String>,
    pub(crate) encoding: Option<String>,
    pub(crate) database_url: String,
    pub(crate) batch_size: usize,
    pub(crate) reprojection: ReprojectionMode,
}

impl LoadConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_source(&self.shapefile, ARG_SHAPEFILE)
    }

    pub(crate) fn options(&self) -> LoadOptions {
        let mut options = LoadOptions::new(self.table.clone())
            .with_batch_size(self.batch_size)
            .with_reprojection(self.reprojection);
        if let Some(sequence) = &self.sequence {
            options = options.with_sequence(sequence.clone());
        }
        if let Some(label) = &self.encoding {
            options = options.with_encoding(label.clone());
        }
        options
    }
}

impl TryFrom<LoadArgs> for LoadConfig {
    type Error = CliError;

    fn try_from(args: LoadArgs) -> Result<Self, Self::Error> {
        let shapefile = args.shapefile.ok_or(CliError::MissingArgument {
            field: ARG_SHAPEFILE,
            env: ENV_SHAPEFILE,
        })?;
        let table = args.table.ok_or(CliError::MissingArgument {
            field: ARG_TABLE,
            env: ENV_TABLE,
        })?;
        let database_url = args.database_url.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE_URL,
            env: ENV_DATABASE_URL,
        })?;
        Ok(Self {
            shapefile,
            table,
            sequence: args.sequence,
            encoding: args.encoding,
            database_url,
            batch_size: args.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            reprojection: args.reprojection.unwrap_or_default().into(),
        })
    }
}

pub(crate) fn run_load(args: LoadArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = resolve_load_config(args)?;
    let report = execute_load(&config)?;
    tracing::info!(
        table = %config.table,
        rows = report.rows,
        batches = report.batches,
        "load complete"
    );
    write_load_summary(writer, &config, &report)
}

fn resolve_load_config(args: LoadArgs) -> Result<LoadConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

#[cfg(feature = "store-postgres")]
fn execute_load(config: &LoadConfig) -> Result<LoadReport, CliError> {
    let executor = shpload_data::PostgresExecutor::connect(&config.database_url)
        .map_err(CliError::Connect)?;
    shpload_data::load_report(&config.shapefile, executor, &config.options()).map_err(|source| {
        CliError::Load {
            path: config.shapefile.clone(),
            source,
        }
    })
}

#[cfg(not(feature = "store-postgres"))]
fn execute_load(_config: &LoadConfig) -> Result<LoadReport, CliError> {
    Err(CliError::MissingFeature {
        feature: "store-postgres",
        action: "load",
    })
}

pub(crate) fn write_load_summary(
    writer: &mut dyn Write,
    config: &LoadConfig,
    report: &LoadReport,
) -> Result<(), CliError> {
    let encoding = report.encoding.as_deref().unwrap_or("unknown");
    writeln!(
        writer,
        "loaded {} rows into {} in {} batches (encoding {encoding})",
        report.rows, config.table, report.batches
    )
    .map_err(CliError::WriteOutput)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<LoadConfig, CliError> {
    let merged = LoadArgs::merge_from_layers(layers).map_err(CliError::from)?;
    LoadConfig::try_from(merged)
}
