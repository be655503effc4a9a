//! `merge` command: fold polygon shapefiles into one shapefile.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use shpload_data::{MIN_MERGE_INPUTS, MergeReport, merge_shapefiles};

use crate::{ARG_INPUT, ARG_OUTPUT, CliError, ENV_INPUT, ENV_OUTPUT, require_source};

/// CLI arguments for the `merge` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Merge polygon shapefiles so that no two output features \
                 intersect. The result is a shapefile with the first input's \
                 fields and coordinate system, or a GeoJSON FeatureCollection \
                 when the output ends in .geojson or .json.",
    about = "Merge polygon shapefiles into one layer"
)]
#[ortho_config(prefix = "SHPLOAD")]
pub(crate) struct MergeArgs {
    /// Input shapefile; repeat for each layer, in merge order.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Vec<Utf8PathBuf>>,
    /// Destination `.shp`, `.geojson` or `.json` path.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl MergeArgs {
    fn into_config(self) -> Result<MergeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MergeConfig::try_from(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergeConfig {
    pub(crate) inputs: Vec<Utf8PathBuf>,
    pub(crate) output: Utf8PathBuf,
}

impl MergeConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        self.inputs
            .iter()
            .try_for_each(|path| require_source(path, ARG_INPUT))
    }
}

impl TryFrom<MergeArgs> for MergeConfig {
    type Error = CliError;

    fn try_from(args: MergeArgs) -> Result<Self, Self::Error> {
        let inputs = args
            .input
            .filter(|paths| !paths.is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_INPUT,
                env: ENV_INPUT,
            })?;
        if inputs.len() < MIN_MERGE_INPUTS {
            return Err(CliError::NotEnoughInputs {
                required: MIN_MERGE_INPUTS,
                actual: inputs.len(),
            });
        }
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_OUTPUT,
        })?;
        Ok(Self { inputs, output })
    }
}

pub(crate) fn run_merge(args: MergeArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let report = merge_shapefiles(&config.inputs, &config.output)?;
    tracing::info!(
        inputs = report.inputs,
        features = report.output_features,
        output = %report.output,
        "merge complete"
    );
    write_merge_summary(writer, &report)
}

pub(crate) fn write_merge_summary(
    writer: &mut dyn Write,
    report: &MergeReport,
) -> Result<(), CliError> {
    writeln!(
        writer,
        "merged {} features from {} shapefiles into {} features at {}",
        report.input_features, report.inputs, report.output_features, report.output
    )
    .map_err(CliError::WriteOutput)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<MergeConfig, CliError> {
    let merged = MergeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    MergeConfig::try_from(merged)
}
