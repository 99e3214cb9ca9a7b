use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gamma_separation::cli::{existing_file, init_logging};

/// Apply a trained separation model to an event list.
///
/// Predicts for the signal region and for the off region(s) given in the
/// configuration, and writes the events with six prediction columns added.
/// The output format follows the extension of OUTPUT_PATH.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// YAML configuration with the training variables
    #[arg(value_parser = existing_file)]
    configuration_path: PathBuf,

    /// Event list (.hdf5/.hdf/.h5, .json, .csv or .parquet)
    #[arg(value_parser = existing_file)]
    data_path: PathBuf,

    /// Trained model
    #[arg(value_parser = existing_file)]
    model_path: PathBuf,

    /// Where to write the augmented event list
    output_path: PathBuf,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    gamma_separation::apply::run(
        &args.configuration_path,
        &args.data_path,
        &args.model_path,
        &args.output_path,
    )
}
