use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gamma_separation::cli::{existing_file, init_logging};
use gamma_separation::data::io::DEFAULT_HDF_KEY;

/// Create some performance evaluation plots for the separator.
///
/// Without --output the figures are shown in a window.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// YAML configuration with the training variables
    #[arg(value_parser = existing_file)]
    configuration_path: PathBuf,

    /// Table with `label` and `label_prediction` columns
    #[arg(value_parser = existing_file)]
    performance_path: PathBuf,

    /// Trained model
    #[arg(value_parser = existing_file)]
    model_path: PathBuf,

    /// Save all figures into this PDF
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// HDF5 key of the performance table
    #[arg(short, long, default_value = DEFAULT_HDF_KEY)]
    key: String,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    gamma_separation::diagnostics::run(
        &args.configuration_path,
        &args.performance_path,
        &args.model_path,
        args.output.as_deref(),
        &args.key,
    )
}
