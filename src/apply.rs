use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::data::filter::{apply_query, drop_non_finite};
use crate::data::io::{check_extension, read_table, write_table, DEFAULT_HDF_KEY};
use crate::data::model::Table;
use crate::data::query::Query;
use crate::model::{load_model, Classifier};

pub const THETA: &str = "Theta";
pub const DISTANCE: &str = "Distance";

pub const SIGNAL_PREDICTION: &str = "signal_prediction";
pub const SIGNAL_THETA: &str = "signal_theta";
pub const SIGNAL_DISTANCE: &str = "signal_distance";
pub const BACKGROUND_PREDICTION: &str = "background_prediction";
pub const BACKGROUND_THETA: &str = "background_theta";
pub const BACKGROUND_DISTANCE: &str = "background_distance";

/// `Theta`/`Distance` column names of an off-source region.
pub fn off_region_columns(region: u32) -> (String, String) {
    (
        format!("{THETA}_Off_{region}"),
        format!("{DISTANCE}_Off_{region}"),
    )
}

// ---------------------------------------------------------------------------
// File-level entry point
// ---------------------------------------------------------------------------

/// Apply a model to an event list and write it with prediction columns.
pub fn run(
    configuration_path: &Path,
    data_path: &Path,
    model_path: &Path,
    output_path: &Path,
) -> Result<()> {
    check_extension(output_path);

    let config = Config::from_path(configuration_path)?;
    let model = load_model(model_path)?;

    log::info!("Loading data");
    let data = read_table(data_path, DEFAULT_HDF_KEY)?;

    let augmented = apply_model(data, &config, &model)?;

    log::info!("Writing data");
    write_table(&augmented, output_path, DEFAULT_HDF_KEY)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory pipeline
// ---------------------------------------------------------------------------

/// Clean the events, predict for the signal region and the off region(s),
/// and return the events with the six prediction columns appended.
///
/// `Theta`/`Distance` hold their input values again in the result.
pub fn apply_model(mut data: Table, config: &Config, model: &dyn Classifier) -> Result<Table> {
    let vars = &config.training_variables;
    if model.n_features() != vars.len() {
        bail!(
            "model expects {} features but the configuration lists {} training variables",
            model.n_features(),
            vars.len()
        );
    }

    // Single precision as seen at training time; too large values become inf
    // and are dropped with the other non-finite rows below.
    let overflowed = data
        .cast_to_f32(vars)
        .context("casting training variables")?;
    if overflowed > 0 {
        log::warn!("{overflowed} values exceed single precision and are dropped with their rows");
    }
    let mut data = drop_non_finite(&data);

    if let Some(query) = config.query() {
        log::info!("Querying with string: {query}");
        let parsed = Query::parse(query).with_context(|| format!("parsing query '{query}'"))?;
        data = apply_query(&data, &parsed).with_context(|| format!("applying query '{query}'"))?;
    }

    log::info!("After dropping nans there are {} events left.", data.len());
    if data.is_empty() {
        log::warn!("No events left to predict on");
    }

    let thetas = data.column(THETA)?.to_vec();
    let distances = data.column(DISTANCE)?.to_vec();

    log::info!("Predicting on data...");
    let signal = predict(&data, vars, model)?;
    data.set_column(SIGNAL_PREDICTION, signal)?;
    data.set_column(SIGNAL_THETA, thetas.clone())?;
    data.set_column(SIGNAL_DISTANCE, distances.clone())?;

    log::info!("Predicting off data...");
    let background = predict_background(&mut data, &config.background_regions, vars, model)?;

    data.set_column(THETA, thetas)?;
    data.set_column(DISTANCE, distances)?;

    data.set_column(BACKGROUND_PREDICTION, background.prediction)?;
    data.set_column(BACKGROUND_THETA, background.theta)?;
    data.set_column(BACKGROUND_DISTANCE, background.distance)?;
    Ok(data)
}

fn predict(data: &Table, vars: &[String], model: &dyn Classifier) -> Result<Vec<f64>> {
    let rows = data
        .feature_rows(vars)
        .context("collecting training variables")?;
    Ok(model.predict_proba(&rows)?)
}

struct Background {
    prediction: Vec<f64>,
    theta: Vec<f64>,
    distance: Vec<f64>,
}

/// Predict with each off region's position swapped into `Theta`/`Distance`.
///
/// Every row keeps the region with the highest prediction; on ties the
/// earlier region in `regions` wins. Leaves the last region's values in
/// `Theta`/`Distance`.
fn predict_background(
    data: &mut Table,
    regions: &[u32],
    vars: &[String],
    model: &dyn Classifier,
) -> Result<Background> {
    let mut best: Option<Background> = None;

    for &region in regions {
        let (theta_col, distance_col) = off_region_columns(region);
        let theta = data.column(&theta_col)?.to_vec();
        let distance = data.column(&distance_col)?.to_vec();
        data.set_column(THETA, theta.clone())?;
        data.set_column(DISTANCE, distance.clone())?;

        log::debug!("Predicting off region {region}");
        let prediction = predict(data, vars, model)?;

        match best.as_mut() {
            None => {
                best = Some(Background {
                    prediction,
                    theta,
                    distance,
                })
            }
            Some(best) => {
                for row in 0..prediction.len() {
                    if prediction[row] > best.prediction[row] {
                        best.prediction[row] = prediction[row];
                        best.theta[row] = theta[row];
                        best.distance[row] = distance[row];
                    }
                }
            }
        }
    }

    best.context("no background regions configured")
}
