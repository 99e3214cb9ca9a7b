use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::data::io::read_table;
use crate::data::model::Table;
use crate::figure::builders::{bias_resolution, confusion, feature_importances};
use crate::figure::{ColorNorm, Figure};
use crate::model::{load_model, Importances};

pub const BIAS_RESOLUTION_BINS: usize = 15;

/// Create the performance figures and either save them as one PDF or
/// show them in a window.
pub fn run(
    configuration_path: &Path,
    performance_path: &Path,
    model_path: &Path,
    output: Option<&Path>,
    key: &str,
) -> Result<()> {
    log::info!("Loading perfomance data");
    let performance = read_table(performance_path, key)?;

    log::info!("Loading model");
    let model = load_model(model_path)?;

    let config = Config::from_path(configuration_path)?;

    let figures = build_figures(&performance, &model, &config)?;

    match output {
        Some(path) => {
            log::info!("Writing {} figures to {}", figures.len(), path.display());
            crate::pdf::write_pdf(&figures, path)
        }
        None => crate::app::show(figures),
    }
}

/// The four diagnostic figures, in page order.
pub fn build_figures(
    performance: &Table,
    model: &dyn Importances,
    config: &Config,
) -> Result<Vec<Figure>> {
    let figures = vec![
        confusion(
            performance,
            true,
            ColorNorm::Log,
            "Reconstructed vs. True Energy (log color scale)",
        )
        .context("confusion plot (log color scale)")?,
        confusion(
            performance,
            true,
            ColorNorm::Linear,
            "Reconstructed vs. True Energy (linear color scale)",
        )
        .context("confusion plot (linear color scale)")?,
        bias_resolution(performance, BIAS_RESOLUTION_BINS, "Bias and Resolution")
            .context("bias/resolution plot")?,
        feature_importances(model, &config.training_variables)
            .context("feature importance plot")?,
    ];
    Ok(figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::builders::{LABEL, PREDICTION};
    use crate::figure::Element;
    use crate::model::{FeatureImportances, ModelError};

    struct Uniform(usize);

    impl Importances for Uniform {
        fn n_features(&self) -> usize {
            self.0
        }

        fn feature_importances(&self) -> Result<FeatureImportances, ModelError> {
            Ok(FeatureImportances {
                mean: vec![1.0 / self.0 as f64; self.0],
                std: None,
            })
        }
    }

    fn performance() -> Table {
        let label: Vec<f64> = (1..=200).map(|i| 10f64.powf(1.0 + i as f64 / 50.0)).collect();
        let prediction = label.iter().map(|l| l * 1.1).collect();
        Table::from_columns([(LABEL, label), (PREDICTION, prediction)]).unwrap()
    }

    #[test]
    fn figures_come_in_fixed_order() {
        let config =
            Config::from_yaml("training_variables: [size, width, length, conc]").unwrap();
        let figures = build_figures(&performance(), &Uniform(4), &config).unwrap();

        let titles: Vec<Option<&str>> = figures.iter().map(|f| f.title.as_deref()).collect();
        assert_eq!(
            titles,
            [
                Some("Reconstructed vs. True Energy (log color scale)"),
                Some("Reconstructed vs. True Energy (linear color scale)"),
                Some("Bias and Resolution"),
                None,
            ]
        );
        assert_eq!(figures[0].histogram().unwrap().norm, ColorNorm::Log);
        assert_eq!(figures[1].histogram().unwrap().norm, ColorNorm::Linear);
    }

    #[test]
    fn importance_figure_uses_the_training_variables() {
        let config =
            Config::from_yaml("training_variables: [size, width, length, conc]").unwrap();
        let figures = build_figures(&performance(), &Uniform(4), &config).unwrap();

        let Element::HorizontalBars(bars) = &figures[3].elements[0] else {
            panic!("expected bars");
        };
        assert_eq!(bars.labels.len(), 4);
        let mut labels = bars.labels.clone();
        labels.sort();
        assert_eq!(labels, ["conc", "length", "size", "width"]);
    }

    #[test]
    fn missing_performance_column_is_an_error() {
        let config = Config::from_yaml("training_variables: [size]").unwrap();
        let table = Table::from_columns([(LABEL, vec![1.0])]).unwrap();
        assert!(build_figures(&table, &Uniform(1), &config).is_err());
    }
}
