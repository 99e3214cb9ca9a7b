//! The diagnostic figures of a regressor/separator run, built from a
//! performance table and a model.

use anyhow::{bail, ensure, Result};

use super::stats::{self, BinSummary};
use super::{
    Axis, BarSeries, ColorNorm, Element, ErrorBarSeries, ErrorPoint, Figure, Histogram2d,
};
use crate::color::{generate_palette, Rgb};
use crate::data::model::Table;
use crate::model::Importances;

/// True value column of a performance table.
pub const LABEL: &str = "label";
/// Estimated value column of a performance table.
pub const PREDICTION: &str = "label_prediction";

pub const CONFUSION_BINS: usize = 100;

const BAR_COLOR: Rgb = Rgb::new(31, 119, 180);

// ---------------------------------------------------------------------------
// Confusion: estimated vs. true value
// ---------------------------------------------------------------------------

/// 2-D histogram of `label` (x) against `label_prediction` (y) over the
/// common range of both columns.
///
/// With `log_xy` both columns are binned as `log10` values; non-positive
/// values are dropped then.
pub fn confusion(performance: &Table, log_xy: bool, norm: ColorNorm, title: &str) -> Result<Figure> {
    let mut truth = performance.column(LABEL)?.to_vec();
    let mut estimate = performance.column(PREDICTION)?.to_vec();
    if log_xy {
        truth.iter_mut().for_each(|v| *v = v.log10());
        estimate.iter_mut().for_each(|v| *v = v.log10());
    }

    let (x, y): (Vec<f64>, Vec<f64>) = truth
        .into_iter()
        .zip(estimate)
        .filter(|(t, e)| t.is_finite() && e.is_finite())
        .unzip();
    ensure!(!x.is_empty(), "no finite {LABEL}/{PREDICTION} pairs to histogram");

    let (mut lo, mut hi) = x
        .iter()
        .chain(&y)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let edges = stats::linspace(lo, hi, CONFUSION_BINS + 1);
    let counts = stats::histogram2d(&x, &y, &edges, &edges);

    let (x_label, y_label) = if log_xy {
        ("log10(E_MC / GeV)", "log10(E_Est / GeV)")
    } else {
        ("E_MC / GeV", "E_Est / GeV")
    };
    let mut figure = Figure::new(Axis::linear(x_label), Axis::linear(y_label)).with_title(title);
    figure.elements.push(Element::Histogram2d(Histogram2d {
        x_edges: edges.clone(),
        y_edges: edges,
        counts,
        norm,
    }));
    figure.equal_aspect = true;
    Ok(figure)
}

// ---------------------------------------------------------------------------
// Bias and resolution
// ---------------------------------------------------------------------------

/// Relative bias and resolution in `bins` logarithmic bins of the true value.
pub fn bias_resolution(performance: &Table, bins: usize, title: &str) -> Result<Figure> {
    ensure!(bins > 0, "bias/resolution needs at least one bin");
    let truth = performance.column(LABEL)?;
    let estimate = performance.column(PREDICTION)?;

    let (lo, hi) = truth
        .iter()
        .filter(|v| v.is_finite() && **v > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        bail!("no positive {LABEL} values to bin");
    }

    let edges = stats::logspace(lo.log10(), hi.log10(), bins + 1);
    let summaries = stats::bias_resolution(truth, estimate, &edges);

    let colors = generate_palette(3);
    let series: [(&str, fn(&BinSummary) -> f64); 3] = [
        ("bias", |s| s.bias),
        ("resolution", |s| s.resolution),
        ("resolution_quantiles", |s| s.resolution_quantiles),
    ];

    let mut figure = Figure::new(Axis::log("E_MC / GeV"), Axis::linear("")).with_title(title);
    for ((name, value), color) in series.into_iter().zip(colors) {
        let points = summaries
            .iter()
            .filter(|s| value(s).is_finite())
            .map(|s| ErrorPoint {
                x: s.center,
                y: value(s),
                x_err: s.width / 2.0,
            })
            .collect();
        figure.elements.push(Element::ErrorBars(ErrorBarSeries {
            name: name.to_string(),
            color,
            points,
        }));
    }
    figure.legend = true;
    Ok(figure)
}

// ---------------------------------------------------------------------------
// Feature importances
// ---------------------------------------------------------------------------

/// Horizontal bars of the model's feature importances, least important at
/// the bottom. `feature_names` must match the model's features in order.
pub fn feature_importances(model: &dyn Importances, feature_names: &[String]) -> Result<Figure> {
    ensure!(
        model.n_features() == feature_names.len(),
        "model has {} features but {} names were given",
        model.n_features(),
        feature_names.len()
    );
    let importances = model.feature_importances()?;

    let mut order: Vec<usize> = (0..feature_names.len()).collect();
    order.sort_by(|&a, &b| importances.mean[a].total_cmp(&importances.mean[b]));

    let labels: Vec<String> = order.iter().map(|&i| feature_names[i].clone()).collect();
    let bars = BarSeries {
        labels: labels.clone(),
        values: order.iter().map(|&i| importances.mean[i]).collect(),
        errors: importances
            .std
            .as_ref()
            .map(|std| order.iter().map(|&i| std[i]).collect()),
        color: BAR_COLOR,
    };

    let mut figure = Figure::new(Axis::linear("Feature importance"), Axis::categories("", labels));
    figure.elements.push(Element::HorizontalBars(bars));
    Ok(figure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureImportances, ModelError};

    struct Fixed(Vec<f64>, Option<Vec<f64>>);

    impl Importances for Fixed {
        fn n_features(&self) -> usize {
            self.0.len()
        }

        fn feature_importances(&self) -> Result<FeatureImportances, ModelError> {
            Ok(FeatureImportances {
                mean: self.0.clone(),
                std: self.1.clone(),
            })
        }
    }

    fn performance() -> Table {
        Table::from_columns([
            (LABEL, vec![10.0, 100.0, 1000.0, 10000.0, 100.0]),
            (PREDICTION, vec![12.0, 90.0, 1100.0, 8000.0, f64::NAN]),
        ])
        .unwrap()
    }

    #[test]
    fn confusion_bins_the_common_log_range() {
        let fig = confusion(&performance(), true, ColorNorm::Log, "conf").unwrap();
        let h = fig.histogram().unwrap();
        assert_eq!(h.x_edges.len(), CONFUSION_BINS + 1);
        assert_eq!(h.x_edges, h.y_edges);
        assert_eq!(h.x_edges[0], 1.0);
        assert_eq!(*h.x_edges.last().unwrap(), 4.0);
        // The NaN estimate is left out.
        assert_eq!(h.counts.iter().flatten().sum::<u64>(), 4);
        assert!(fig.equal_aspect);
        assert_eq!(fig.title.as_deref(), Some("conf"));
    }

    #[test]
    fn confusion_without_finite_pairs_fails() {
        let table = Table::from_columns([(LABEL, vec![-1.0]), (PREDICTION, vec![1.0])]).unwrap();
        assert!(confusion(&table, true, ColorNorm::Linear, "").is_err());
        assert!(confusion(&table, false, ColorNorm::Linear, "").is_ok());
    }

    #[test]
    fn bias_resolution_has_three_series() {
        let fig = bias_resolution(&performance(), 3, "Bias and Resolution").unwrap();
        let names: Vec<&str> = fig
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::ErrorBars(s) => Some(s.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["bias", "resolution", "resolution_quantiles"]);
        assert!(fig.legend);
        assert_eq!(fig.x_axis.scale, crate::figure::Scale::Log);

        let Element::ErrorBars(bias) = &fig.elements[0] else {
            panic!("expected error bars");
        };
        assert_eq!(bias.points.len(), 3);
        assert!((bias.points[0].y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn importances_keep_the_given_names() {
        let names: Vec<String> = ["size", "width", "length", "conc"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let model = Fixed(vec![0.4, 0.1, 0.3, 0.2], Some(vec![0.01, 0.02, 0.03, 0.04]));
        let fig = feature_importances(&model, &names).unwrap();

        assert_eq!(fig.y_axis.categories, ["width", "conc", "length", "size"]);
        let Element::HorizontalBars(bars) = &fig.elements[0] else {
            panic!("expected bars");
        };
        assert_eq!(bars.values, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(bars.errors, Some(vec![0.02, 0.04, 0.03, 0.01]));
    }

    #[test]
    fn importances_need_one_name_per_feature() {
        let model = Fixed(vec![0.5, 0.5], None);
        assert!(feature_importances(&model, &["size".to_string()]).is_err());
    }
}
