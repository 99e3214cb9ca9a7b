//! Backend-neutral description of a diagnostic figure.
//!
//! Figures hold data coordinates. Renderers map them through the axis
//! [`Scale`] and draw with their own primitives (PDF pages, egui plots).

pub mod builders;
pub mod stats;

use crate::color::{ColorScale, Rgb};

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scale {
    #[default]
    Linear,
    Log,
}

impl Scale {
    /// Data value → plot coordinate.
    pub fn transform(self, v: f64) -> f64 {
        match self {
            Scale::Linear => v,
            Scale::Log => v.log10(),
        }
    }

    /// Plot coordinate → data value.
    pub fn inverse(self, v: f64) -> f64 {
        match self {
            Scale::Linear => v,
            Scale::Log => 10f64.powf(v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Axis {
    pub label: String,
    pub scale: Scale,
    /// Names for the integer positions `0..n` of a category axis.
    pub categories: Vec<String>,
}

impl Axis {
    pub fn linear(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn log(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            scale: Scale::Log,
            ..Default::default()
        }
    }

    pub fn categories(label: impl Into<String>, categories: Vec<String>) -> Self {
        Axis {
            label: label.into(),
            categories,
            ..Default::default()
        }
    }

    /// Tick positions (plot coordinates) within `[lo, hi]`.
    pub fn ticks(&self, lo: f64, hi: f64) -> Vec<f64> {
        if !self.categories.is_empty() {
            return (0..self.categories.len())
                .map(|i| i as f64)
                .filter(|&p| p >= lo && p <= hi)
                .collect();
        }
        if self.scale == Scale::Log && hi - lo >= 1.0 {
            let step = ((hi - lo) / 6.0).ceil().max(1.0);
            let mut ticks = Vec::new();
            let mut k = (lo / step).ceil() * step;
            while k <= hi {
                ticks.push(k);
                k += step;
            }
            return ticks;
        }
        nice_ticks(lo, hi, 6)
    }

    /// Label shown at a tick position.
    pub fn tick_label(&self, pos: f64) -> String {
        if !self.categories.is_empty() {
            let i = pos.round();
            return if i >= 0.0 && (i as usize) < self.categories.len() {
                self.categories[i as usize].clone()
            } else {
                String::new()
            };
        }
        let value = self.scale.inverse(pos);
        format_tick(value)
    }
}

/// Roughly `target` evenly spaced round numbers covering `[lo, hi]`.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if !(lo.is_finite() && hi.is_finite()) || hi <= lo || target == 0 {
        return Vec::new();
    }
    let raw = (hi - lo) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if abs != 0.0 && !(1e-3..1e5).contains(&abs) {
        format!("{value:.0e}")
    } else {
        // Trim trailing zeros from a short fixed representation.
        let text = format!("{value:.3}");
        let text = text.trim_end_matches('0').trim_end_matches('.');
        if text == "-0" {
            "0".to_string()
        } else {
            text.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Plot elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorNorm {
    Linear,
    Log,
}

/// Counts on a rectangular grid, `counts[ix][iy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Vec<Vec<u64>>,
    pub norm: ColorNorm,
}

/// One drawable histogram cell, in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub color: Rgb,
}

impl Histogram2d {
    pub fn max_count(&self) -> u64 {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }

    pub fn min_positive_count(&self) -> Option<u64> {
        self.counts.iter().flatten().copied().filter(|&c| c > 0).min()
    }

    /// Colour-scale position of a count in [0, 1]; `None` for cells left blank.
    pub fn level(&self, count: u64) -> Option<f64> {
        let max = self.max_count();
        match self.norm {
            ColorNorm::Linear => Some(if max == 0 {
                0.0
            } else {
                count as f64 / max as f64
            }),
            ColorNorm::Log => {
                if count == 0 {
                    return None;
                }
                let min = self.min_positive_count()?;
                if max == min {
                    return Some(1.0);
                }
                let (lo, hi) = ((min as f64).ln(), (max as f64).ln());
                Some(((count as f64).ln() - lo) / (hi - lo))
            }
        }
    }

    /// Fill of the whole grid area before cells are drawn. Empty cells get
    /// the low end of a linear scale and stay blank on a log scale.
    pub fn background(&self, scale: &ColorScale) -> Option<Rgb> {
        match self.norm {
            ColorNorm::Linear => Some(scale.color_at(0.0)),
            ColorNorm::Log => None,
        }
    }

    /// Non-empty cells with their colours.
    pub fn cells<'a>(&'a self, scale: &'a ColorScale) -> impl Iterator<Item = Cell> + 'a {
        self.counts.iter().enumerate().flat_map(move |(ix, column)| {
            column.iter().enumerate().filter_map(move |(iy, &count)| {
                if count == 0 {
                    return None;
                }
                let color = scale.color_at(self.level(count)?);
                Some(Cell {
                    x0: self.x_edges[ix],
                    x1: self.x_edges[ix + 1],
                    y0: self.y_edges[iy],
                    y1: self.y_edges[iy + 1],
                    color,
                })
            })
        })
    }

    /// Count printed at the low and high end of the colour bar.
    pub fn count_range(&self) -> (u64, u64) {
        let max = self.max_count();
        match self.norm {
            ColorNorm::Linear => (0, max),
            ColorNorm::Log => (self.min_positive_count().unwrap_or(0), max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorPoint {
    pub x: f64,
    pub y: f64,
    /// Half-width of the horizontal error bar, in data units.
    pub x_err: f64,
}

/// Markers with horizontal error bars, drawn without connecting lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBarSeries {
    pub name: String,
    pub color: Rgb,
    pub points: Vec<ErrorPoint>,
}

/// Horizontal bars at category positions `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub errors: Option<Vec<f64>>,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Histogram2d(Histogram2d),
    ErrorBars(ErrorBarSeries),
    HorizontalBars(BarSeries),
}

// ---------------------------------------------------------------------------
// Figure
// ---------------------------------------------------------------------------

/// Visible area in plot coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    fn include(&mut self, x: f64, y: f64) {
        if x.is_finite() {
            self.x_min = self.x_min.min(x);
            self.x_max = self.x_max.max(x);
        }
        if y.is_finite() {
            self.y_min = self.y_min.min(y);
            self.y_max = self.y_max.max(y);
        }
    }

    fn is_valid(&self) -> bool {
        self.x_min.is_finite() && self.x_max.is_finite() && self.y_min.is_finite() && self.y_max.is_finite()
    }

    fn pad(mut self, frac: f64) -> Self {
        for (lo, hi) in [
            (&mut self.x_min, &mut self.x_max),
            (&mut self.y_min, &mut self.y_max),
        ] {
            let span = *hi - *lo;
            let margin = if span > 0.0 { span * frac } else { 0.5 };
            *lo -= margin;
            *hi += margin;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub elements: Vec<Element>,
    pub legend: bool,
    /// Same data scale on both axes.
    pub equal_aspect: bool,
}

impl Figure {
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        Figure {
            title: None,
            x_axis,
            y_axis,
            elements: Vec::new(),
            legend: false,
            equal_aspect: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Data coordinates → plot coordinates.
    pub fn to_plot(&self, x: f64, y: f64) -> (f64, f64) {
        (self.x_axis.scale.transform(x), self.y_axis.scale.transform(y))
    }

    /// The 2-D histogram, if the figure has one.
    pub fn histogram(&self) -> Option<&Histogram2d> {
        self.elements.iter().find_map(|e| match e {
            Element::Histogram2d(h) => Some(h),
            _ => None,
        })
    }

    /// Area to show, in plot coordinates. Histograms are shown edge to edge,
    /// everything else gets a 5% margin.
    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for element in &self.elements {
            match element {
                Element::Histogram2d(h) => {
                    if let (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) =
                        (h.x_edges.first(), h.x_edges.last(), h.y_edges.first(), h.y_edges.last())
                    {
                        let (x0, y0) = self.to_plot(x0, y0);
                        let (x1, y1) = self.to_plot(x1, y1);
                        b.include(x0, y0);
                        b.include(x1, y1);
                    }
                }
                Element::ErrorBars(series) => {
                    for p in &series.points {
                        let (x0, y) = self.to_plot(p.x - p.x_err, p.y);
                        let (x1, _) = self.to_plot(p.x + p.x_err, p.y);
                        b.include(x0, y);
                        b.include(x1, y);
                    }
                }
                Element::HorizontalBars(bars) => {
                    b.include(0.0, -0.5);
                    b.include(0.0, bars.values.len() as f64 - 0.5);
                    for (i, &v) in bars.values.iter().enumerate() {
                        let err = bars.errors.as_ref().map_or(0.0, |e| e[i]);
                        let err = if err.is_finite() { err } else { 0.0 };
                        b.include(v + err, i as f64);
                    }
                }
            }
        }

        if !b.is_valid() {
            return Bounds {
                x_min: 0.0,
                x_max: 1.0,
                y_min: 0.0,
                y_max: 1.0,
            };
        }
        if self.histogram().is_some() {
            b
        } else if self.elements.iter().any(|e| matches!(e, Element::HorizontalBars(_))) {
            // Bars start at the axis; only pad the value end.
            let padded = b.pad(0.05);
            Bounds {
                x_min: b.x_min,
                y_min: b.y_min,
                y_max: b.y_max,
                ..padded
            }
        } else {
            b.pad(0.05)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(norm: ColorNorm) -> Histogram2d {
        Histogram2d {
            x_edges: vec![0.0, 1.0, 2.0],
            y_edges: vec![0.0, 1.0, 2.0],
            counts: vec![vec![0, 1], vec![10, 100]],
            norm,
        }
    }

    #[test]
    fn nice_ticks_are_round() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_ticks(0.05, 0.95, 4), vec![0.25, 0.5, 0.75]);
        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn log_axis_ticks_at_decades() {
        let axis = Axis::log("E");
        assert_eq!(axis.ticks(1.7, 4.2), vec![2.0, 3.0, 4.0]);
        assert_eq!(axis.tick_label(3.0), "1000");
        assert_eq!(axis.tick_label(6.0), "1e6");
    }

    #[test]
    fn category_ticks_use_names() {
        let axis = Axis::categories("", vec!["size".into(), "width".into()]);
        assert_eq!(axis.ticks(-0.5, 1.5), vec![0.0, 1.0]);
        assert_eq!(axis.tick_label(1.0), "width");
        assert_eq!(axis.tick_label(5.0), "");
    }

    #[test]
    fn log_norm_leaves_empty_cells_blank() {
        let h = histogram(ColorNorm::Log);
        assert_eq!(h.level(0), None);
        assert_eq!(h.level(1), Some(0.0));
        assert_eq!(h.level(100), Some(1.0));
        assert!((h.level(10).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(h.background(&ColorScale::viridis()), None);
        assert_eq!(h.cells(&ColorScale::viridis()).count(), 3);
    }

    #[test]
    fn linear_norm_paints_the_background() {
        let h = histogram(ColorNorm::Linear);
        assert_eq!(h.level(0), Some(0.0));
        assert_eq!(h.level(10), Some(0.1));
        let scale = ColorScale::viridis();
        assert_eq!(h.background(&scale), Some(scale.color_at(0.0)));
        assert_eq!(h.count_range(), (0, 100));
    }

    #[test]
    fn histogram_bounds_are_tight() {
        let mut fig = Figure::new(Axis::linear("x"), Axis::linear("y"));
        fig.elements.push(Element::Histogram2d(histogram(ColorNorm::Log)));
        let b = fig.bounds();
        assert_eq!((b.x_min, b.x_max, b.y_min, b.y_max), (0.0, 2.0, 0.0, 2.0));
    }

    #[test]
    fn error_bar_bounds_follow_log_axis() {
        let mut fig = Figure::new(Axis::log("E"), Axis::linear("bias"));
        fig.elements.push(Element::ErrorBars(ErrorBarSeries {
            name: "bias".into(),
            color: Rgb::new(0, 0, 0),
            points: vec![
                ErrorPoint { x: 100.0, y: -1.0, x_err: 0.0 },
                ErrorPoint { x: 1000.0, y: 1.0, x_err: 0.0 },
            ],
        }));
        let b = fig.bounds();
        assert!((b.x_min - 1.95).abs() < 1e-12);
        assert!((b.x_max - 3.05).abs() < 1e-12);
        assert!((b.y_min + 1.1).abs() < 1e-12);
    }

    #[test]
    fn empty_figure_has_unit_bounds() {
        let b = Figure::new(Axis::linear("x"), Axis::linear("y")).bounds();
        assert_eq!((b.x_min, b.x_max), (0.0, 1.0));
    }
}
