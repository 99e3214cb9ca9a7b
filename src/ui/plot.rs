use std::ops::RangeInclusive;

use eframe::egui::{Color32, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoint, PlotPoints, PlotUi, Points, Polygon,
    Text,
};

use crate::color::{ColorScale, Rgb};
use crate::figure::{Axis, BarSeries, ErrorBarSeries, Element, Figure, Histogram2d, Scale};
use crate::state::ViewerState;

fn color32(c: Rgb) -> Color32 {
    Color32::from_rgb(c.red, c.green, c.blue)
}

fn axis_title(axis: &Axis) -> String {
    match axis.scale {
        Scale::Log if !axis.label.is_empty() => format!("{} (log)", axis.label),
        _ => axis.label.clone(),
    }
}

fn tick_formatter(axis: Axis) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark, _range| {
        // Category axes only label whole positions.
        if !axis.categories.is_empty() && mark.value.fract() != 0.0 {
            return String::new();
        }
        axis.tick_label(mark.value)
    }
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<[f64; 2]> {
    vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
}

// ---------------------------------------------------------------------------
// Figure plot (central panel)
// ---------------------------------------------------------------------------

/// Render the selected figure in the central panel.
pub fn figure_plot(ui: &mut Ui, state: &ViewerState) {
    let Some(figure) = state.current() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Nothing to show");
        });
        return;
    };

    if let Some(title) = &figure.title {
        ui.vertical_centered(|ui: &mut Ui| {
            ui.heading(title);
        });
    }

    let bounds = figure.bounds();
    let mut plot = Plot::new(("figure_plot", state.selected))
        .x_axis_label(axis_title(&figure.x_axis))
        .y_axis_label(axis_title(&figure.y_axis))
        .x_axis_formatter(tick_formatter(figure.x_axis.clone()))
        .y_axis_formatter(tick_formatter(figure.y_axis.clone()))
        .include_x(bounds.x_min)
        .include_x(bounds.x_max)
        .include_y(bounds.y_min)
        .include_y(bounds.y_max)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if figure.legend {
        plot = plot.legend(Legend::default());
    }
    if figure.equal_aspect {
        plot = plot.data_aspect(1.0);
    }

    let scale = ColorScale::viridis();
    plot.show(ui, |plot_ui| {
        for element in &figure.elements {
            match element {
                Element::Histogram2d(h) => histogram(plot_ui, figure, h, &scale),
                Element::ErrorBars(series) => error_bars(plot_ui, figure, series),
                Element::HorizontalBars(bars) => horizontal_bars(plot_ui, bars),
            }
        }
    });
}

fn histogram(plot_ui: &mut PlotUi, figure: &Figure, h: &Histogram2d, scale: &ColorScale) {
    let b = figure.bounds();
    if let Some(background) = h.background(scale) {
        plot_ui.polygon(
            Polygon::new(rect(b.x_min, b.y_min, b.x_max, b.y_max))
                .fill_color(color32(background))
                .stroke(Stroke::NONE),
        );
    }
    for cell in h.cells(scale) {
        let (x0, y0) = figure.to_plot(cell.x0, cell.y0);
        let (x1, y1) = figure.to_plot(cell.x1, cell.y1);
        plot_ui.polygon(
            Polygon::new(rect(x0, y0, x1, y1))
                .fill_color(color32(cell.color))
                .stroke(Stroke::NONE),
        );
    }

    let (low, high) = h.count_range();
    plot_ui.text(
        Text::new(PlotPoint::new(b.x_max, b.y_max), format!("{low} to {high} counts"))
            .anchor(eframe::egui::Align2::RIGHT_TOP)
            .color(Color32::WHITE),
    );
}

fn error_bars(plot_ui: &mut PlotUi, figure: &Figure, series: &ErrorBarSeries) {
    let color = color32(series.color);
    let markers: PlotPoints = series
        .points
        .iter()
        .map(|p| {
            let (x, y) = figure.to_plot(p.x, p.y);
            [x, y]
        })
        .collect();
    plot_ui.points(Points::new(markers).name(&series.name).color(color).radius(3.0));

    for p in &series.points {
        let (x0, y) = figure.to_plot(p.x - p.x_err, p.y);
        let (x1, _) = figure.to_plot(p.x + p.x_err, p.y);
        plot_ui.line(
            Line::new(vec![[x0, y], [x1, y]])
                .name(&series.name)
                .color(color)
                .width(1.5),
        );
    }
}

fn horizontal_bars(plot_ui: &mut PlotUi, bars: &BarSeries) {
    let color = color32(bars.color);
    let chart: Vec<Bar> = bars
        .values
        .iter()
        .zip(&bars.labels)
        .enumerate()
        .map(|(i, (&value, label))| Bar::new(i as f64, value).width(0.8).name(label))
        .collect();
    plot_ui.bar_chart(BarChart::new(chart).horizontal().color(color));

    if let Some(errors) = &bars.errors {
        for (i, (&value, &err)) in bars.values.iter().zip(errors).enumerate() {
            let y = i as f64;
            plot_ui.line(
                Line::new(vec![[value - err, y], [value + err, y]])
                    .color(Color32::BLACK)
                    .width(1.5),
            );
        }
    }
}
