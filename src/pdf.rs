//! Multi-page PDF output, one figure per page.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point,
    Polygon, Pt, TextMatrix,
};

use crate::color::{ColorScale, Rgb};
use crate::figure::{Bounds, Element, Figure, Histogram2d};

/// 6.4 × 4.8 inches.
pub const PAGE_WIDTH: f32 = 162.56;
pub const PAGE_HEIGHT: f32 = 121.92;

const MARGIN_LEFT: f32 = 24.0;
const MARGIN_RIGHT: f32 = 8.0;
const MARGIN_BOTTOM: f32 = 16.0;
const MARGIN_TOP: f32 = 12.0;
const COLOR_BAR_SPACE: f32 = 22.0;

const FONT_SIZE: f32 = 8.0;
const TITLE_SIZE: f32 = 10.0;
const TICK_LENGTH: f32 = 1.5;

const BLACK: Rgb = Rgb::new(0, 0, 0);

/// Write all figures into one PDF at `path`.
pub fn write_pdf(figures: &[Figure], path: &Path) -> Result<()> {
    let (doc, page, layer) = PdfDocument::new(
        "Separator performance",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("{e}"))?;

    let mut layers = vec![doc.get_page(page).get_layer(layer)];
    for _ in 1..figures.len() {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        layers.push(doc.get_page(page).get_layer(layer));
    }

    let scale = ColorScale::viridis();
    for (i, (figure, layer)) in figures.iter().zip(layers).enumerate() {
        log::debug!("Drawing page {}", i + 1);
        Page::new(layer, &font, figure).draw(figure, &scale);
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved {} pages to {}", figures.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Page layout
// ---------------------------------------------------------------------------

/// Plot frame on the page, in millimetres from the lower left corner.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f32,
    bottom: f32,
    width: f32,
    height: f32,
}

impl Frame {
    fn right(&self) -> f32 {
        self.left + self.width
    }

    fn top(&self) -> f32 {
        self.bottom + self.height
    }
}

fn layout(figure: &Figure, bounds: &Bounds) -> Frame {
    let right_space = if figure.histogram().is_some() {
        COLOR_BAR_SPACE
    } else {
        MARGIN_RIGHT
    };
    let mut frame = Frame {
        left: MARGIN_LEFT,
        bottom: MARGIN_BOTTOM,
        width: PAGE_WIDTH - MARGIN_LEFT - right_space,
        height: PAGE_HEIGHT - MARGIN_BOTTOM - MARGIN_TOP,
    };

    if figure.equal_aspect {
        let dx = (bounds.x_max - bounds.x_min) as f32;
        let dy = (bounds.y_max - bounds.y_min) as f32;
        if dx > 0.0 && dy > 0.0 {
            let mm_per_unit = (frame.width / dx).min(frame.height / dy);
            let (w, h) = (dx * mm_per_unit, dy * mm_per_unit);
            frame.left += (frame.width - w) / 2.0;
            frame.bottom += (frame.height - h) / 2.0;
            frame.width = w;
            frame.height = h;
        }
    }
    frame
}

/// Rough Helvetica text width: half the font size per character.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * 0.3528
}

fn pdf_color(c: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        c.red as f32 / 255.0,
        c.green as f32 / 255.0,
        c.blue as f32 / 255.0,
        None,
    ))
}

fn point(x: f32, y: f32) -> (Point, bool) {
    (Point::new(Mm(x), Mm(y)), false)
}

struct Page<'a> {
    layer: PdfLayerReference,
    font: &'a IndirectFontRef,
    frame: Frame,
    bounds: Bounds,
}

impl<'a> Page<'a> {
    fn new(layer: PdfLayerReference, font: &'a IndirectFontRef, figure: &Figure) -> Self {
        let bounds = figure.bounds();
        let frame = layout(figure, &bounds);
        Page {
            layer,
            font,
            frame,
            bounds,
        }
    }

    /// Plot coordinates → page millimetres.
    fn map(&self, x: f64, y: f64) -> (f32, f32) {
        let b = &self.bounds;
        let fx = ((x - b.x_min) / (b.x_max - b.x_min)) as f32;
        let fy = ((y - b.y_min) / (b.y_max - b.y_min)) as f32;
        (
            self.frame.left + fx * self.frame.width,
            self.frame.bottom + fy * self.frame.height,
        )
    }

    fn draw(&self, figure: &Figure, scale: &ColorScale) {
        for element in &figure.elements {
            match element {
                Element::Histogram2d(h) => self.histogram(figure, h, scale),
                Element::ErrorBars(series) => {
                    for p in &series.points {
                        let (x0, y) = figure.to_plot(p.x - p.x_err, p.y);
                        let (x1, _) = figure.to_plot(p.x + p.x_err, p.y);
                        let (xc, _) = figure.to_plot(p.x, p.y);
                        let (x0, y) = self.map(x0, y);
                        let (x1, _) = self.map(x1, 0.0);
                        let (xc, _) = self.map(xc, 0.0);
                        self.line(&[(x0, y), (x1, y)], series.color, 0.8);
                        self.rect(xc - 0.6, y - 0.6, xc + 0.6, y + 0.6, series.color);
                    }
                }
                Element::HorizontalBars(bars) => {
                    for (i, &value) in bars.values.iter().enumerate() {
                        let pos = i as f64;
                        let (x0, y0) = self.map(0.0, pos - 0.4);
                        let (x1, y1) = self.map(value, pos + 0.4);
                        self.rect(x0, y0, x1, y1, bars.color);

                        let err = bars.errors.as_ref().map_or(0.0, |e| e[i]);
                        if err > 0.0 {
                            let (lo, y) = self.map(value - err, pos);
                            let (hi, _) = self.map(value + err, pos);
                            self.line(&[(lo, y), (hi, y)], BLACK, 0.8);
                            for x in [lo, hi] {
                                self.line(&[(x, y - 0.8), (x, y + 0.8)], BLACK, 0.8);
                            }
                        }
                    }
                }
            }
        }

        self.axes(figure);
        if let Some(title) = &figure.title {
            let x = self.frame.left + (self.frame.width - text_width(title, TITLE_SIZE)) / 2.0;
            self.text(title, TITLE_SIZE, x, self.frame.top() + 4.0);
        }
        if figure.legend {
            self.legend(figure);
        }
        if let Some(h) = figure.histogram() {
            self.color_bar(h, scale);
        }
    }

    fn histogram(&self, figure: &Figure, h: &Histogram2d, scale: &ColorScale) {
        if let Some(color) = h.background(scale) {
            let f = self.frame;
            self.rect(f.left, f.bottom, f.right(), f.top(), color);
        }
        for cell in h.cells(scale) {
            let (x0, y0) = figure.to_plot(cell.x0, cell.y0);
            let (x1, y1) = figure.to_plot(cell.x1, cell.y1);
            let (x0, y0) = self.map(x0, y0);
            let (x1, y1) = self.map(x1, y1);
            self.rect(x0, y0, x1, y1, cell.color);
        }
    }

    fn axes(&self, figure: &Figure) {
        let f = self.frame;
        let b = self.bounds;

        let outline = Line {
            points: vec![
                point(f.left, f.bottom),
                point(f.right(), f.bottom),
                point(f.right(), f.top()),
                point(f.left, f.top()),
            ],
            is_closed: true,
        };
        self.layer.set_outline_color(pdf_color(BLACK));
        self.layer.set_outline_thickness(0.8);
        self.layer.add_line(outline);

        for tick in figure.x_axis.ticks(b.x_min, b.x_max) {
            let (x, _) = self.map(tick, b.y_min);
            self.line(&[(x, f.bottom), (x, f.bottom - TICK_LENGTH)], BLACK, 0.6);
            let label = figure.x_axis.tick_label(tick);
            self.text(&label, FONT_SIZE, x - text_width(&label, FONT_SIZE) / 2.0, f.bottom - 5.0);
        }
        for tick in figure.y_axis.ticks(b.y_min, b.y_max) {
            let (_, y) = self.map(b.x_min, tick);
            self.line(&[(f.left, y), (f.left - TICK_LENGTH, y)], BLACK, 0.6);
            let label = figure.y_axis.tick_label(tick);
            let x = f.left - TICK_LENGTH - 1.0 - text_width(&label, FONT_SIZE);
            self.text(&label, FONT_SIZE, x, y - 1.0);
        }

        let x_label = &figure.x_axis.label;
        if !x_label.is_empty() {
            let x = f.left + (f.width - text_width(x_label, FONT_SIZE)) / 2.0;
            self.text(x_label, FONT_SIZE, x, f.bottom - 10.0);
        }
        let y_label = &figure.y_axis.label;
        if !y_label.is_empty() {
            let y = f.bottom + (f.height - text_width(y_label, FONT_SIZE)) / 2.0;
            self.layer.begin_text_section();
            self.layer.set_font(self.font, FONT_SIZE);
            self.layer.set_text_matrix(TextMatrix::TranslateRotate(
                Pt::from(Mm(6.0)),
                Pt::from(Mm(y)),
                90.0,
            ));
            self.layer.write_text(y_label.clone(), self.font);
            self.layer.end_text_section();
        }
    }

    fn legend(&self, figure: &Figure) {
        let entries: Vec<(&str, Rgb)> = figure
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::ErrorBars(s) => Some((s.name.as_str(), s.color)),
                _ => None,
            })
            .collect();
        let width = entries
            .iter()
            .map(|(name, _)| text_width(name, FONT_SIZE))
            .fold(0.0, f32::max)
            + 8.0;

        let x = self.frame.right() - width - 2.0;
        let mut y = self.frame.top() - 5.0;
        for (name, color) in entries {
            self.line(&[(x, y + 1.0), (x + 4.0, y + 1.0)], color, 0.8);
            self.rect(x + 1.4, y + 0.4, x + 2.6, y + 1.6, color);
            self.text(name, FONT_SIZE, x + 6.0, y);
            y -= 4.0;
        }
    }

    fn color_bar(&self, h: &Histogram2d, scale: &ColorScale) {
        const STEPS: usize = 64;
        let x0 = self.frame.right() + 4.0;
        let x1 = x0 + 4.0;
        let step = self.frame.height / STEPS as f32;
        for i in 0..STEPS {
            let y0 = self.frame.bottom + i as f32 * step;
            let t = (i as f64 + 0.5) / STEPS as f64;
            self.rect(x0, y0, x1, y0 + step, scale.color_at(t));
        }

        let (low, high) = h.count_range();
        self.text(&low.to_string(), FONT_SIZE, x1 + 1.0, self.frame.bottom);
        self.text(&high.to_string(), FONT_SIZE, x1 + 1.0, self.frame.top() - 2.5);
    }

    // -- primitives --

    fn line(&self, points: &[(f32, f32)], color: Rgb, thickness: f32) {
        self.layer.set_outline_color(pdf_color(color));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: points.iter().map(|&(x, y)| point(x, y)).collect(),
            is_closed: false,
        });
    }

    fn rect(&self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb) {
        self.layer.set_fill_color(pdf_color(color));
        self.layer.add_polygon(Polygon {
            rings: vec![vec![point(x0, y0), point(x1, y0), point(x1, y1), point(x0, y1)]],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.set_fill_color(pdf_color(BLACK));
        self.layer.use_text(text, size, Mm(x), Mm(y), self.font);
    }
}
