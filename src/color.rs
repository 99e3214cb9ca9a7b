use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

/// 8-bit sRGB colour shared by both renderers.
pub type Rgb = Srgb<u8>;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            // Start at blue so a single series gets the usual first colour.
            let hue = 210.0 + (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Continuous colour scale: [0, 1] → colour
// ---------------------------------------------------------------------------

/// Anchor colours of the viridis map, evenly spaced over [0, 1].
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 45, 123),
    (59, 82, 139),
    (44, 114, 142),
    (33, 145, 140),
    (40, 174, 128),
    (94, 201, 98),
    (173, 220, 48),
    (253, 231, 37),
];

/// Piecewise-linear colour map, interpolated in linear light.
#[derive(Debug, Clone)]
pub struct ColorScale {
    stops: Vec<LinSrgb>,
}

impl ColorScale {
    pub fn viridis() -> Self {
        let stops = VIRIDIS
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_format::<f32>().into_linear())
            .collect();
        ColorScale { stops }
    }

    /// Colour at `t`, clamped to [0, 1]. `NaN` maps to the low end.
    pub fn color_at(&self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) } as f32;
        let segments = (self.stops.len() - 1) as f32;
        let pos = t * segments;
        let lower = (pos.floor() as usize).min(self.stops.len() - 2);
        let frac = pos - lower as f32;

        let mixed = self.stops[lower].mix(self.stops[lower + 1], frac);
        let srgb: Srgb = Srgb::from_linear(mixed);
        srgb.into_format()
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        ColorScale::viridis()
    }
}
