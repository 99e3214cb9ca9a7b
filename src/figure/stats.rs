//! Binning and summary statistics behind the diagnostic figures.

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = stop;
            values
        }
    }
}

/// `n` values spaced evenly on a log scale, from `10^start` to `10^stop`.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    linspace(start, stop, n)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Bin of `value` among ascending `edges`: bins are half-open
/// `[edges[i], edges[i + 1])` except the last, which includes its upper
/// edge. `None` outside the edges or for `NaN`.
pub fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let n_bins = edges.len().checked_sub(1)?;
    if n_bins == 0 || value.is_nan() || value < edges[0] || value > edges[n_bins] {
        return None;
    }
    if value == edges[n_bins] {
        return Some(n_bins - 1);
    }
    // Last edge not greater than value.
    let pos = edges.partition_point(|&e| e <= value);
    Some(pos - 1)
}

/// Count pairs on a grid, `counts[ix][iy]`. Pairs outside the edges are
/// ignored.
pub fn histogram2d(x: &[f64], y: &[f64], x_edges: &[f64], y_edges: &[f64]) -> Vec<Vec<u64>> {
    let nx = x_edges.len().saturating_sub(1);
    let ny = y_edges.len().saturating_sub(1);
    let mut counts = vec![vec![0u64; ny]; nx];
    for (&xv, &yv) in x.iter().zip(y) {
        if let (Some(ix), Some(iy)) = (bin_index(x_edges, xv), bin_index(y_edges, yv)) {
            counts[ix][iy] += 1;
        }
    }
    counts
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`ddof = 1`); needs two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Percentile `q` in [0, 100] of sorted values, interpolating linearly
/// between neighbouring ranks.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

// ---------------------------------------------------------------------------
// Bias and resolution per energy bin
// ---------------------------------------------------------------------------

/// Relative-error summary of one bin. Statistics are `NaN` where the bin
/// has too few events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinSummary {
    pub center: f64,
    pub width: f64,
    pub count: usize,
    pub bias: f64,
    pub bias_median: f64,
    pub lower_sigma: f64,
    pub upper_sigma: f64,
    pub resolution: f64,
    pub resolution_quantiles: f64,
}

/// Summaries of `(prediction - truth) / truth`, binned by `truth`.
pub fn bias_resolution(truth: &[f64], prediction: &[f64], edges: &[f64]) -> Vec<BinSummary> {
    let n_bins = edges.len().saturating_sub(1);
    let mut rel_errors: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    for (&t, &p) in truth.iter().zip(prediction) {
        let rel = (p - t) / t;
        if !rel.is_finite() {
            continue;
        }
        if let Some(bin) = bin_index(edges, t) {
            rel_errors[bin].push(rel);
        }
    }

    rel_errors
        .into_iter()
        .enumerate()
        .map(|(i, mut errors)| {
            errors.sort_by(f64::total_cmp);
            let lower = percentile(&errors, 15.0).unwrap_or(f64::NAN);
            let upper = percentile(&errors, 85.0).unwrap_or(f64::NAN);
            BinSummary {
                center: 0.5 * (edges[i] + edges[i + 1]),
                width: edges[i + 1] - edges[i],
                count: errors.len(),
                bias: mean(&errors).unwrap_or(f64::NAN),
                bias_median: percentile(&errors, 50.0).unwrap_or(f64::NAN),
                lower_sigma: lower,
                upper_sigma: upper,
                resolution: std_dev(&errors).unwrap_or(f64::NAN),
                resolution_quantiles: (upper - lower) / 2.0,
            }
        })
        .collect()
}
