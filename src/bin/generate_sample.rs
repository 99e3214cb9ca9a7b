//! Writes a small synthetic data set for trying out `apply` and `plot`:
//!
//! - `sample_events.parquet`: event list with on and off positions
//! - `sample_performance.parquet`: `label` / `label_prediction` of an energy regressor
//! - `sample_classifier.json`, `sample_regressor.json`: tree ensembles
//! - `sample_config.yaml`: matching configuration

use std::path::Path;

use anyhow::{Context, Result};
use gamma_separation::data::io::{write_table, DEFAULT_HDF_KEY};
use gamma_separation::data::model::Table;
use gamma_separation::model::{Forest, ModelArtifact, Tree};

const TRAINING_VARIABLES: [&str; 5] = ["size", "width", "length", "Theta", "Distance"];
const N_EVENTS: usize = 2000;
const N_OFF_REGIONS: u32 = 5;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Event list
// ---------------------------------------------------------------------------

fn events(rng: &mut SimpleRng) -> Result<Table> {
    let mut columns: Vec<(String, Vec<f64>)> = TRAINING_VARIABLES
        .iter()
        .map(|name| (name.to_string(), Vec::with_capacity(N_EVENTS)))
        .collect();
    let mut off: Vec<(Vec<f64>, Vec<f64>)> = (0..N_OFF_REGIONS)
        .map(|_| (Vec::with_capacity(N_EVENTS), Vec::with_capacity(N_EVENTS)))
        .collect();

    for i in 0..N_EVENTS {
        let gamma = i % 4 == 0;
        let size = 10f64.powf(rng.uniform(1.5, 4.0));
        let width = if gamma {
            rng.gauss(0.3, 0.08).abs()
        } else {
            rng.gauss(0.6, 0.2).abs()
        };
        let length = width * rng.uniform(1.5, 3.0);
        let theta = if gamma {
            rng.gauss(0.0, 0.1).abs()
        } else {
            rng.uniform(0.0, 1.0)
        };
        let distance = rng.uniform(0.2, 1.2);

        for (column, value) in columns.iter_mut().zip([size, width, length, theta, distance]) {
            column.1.push(value);
        }
        for (theta_off, distance_off) in &mut off {
            theta_off.push(rng.uniform(0.0, 1.0));
            distance_off.push(rng.uniform(0.2, 1.2));
        }
    }

    // A few unusable events, as found in real event lists.
    columns[1].1[7] = f64::NAN;
    columns[0].1[11] = f64::INFINITY;

    for (region, (theta_off, distance_off)) in (1..=N_OFF_REGIONS).zip(off) {
        columns.push((format!("Theta_Off_{region}"), theta_off));
        columns.push((format!("Distance_Off_{region}"), distance_off));
    }
    Ok(Table::from_columns(columns)?)
}

fn performance(rng: &mut SimpleRng) -> Result<Table> {
    let label: Vec<f64> = (0..N_EVENTS)
        .map(|_| 10f64.powf(rng.uniform(2.0, 5.0)))
        .collect();
    let prediction = label
        .iter()
        .map(|&e| {
            // Resolution improves with energy.
            let sigma = 0.5 - 0.08 * e.log10();
            e * rng.gauss(1.0, sigma).max(0.05)
        })
        .collect();
    Ok(Table::from_columns([
        ("label", label),
        ("label_prediction", prediction),
    ])?)
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

fn gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

/// One split on `feature`, with class counts below and above the threshold.
fn classifier_stump(feature: i64, threshold: f64, left: [f64; 2], right: [f64; 2]) -> Tree {
    let root = [left[0] + right[0], left[1] + right[1]];
    Tree {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![feature, -2, -2],
        threshold: vec![threshold, -2.0, -2.0],
        value: vec![root.to_vec(), left.to_vec(), right.to_vec()],
        impurity: Some(vec![gini(&root), gini(&left), gini(&right)]),
        weighted_n_node_samples: Some(vec![
            root.iter().sum(),
            left.iter().sum(),
            right.iter().sum(),
        ]),
    }
}

fn classifier() -> ModelArtifact {
    ModelArtifact::RandomForestClassifier(Forest {
        n_features: TRAINING_VARIABLES.len(),
        feature_importances: None,
        estimators: vec![
            classifier_stump(3, 0.15, [60.0, 420.0], [1380.0, 140.0]),
            classifier_stump(1, 0.45, [300.0, 430.0], [1200.0, 70.0]),
            classifier_stump(2, 1.0, [350.0, 380.0], [1100.0, 170.0]),
        ],
    })
}

/// One split on `size` with the mean energy on either side.
fn regressor_stump(threshold: f64, low: f64, high: f64) -> Tree {
    Tree {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![0, -2, -2],
        threshold: vec![threshold, -2.0, -2.0],
        value: vec![vec![(low + high) / 2.0], vec![low], vec![high]],
        impurity: None,
        weighted_n_node_samples: None,
    }
}

fn regressor() -> ModelArtifact {
    ModelArtifact::RandomForestRegressor(Forest {
        n_features: TRAINING_VARIABLES.len(),
        feature_importances: Some(vec![0.62, 0.08, 0.21, 0.03, 0.06]),
        estimators: vec![
            regressor_stump(300.0, 400.0, 8000.0),
            regressor_stump(1000.0, 900.0, 20000.0),
        ],
    })
}

fn write_json(model: &ModelArtifact, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), model)
        .with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    gamma_separation::cli::init_logging();
    let mut rng = SimpleRng::new(42);

    let events = events(&mut rng)?;
    write_table(&events, Path::new("sample_events.parquet"), DEFAULT_HDF_KEY)?;

    let performance = performance(&mut rng)?;
    write_table(&performance, Path::new("sample_performance.parquet"), DEFAULT_HDF_KEY)?;

    write_json(&classifier(), Path::new("sample_classifier.json"))?;
    write_json(&regressor(), Path::new("sample_regressor.json"))?;

    let config = format!(
        "training_variables:\n{}query: size > 50\nbackground_regions: [3]\n",
        TRAINING_VARIABLES
            .iter()
            .map(|v| format!("  - {v}\n"))
            .collect::<String>()
    );
    std::fs::write("sample_config.yaml", config).context("writing sample_config.yaml")?;

    println!(
        "Wrote {} events with {} off regions, {} performance rows, two models and a configuration",
        events.len(),
        N_OFF_REGIONS,
        performance.len()
    );
    Ok(())
}
