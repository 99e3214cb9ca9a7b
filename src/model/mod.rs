//! Trained separation models.
//!
//! Models are tree ensembles exported from scikit-learn into JSON (see
//! [`forest`]). The applier only needs the [`Classifier`] view, the
//! diagnostics only the [`Importances`] view.

pub mod forest;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use forest::{Forest, Tree};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model expects {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("a {0} cannot predict class probabilities")]
    NotAClassifier(&'static str),

    #[error("model has no trees")]
    NoTrees,

    #[error("tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },

    #[error("feature_importances has {found} entries for {expected} features")]
    ImportanceCount { expected: usize, found: usize },

    #[error("model carries neither impurity data nor feature_importances")]
    NoImportances,
}

// ---------------------------------------------------------------------------
// Model views
// ---------------------------------------------------------------------------

/// A binary classifier scoring rows of features.
pub trait Classifier {
    /// Number of features each row must have.
    fn n_features(&self) -> usize;

    /// Probability of class 1 (signal) for one row.
    fn signal_probability(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Probability of class 1 for every row.
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter().map(|row| self.signal_probability(row)).collect()
    }
}

/// Relative importance of each input feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportances {
    pub mean: Vec<f64>,
    /// Spread across the ensemble members, when it can be computed.
    pub std: Option<Vec<f64>>,
}

pub trait Importances {
    fn n_features(&self) -> usize;
    fn feature_importances(&self) -> Result<FeatureImportances, ModelError>;
}

// ---------------------------------------------------------------------------
// ModelArtifact – what a model file holds
// ---------------------------------------------------------------------------

/// Deserialized model file, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    RandomForestClassifier(Forest),
    RandomForestRegressor(Forest),
}

impl ModelArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::RandomForestClassifier(_) => "random forest classifier",
            ModelArtifact::RandomForestRegressor(_) => "random forest regressor",
        }
    }

    pub fn forest(&self) -> &Forest {
        match self {
            ModelArtifact::RandomForestClassifier(f) | ModelArtifact::RandomForestRegressor(f) => f,
        }
    }

    pub fn is_classifier(&self) -> bool {
        matches!(self, ModelArtifact::RandomForestClassifier(_))
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.forest().validate(self.is_classifier())
    }
}

impl Classifier for ModelArtifact {
    fn n_features(&self) -> usize {
        self.forest().n_features
    }

    fn signal_probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        match self {
            ModelArtifact::RandomForestClassifier(f) => f.class_one_probability(features),
            ModelArtifact::RandomForestRegressor(_) => Err(ModelError::NotAClassifier(self.kind())),
        }
    }
}

impl Importances for ModelArtifact {
    fn n_features(&self) -> usize {
        self.forest().n_features
    }

    fn feature_importances(&self) -> Result<FeatureImportances, ModelError> {
        self.forest().feature_importances()
    }
}

/// Load and validate a model file.
pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    log::info!("Loading model from {}", path.display());

    let file = File::open(path).with_context(|| format!("opening model {}", path.display()))?;
    let model: ModelArtifact = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing model {}", path.display()))?;
    model
        .validate()
        .with_context(|| format!("invalid model {}", path.display()))?;

    log::info!(
        "Loaded {} with {} trees over {} features",
        model.kind(),
        model.forest().estimators.len(),
        model.forest().n_features
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUMP_CLASSIFIER: &str = r#"{
        "kind": "random_forest_classifier",
        "n_features": 2,
        "estimators": [{
            "children_left":  [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature":        [1, -2, -2],
            "threshold":      [0.5, -2.0, -2.0],
            "value":          [[5.0, 5.0], [4.0, 1.0], [1.0, 4.0]]
        }]
    }"#;

    #[test]
    fn loads_and_scores_a_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, STUMP_CLASSIFIER).unwrap();

        let model = load_model(&path).unwrap();
        assert!(model.is_classifier());
        assert_eq!(Classifier::n_features(&model), 2);
        let p = model
            .predict_proba(&[vec![0.0, 0.2], vec![0.0, 0.9]])
            .unwrap();
        assert_eq!(p, vec![0.2, 0.8]);
    }

    #[test]
    fn regressor_cannot_classify() {
        let text = STUMP_CLASSIFIER.replace("random_forest_classifier", "random_forest_regressor");
        let model: ModelArtifact = serde_json::from_str(&text).unwrap();
        assert_eq!(
            model.signal_probability(&[0.0, 0.0]),
            Err(ModelError::NotAClassifier("random forest regressor"))
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let text = STUMP_CLASSIFIER.replace("random_forest_classifier", "svm");
        assert!(serde_json::from_str::<ModelArtifact>(&text).is_err());
    }

    #[test]
    fn structural_errors_fail_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, STUMP_CLASSIFIER.replace("[1, -2, -2]", "[7, -2, -2]")).unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::InvalidTree { tree: 0, .. })
        ));
    }
}
