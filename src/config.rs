use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Off-source region used for the background prediction when the
/// configuration names none.
pub const DEFAULT_BACKGROUND_REGION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("training_variables must list at least one column")]
    NoTrainingVariables,

    #[error("training variable '{0}' is listed more than once")]
    DuplicateVariable(String),

    #[error("background_regions must list at least one off region")]
    NoBackgroundRegions,
}

/// Settings shared with the training step. Keys the tools do not use are
/// ignored, so the training configuration can be passed as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Model input columns, in the order the model was trained on.
    pub training_variables: Vec<String>,

    /// Row selection applied before predicting.
    #[serde(default)]
    query: Option<String>,

    /// Numbers of the off regions evaluated for the background prediction.
    #[serde(default = "default_background_regions")]
    pub background_regions: Vec<u32>,
}

fn default_background_regions() -> Vec<u32> {
    vec![DEFAULT_BACKGROUND_REGION]
}

impl Config {
    /// Read and validate a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in configuration {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text).context("parsing YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// The row selection, if one is set. Blank strings count as unset.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training_variables.is_empty() {
            return Err(ConfigError::NoTrainingVariables);
        }
        let mut seen = HashSet::new();
        for var in &self.training_variables {
            if !seen.insert(var) {
                return Err(ConfigError::DuplicateVariable(var.clone()));
            }
        }
        if self.background_regions.is_empty() {
            return Err(ConfigError::NoBackgroundRegions);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_training_config_and_ignores_unknown_keys() {
        let config = Config::from_yaml(
            r#"
n_background: 100000
training_variables:
  - size
  - width
  - Theta
query: size > 60 and width < 20
classifier: RandomForestClassifier(n_estimators=200)
"#,
        )
        .unwrap();
        assert_eq!(config.training_variables, ["size", "width", "Theta"]);
        assert_eq!(config.query(), Some("size > 60 and width < 20"));
        assert_eq!(config.background_regions, [3]);
    }

    #[test]
    fn empty_or_missing_query_means_none() {
        for text in [
            "training_variables: [a]",
            "training_variables: [a]\nquery:",
            "training_variables: [a]\nquery: ''",
            "training_variables: [a]\nquery: '   '",
        ] {
            assert_eq!(Config::from_yaml(text).unwrap().query(), None, "{text}");
        }
    }

    #[test]
    fn rejects_degenerate_variable_lists() {
        let err = Config::from_yaml("training_variables: []").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NoTrainingVariables)
        );

        let err = Config::from_yaml("training_variables: [a, b, a]").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::DuplicateVariable("a".into()))
        );

        let err = Config::from_yaml("training_variables: [a]\nbackground_regions: []").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NoBackgroundRegions)
        );
    }

    #[test]
    fn missing_training_variables_is_a_parse_error() {
        assert!(Config::from_yaml("query: a > 1").is_err());
    }
}
