use serde::{Deserialize, Serialize};

use super::{FeatureImportances, ModelError};

/// `children_left` marker of a leaf node.
pub const LEAF: i64 = -1;

// ---------------------------------------------------------------------------
// Tree – flat node arrays as exported from `estimator.tree_`
// ---------------------------------------------------------------------------

/// A single decision tree.
///
/// Node `i` is a leaf when `children_left[i] == -1`. Otherwise rows with
/// `x[feature[i]] <= threshold[i]` continue at `children_left[i]`, the others
/// at `children_right[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per node: class weights for classifiers, `[mean]` for regressors.
    pub value: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impurity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_n_node_samples: Option<Vec<f64>>,
}

impl Tree {
    pub fn n_nodes(&self) -> usize {
        self.children_left.len()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] == LEAF
    }

    /// Check array lengths, child links and feature indices.
    ///
    /// Children must come after their parent, so traversal always ends.
    pub fn validate(&self, n_features: usize, classifier: bool) -> Result<(), String> {
        let n = self.n_nodes();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        let lengths = [
            ("children_right", self.children_right.len()),
            ("feature", self.feature.len()),
            ("threshold", self.threshold.len()),
            ("value", self.value.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(format!("{name} has {len} entries for {n} nodes"));
            }
        }
        for (name, arr) in [
            ("impurity", &self.impurity),
            ("weighted_n_node_samples", &self.weighted_n_node_samples),
        ] {
            if let Some(arr) = arr {
                if arr.len() != n {
                    return Err(format!("{name} has {} entries for {n} nodes", arr.len()));
                }
            }
        }

        for node in 0..n {
            if self.is_leaf(node) {
                let width = self.value[node].len();
                if classifier && width < 2 {
                    return Err(format!("leaf {node} has {width} class weights"));
                }
                if !classifier && width == 0 {
                    return Err(format!("leaf {node} has no value"));
                }
                continue;
            }
            for child in [self.children_left[node], self.children_right[node]] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {node} links to invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature >= n_features as i64 {
                return Err(format!("node {node} splits on unknown feature {feature}"));
            }
        }
        Ok(())
    }

    /// Index of the leaf a row ends up in.
    ///
    /// Features are compared at single precision, as the trees were fitted.
    pub fn leaf(&self, x: &[f64]) -> usize {
        let mut node = 0;
        while !self.is_leaf(node) {
            let value = x[self.feature[node] as usize] as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Normalised weight of class 1 at the row's leaf.
    pub fn class_one_probability(&self, x: &[f64]) -> f64 {
        let weights = &self.value[self.leaf(x)];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights[1] / total
        } else {
            0.0
        }
    }

    /// Mean impurity decrease per feature, normalised to sum to one.
    ///
    /// `None` when the tree was exported without impurity data.
    pub fn impurity_importances(&self, n_features: usize) -> Option<Vec<f64>> {
        let impurity = self.impurity.as_ref()?;
        let weight = self.weighted_n_node_samples.as_ref()?;

        let mut importances = vec![0.0; n_features];
        for node in (0..self.n_nodes()).filter(|&n| !self.is_leaf(n)) {
            let left = self.children_left[node] as usize;
            let right = self.children_right[node] as usize;
            importances[self.feature[node] as usize] += weight[node] * impurity[node]
                - weight[left] * impurity[left]
                - weight[right] * impurity[right];
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }
        Some(importances)
    }
}

// ---------------------------------------------------------------------------
// Forest – averaged ensemble of trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub n_features: usize,
    /// `feature_importances_` of the fitted estimator, if exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
    pub estimators: Vec<Tree>,
}

impl Forest {
    pub fn validate(&self, classifier: bool) -> Result<(), ModelError> {
        if self.estimators.is_empty() {
            return Err(ModelError::NoTrees);
        }
        for (i, tree) in self.estimators.iter().enumerate() {
            tree.validate(self.n_features, classifier)
                .map_err(|reason| ModelError::InvalidTree { tree: i, reason })?;
        }
        if let Some(importances) = &self.feature_importances {
            if importances.len() != self.n_features {
                return Err(ModelError::ImportanceCount {
                    expected: self.n_features,
                    found: importances.len(),
                });
            }
        }
        Ok(())
    }

    fn check_row(&self, x: &[f64]) -> Result<(), ModelError> {
        if x.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                found: x.len(),
            });
        }
        Ok(())
    }

    /// Mean over trees of the class-1 probability.
    pub fn class_one_probability(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.check_row(x)?;
        let sum: f64 = self
            .estimators
            .iter()
            .map(|t| t.class_one_probability(x))
            .sum();
        Ok(sum / self.estimators.len() as f64)
    }

    /// Per-tree impurity importances when every tree carries impurity data
    /// (mean and population standard deviation across trees), otherwise the
    /// exported `feature_importances` without a spread.
    pub fn feature_importances(&self) -> Result<FeatureImportances, ModelError> {
        let per_tree: Option<Vec<Vec<f64>>> = self
            .estimators
            .iter()
            .map(|t| t.impurity_importances(self.n_features))
            .collect();

        match (per_tree, &self.feature_importances) {
            (Some(per_tree), _) if !per_tree.is_empty() => {
                let n = per_tree.len() as f64;
                let mean: Vec<f64> = (0..self.n_features)
                    .map(|f| per_tree.iter().map(|t| t[f]).sum::<f64>() / n)
                    .collect();
                let std = (0..self.n_features)
                    .map(|f| {
                        let var = per_tree
                            .iter()
                            .map(|t| (t[f] - mean[f]).powi(2))
                            .sum::<f64>()
                            / n;
                        var.sqrt()
                    })
                    .collect();
                Ok(FeatureImportances {
                    mean,
                    std: Some(std),
                })
            }
            (_, Some(importances)) => Ok(FeatureImportances {
                mean: importances.clone(),
                std: None,
            }),
            _ => Err(ModelError::NoImportances),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits on feature 0 at 1.0, then the right branch on feature 1 at 0.0.
    fn tree() -> Tree {
        Tree {
            children_left: vec![1, -1, 3, -1, -1],
            children_right: vec![2, -1, 4, -1, -1],
            feature: vec![0, -2, 1, -2, -2],
            threshold: vec![1.0, -2.0, 0.0, -2.0, -2.0],
            value: vec![
                vec![10.0, 10.0],
                vec![6.0, 0.0],
                vec![4.0, 10.0],
                vec![4.0, 2.0],
                vec![0.0, 8.0],
            ],
            impurity: Some(vec![0.5, 0.0, 0.408, 0.444, 0.0]),
            weighted_n_node_samples: Some(vec![20.0, 6.0, 14.0, 6.0, 8.0]),
        }
    }

    #[test]
    fn traversal_goes_left_on_equal() {
        let t = tree();
        assert_eq!(t.leaf(&[1.0, 5.0]), 1);
        assert_eq!(t.leaf(&[1.5, 0.0]), 3);
        assert_eq!(t.leaf(&[1.5, 0.1]), 4);
        assert!((t.class_one_probability(&[1.5, -1.0]) - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn nan_features_go_right() {
        assert_eq!(tree().leaf(&[f64::NAN, f64::NAN]), 4);
    }

    #[test]
    fn forest_averages_trees() {
        let mut other = tree();
        other.value[4] = vec![8.0, 0.0];
        let forest = Forest {
            n_features: 2,
            feature_importances: None,
            estimators: vec![tree(), other],
        };
        assert_eq!(forest.class_one_probability(&[2.0, 1.0]).unwrap(), 0.5);
        assert_eq!(
            forest.class_one_probability(&[2.0]),
            Err(ModelError::FeatureCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn validation_catches_broken_links() {
        let mut t = tree();
        t.children_right[2] = 1;
        assert!(t.validate(2, true).is_err());

        let mut t = tree();
        t.threshold.pop();
        assert!(t.validate(2, true).is_err());

        let mut t = tree();
        t.value[1] = vec![1.0];
        assert!(t.validate(2, true).is_err());
        assert!(t.validate(2, false).is_ok());

        assert!(tree().validate(1, true).is_err());
    }

    #[test]
    fn impurity_importances_sum_to_one() {
        let imp = tree().impurity_importances(2).unwrap();
        let root = 20.0 * 0.5 - 6.0 * 0.0 - 14.0 * 0.408;
        let right = 14.0 * 0.408 - 6.0 * 0.444 - 8.0 * 0.0;
        assert!((imp[0] - root / (root + right)).abs() < 1e-12);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn importances_fall_back_to_exported_values() {
        let mut t = tree();
        t.impurity = None;
        let forest = Forest {
            n_features: 2,
            feature_importances: Some(vec![0.7, 0.3]),
            estimators: vec![t.clone()],
        };
        let imp = forest.feature_importances().unwrap();
        assert_eq!(imp.mean, vec![0.7, 0.3]);
        assert_eq!(imp.std, None);

        let bare = Forest {
            n_features: 2,
            feature_importances: None,
            estimators: vec![t],
        };
        assert_eq!(bare.feature_importances(), Err(ModelError::NoImportances));
    }

    #[test]
    fn identical_trees_have_no_spread() {
        let forest = Forest {
            n_features: 2,
            feature_importances: None,
            estimators: vec![tree(), tree()],
        };
        let imp = forest.feature_importances().unwrap();
        assert!(imp.std.unwrap().iter().all(|&s| s.abs() < 1e-12));
    }
}
