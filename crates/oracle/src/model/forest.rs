use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{read_artifact, Classifier, ModelError};
use crate::FEATURE_WIDTH;

const LEAF: i64 = -1;

/// One fitted decision tree in flat array form: node `i` tests
/// `x[feature[i]] <= threshold[i]` and continues at `children_left[i]`
/// (true) or `children_right[i]` (false). Leaves have both children at `-1`
/// and carry per-class weights `[no_rain, rain]` in `value[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    pub fn n_nodes(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        let n = self.n_nodes();
        if n == 0 {
            return Err(ModelError::Invalid("tree has no nodes".to_string()));
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(ModelError::Invalid("tree arrays differ in length".to_string()));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(ModelError::Invalid(format!("node {node} has one child")));
                }
                if self.value[node].len() != 2 {
                    return Err(ModelError::Invalid(format!(
                        "leaf {node} does not hold two class weights"
                    )));
                }
                if self.value[node].iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(ModelError::Invalid(format!(
                        "leaf {node} has a negative or non-finite class weight"
                    )));
                }
                continue;
            }
            // fitted trees always number children after their parent
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(ModelError::Invalid(format!(
                        "node {node} points to invalid child {child}"
                    )));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(ModelError::Invalid(format!(
                    "node {node} splits on unknown feature {feature}"
                )));
            }
        }
        Ok(())
    }

    /// Class-1 fraction of the leaf reached by `features`.
    fn leaf_probability(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            node = if features[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights[1] / total
        } else {
            0.0
        }
    }
}

/// Random forest: probability is the mean of the trees' leaf class fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let forest: RandomForest = read_artifact(path)?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_features != FEATURE_WIDTH {
            return Err(ModelError::Width {
                expected: FEATURE_WIDTH,
                actual: self.n_features,
            });
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_string()));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| ModelError::Invalid(format!("tree {index}: {e}")))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::Width {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| tree.leaf_probability(features))
            .sum();
        Ok(sum / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single split on `feature`: `<= threshold` → mostly dry, else mostly rain.
    fn stump(feature: i64, threshold: f64, dry: [f64; 2], wet: [f64; 2]) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![50.0, 50.0], dry.to_vec(), wet.to_vec()],
        }
    }

    fn row(humidity: f64) -> Vec<f64> {
        vec![10.0, 1010.0, humidity, 6.0, 10.0, 15.0, 12.0, 3.0]
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let forest = RandomForest {
            n_features: 8,
            trees: vec![stump(2, 85.0, [9.0, 1.0], [2.0, 8.0])],
        };
        forest.validate().unwrap();

        assert!((forest.predict_proba(&row(85.0)).unwrap() - 0.1).abs() < 1e-12);
        assert!((forest.predict_proba(&row(85.1)).unwrap() - 0.8).abs() < 1e-12);
        assert!(!forest.predict(&row(85.0)).unwrap());
        assert!(forest.predict(&row(90.0)).unwrap());
    }

    #[test]
    fn probability_is_the_mean_over_trees() {
        let forest = RandomForest {
            n_features: 8,
            trees: vec![
                stump(2, 85.0, [1.0, 0.0], [0.0, 1.0]),
                stump(0, 5.0, [0.0, 1.0], [1.0, 0.0]),
            ],
        };
        // humidity 90 → 1.0, temperature 10 > 5 → 0.0
        assert!((forest.predict_proba(&row(90.0)).unwrap() - 0.5).abs() < 1e-12);
        // exactly one half is not rain
        assert!(!forest.predict(&row(90.0)).unwrap());
    }

    #[test]
    fn rejects_malformed_trees() {
        let mut bad = stump(2, 85.0, [1.0, 0.0], [0.0, 1.0]);
        bad.children_left[0] = 7;
        let forest = RandomForest {
            n_features: 8,
            trees: vec![bad],
        };
        assert!(forest.validate().is_err());

        let mut cyclic = stump(2, 85.0, [1.0, 0.0], [0.0, 1.0]);
        cyclic.children_right[0] = 0;
        assert!(cyclic.validate(8).is_err());

        let mut unknown_feature = stump(2, 85.0, [1.0, 0.0], [0.0, 1.0]);
        unknown_feature.feature[0] = 8;
        assert!(unknown_feature.validate(8).is_err());

        let negative_leaf = stump(2, 85.0, [1.0, 0.0], [-1.0, 2.0]);
        assert!(negative_leaf.validate(8).is_err());

        let nan_leaf = stump(2, 85.0, [f64::NAN, 1.0], [0.0, 1.0]);
        assert!(nan_leaf.validate(8).is_err());

        let wrong_width = RandomForest {
            n_features: 6,
            trees: vec![stump(2, 85.0, [1.0, 0.0], [0.0, 1.0])],
        };
        assert!(matches!(
            wrong_width.validate(),
            Err(ModelError::Width { expected: 8, actual: 6 })
        ));
    }

    #[test]
    fn wrong_input_width_is_an_error() {
        let forest = RandomForest {
            n_features: 8,
            trees: vec![stump(2, 85.0, [1.0, 0.0], [0.0, 1.0])],
        };
        assert!(forest.predict_proba(&[1.0, 2.0]).is_err());
    }
}
