//! Bagged ensemble of randomized CART trees.

use super::tree::{DecisionTree, TreeConfig};
use super::{argmax, Classifier, Features, Samples, N_FEATURES};
use crate::error::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    /// Features examined per split; `None` means `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            n_classes: 0,
            trees: Vec::new(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree class distributions.
    pub fn predict_proba(&self, x: &Features) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        if self.trees.is_empty() {
            return proba;
        }
        for tree in &self.trees {
            for (p, t) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *p += t;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("random forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_classes() != self.n_classes {
                return Err(format!(
                    "tree {i} has {} classes (expected {})",
                    tree.n_classes(),
                    self.n_classes
                ));
            }
            tree.validate().map_err(|reason| format!("tree {i}: {reason}"))?;
        }
        Ok(())
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; N_FEATURES];
        for tree in &self.trees {
            for (acc, imp) in total.iter_mut().zip(tree.feature_importances()) {
                *acc += imp;
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        total
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()> {
        if samples.is_empty() || n_classes == 0 || self.config.n_trees == 0 {
            return Err(Error::InsufficientData(
                "random forest needs samples, classes and at least one tree".to_string(),
            ));
        }

        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| ((N_FEATURES as f64).sqrt() as usize).max(1));
        let n = samples.len();

        let mut trees = Vec::with_capacity(self.config.n_trees);
        for i in 0..self.config.n_trees {
            let tree_seed = self.config.seed.wrapping_add(i as u64);
            let indices: Vec<usize> = if self.config.bootstrap {
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };

            let mut tree = DecisionTree::new(TreeConfig {
                max_depth: self.config.max_depth,
                max_features: Some(max_features),
                seed: tree_seed,
                ..Default::default()
            });
            tree.fit_indices(samples, &indices, n_classes)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_classes = n_classes;
        tracing::debug!(trees = self.trees.len(), max_features, "random forest fitted");
        Ok(())
    }

    fn predict_one(&self, x: &Features) -> usize {
        argmax(&self.predict_proba(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters() -> Samples {
        let mut samples = Samples::default();
        for i in 0..60 {
            let class = i % 3;
            let jitter = (i / 3) as f64 * 0.01;
            let centre = class as f64 * 3.0;
            samples.push([centre + jitter, centre - jitter, centre], class);
        }
        samples
    }

    #[test]
    fn separates_clusters() {
        let samples = clusters();
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 25,
            ..Default::default()
        });
        forest.fit(&samples, 3).unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.n_classes(), 3);
        assert!(forest.score(&samples) > 0.95);
        assert_eq!(forest.predict_one(&[6.0, 6.0, 6.0]), 2);

        let proba = forest.predict_proba(&[0.0, 0.0, 0.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((forest.feature_importances().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let samples = clusters();
        let fit = |seed| {
            let mut forest = RandomForest::new(ForestConfig {
                n_trees: 10,
                seed,
                ..Default::default()
            });
            forest.fit(&samples, 3).unwrap();
            forest.predict_proba(&[1.5, 1.5, 1.5])
        };
        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn zero_trees_is_an_error() {
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 0,
            ..Default::default()
        });
        assert!(forest.fit(&clusters(), 3).is_err());
    }

    #[test]
    fn validate_needs_valid_trees() {
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 3,
            ..Default::default()
        });
        assert!(forest.validate().unwrap_err().contains("no trees"));

        forest.fit(&clusters(), 3).unwrap();
        assert_eq!(forest.validate(), Ok(()));

        forest.trees.push(DecisionTree::new(TreeConfig::default()));
        assert!(forest.validate().unwrap_err().starts_with("tree 3"));
    }
}
