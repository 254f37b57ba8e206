//! CART classification tree (Gini impurity).

use super::{argmax, Classifier, Features, Samples, N_FEATURES};
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split (`None` = all of them).
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        /// Class fractions of the training rows that reached this leaf.
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    fn validate(&self, n_classes: usize) -> std::result::Result<(), String> {
        match self {
            Node::Leaf { distribution } if distribution.len() != n_classes => Err(format!(
                "leaf has {} class fractions (expected {n_classes})",
                distribution.len()
            )),
            Node::Leaf { .. } => Ok(()),
            Node::Split { feature, .. } if *feature >= N_FEATURES => {
                Err(format!("split on feature {feature} (only {N_FEATURES} features)"))
            }
            Node::Split { threshold, .. } if !threshold.is_finite() => {
                Err("split threshold is not finite".to_string())
            }
            Node::Split { left, right, .. } => {
                left.validate(n_classes)?;
                right.validate(n_classes)
            }
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    n_classes: usize,
    root: Option<Node>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            n_classes: 0,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Normalized total impurity decrease per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Checks that a deserialized tree is fitted and every node can be walked safely.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let root = self.root.as_ref().ok_or("decision tree has no root")?;
        root.validate(self.n_classes)
    }

    /// Fits on the rows of `samples` named by `indices` (repeats allowed, as in a bootstrap draw).
    pub fn fit_indices(&mut self, samples: &Samples, indices: &[usize], n_classes: usize) -> Result<()> {
        if indices.is_empty() || n_classes == 0 {
            return Err(Error::InsufficientData(
                "decision tree needs at least one sample and class".to_string(),
            ));
        }

        self.n_classes = n_classes;
        self.feature_importances = vec![0.0; N_FEATURES];
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let root = self.build(samples, indices, 0, &mut rng);
        self.root = Some(root);

        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
        Ok(())
    }

    pub fn predict_proba(&self, x: &Features) -> Vec<f64> {
        let mut node = match &self.root {
            Some(root) => root,
            None => return vec![0.0; self.n_classes],
        };
        loop {
            match node {
                Node::Leaf { distribution } => return distribution.clone(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn build(&mut self, samples: &Samples, indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let counts = class_counts(samples, indices, self.n_classes);
        let impurity = gini(&counts, indices.len());

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || indices.len() < self.config.min_samples_split || impurity <= 0.0 {
            return leaf(&counts, indices.len());
        }

        let Some(split) = self.best_split(samples, indices, impurity, rng) else {
            return leaf(&counts, indices.len());
        };

        self.feature_importances[split.feature] += split.gain * indices.len() as f64;
        let left = self.build(samples, &split.left, depth + 1, rng);
        let right = self.build(samples, &split.right, depth + 1, rng);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(
        &self,
        samples: &Samples,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..N_FEATURES).collect();
        if let Some(k) = self.config.max_features.filter(|k| *k < N_FEATURES) {
            features.shuffle(rng);
            features.truncate(k.max(1));
        }

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in &features {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| samples.x[a][feature].total_cmp(&samples.x[b][feature]));

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = class_counts(samples, indices, self.n_classes);

            // Sweep split points between consecutive distinct values.
            for pos in 1..n {
                let moved = order[pos - 1];
                left_counts[samples.y[moved]] += 1;
                right_counts[samples.y[moved]] -= 1;

                let lo = samples.x[moved][feature];
                let hi = samples.x[order[pos]][feature];
                if lo == hi || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }

                let weighted = (pos as f64 * gini(&left_counts, pos)
                    + (n - pos) as f64 * gini(&right_counts, n - pos))
                    / n as f64;
                let gain = parent_impurity - weighted;

                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (lo + hi) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| samples.x[i][feature] <= threshold);
        if left.is_empty() || right.is_empty() {
            return None;
        }

        Some(BestSplit {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }
}

impl Classifier for DecisionTree {
    fn name(&self) -> &'static str {
        "Decision Tree"
    }

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()> {
        let indices: Vec<usize> = (0..samples.len()).collect();
        self.fit_indices(samples, &indices, n_classes)
    }

    fn predict_one(&self, x: &Features) -> usize {
        argmax(&self.predict_proba(x))
    }
}

fn class_counts(samples: &Samples, indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[samples.y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

fn leaf(counts: &[usize], total: usize) -> Node {
    let total = total.max(1) as f64;
    Node::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}
