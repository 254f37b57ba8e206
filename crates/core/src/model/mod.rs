//! Tabular classifiers for the recommendation model, plus the preprocessing they share.
//!
//! Every classifier works on standardized `[Revenue, Net Income, EBITDA]` rows and
//! integer class ids produced by [`encoder::LabelEncoder`].

pub mod encoder;
pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod scaler;
pub mod split;
pub mod svm;
pub mod tree;

use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const N_FEATURES: usize = 3;
pub const FEATURE_NAMES: [&str; N_FEATURES] = ["Revenue", "Net Income", "EBITDA"];

pub type Features = [f64; N_FEATURES];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    pub x: Vec<Features>,
    pub y: Vec<usize>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn push(&mut self, x: Features, y: usize) {
        self.x.push(x);
        self.y.push(y);
    }
}

/// Common surface of the bake-off candidates.
pub trait Classifier {
    fn name(&self) -> &'static str;

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()>;

    fn predict_one(&self, x: &Features) -> usize;

    fn predict(&self, x: &[Features]) -> Vec<usize> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Accuracy on `samples`.
    fn score(&self, samples: &Samples) -> f64 {
        metrics::accuracy(&samples.y, &self.predict(&samples.x))
    }
}

/// A fitted (or ready-to-fit) classifier of one of the supported families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Logistic(logistic::LogisticRegression),
    DecisionTree(tree::DecisionTree),
    RandomForest(forest::RandomForest),
    KernelSvm(svm::KernelSvm),
}

impl TrainedModel {
    /// The bake-off line-up, in training (and tie-break) order.
    pub fn candidates(seed: u64) -> Vec<TrainedModel> {
        vec![
            TrainedModel::Logistic(logistic::LogisticRegression::new(logistic::LogisticConfig::default())),
            TrainedModel::DecisionTree(tree::DecisionTree::new(tree::TreeConfig {
                seed,
                ..Default::default()
            })),
            TrainedModel::RandomForest(forest::RandomForest::new(forest::ForestConfig {
                seed,
                ..Default::default()
            })),
            TrainedModel::KernelSvm(svm::KernelSvm::new(svm::SvmConfig {
                seed,
                ..Default::default()
            })),
        ]
    }

    pub fn n_classes(&self) -> usize {
        match self {
            TrainedModel::Logistic(m) => m.n_classes(),
            TrainedModel::DecisionTree(m) => m.n_classes(),
            TrainedModel::RandomForest(m) => m.n_classes(),
            TrainedModel::KernelSvm(m) => m.n_classes(),
        }
    }

    /// Structural checks for a deserialized model, so a malformed one is refused at load
    /// instead of failing (or panicking) on first use.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            TrainedModel::Logistic(m) => m.validate(),
            TrainedModel::DecisionTree(m) => m.validate(),
            TrainedModel::RandomForest(m) => m.validate(),
            TrainedModel::KernelSvm(m) => m.validate(),
        }
    }
}

impl Classifier for TrainedModel {
    fn name(&self) -> &'static str {
        match self {
            TrainedModel::Logistic(m) => m.name(),
            TrainedModel::DecisionTree(m) => m.name(),
            TrainedModel::RandomForest(m) => m.name(),
            TrainedModel::KernelSvm(m) => m.name(),
        }
    }

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()> {
        match self {
            TrainedModel::Logistic(m) => m.fit(samples, n_classes),
            TrainedModel::DecisionTree(m) => m.fit(samples, n_classes),
            TrainedModel::RandomForest(m) => m.fit(samples, n_classes),
            TrainedModel::KernelSvm(m) => m.fit(samples, n_classes),
        }
    }

    fn predict_one(&self, x: &Features) -> usize {
        match self {
            TrainedModel::Logistic(m) => m.predict_one(x),
            TrainedModel::DecisionTree(m) => m.predict_one(x),
            TrainedModel::RandomForest(m) => m.predict_one(x),
            TrainedModel::KernelSvm(m) => m.predict_one(x),
        }
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
