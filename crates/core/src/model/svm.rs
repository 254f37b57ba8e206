//! RBF-kernel SVM, one-vs-rest, trained with kernelized Pegasos.
//!
//! Fitting precomputes the dense n x n Gram matrix of the training rows, so memory grows
//! with the square of the training set size. Fact-sheet datasets run to a few hundred
//! rows; a much larger training set would need kernel rows computed on demand instead.

use super::{argmax, Classifier, Features, Samples, N_FEATURES};
use crate::error::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmConfig {
    /// Inverse regularization strength.
    pub c: f64,
    /// Passes over the training set per binary problem.
    pub epochs: usize,
    /// Fixed kernel width; `None` uses `1 / (n_features * var(X))`.
    pub gamma: Option<f64>,
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epochs: 20,
            gamma: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSvm {
    config: SvmConfig,
    gamma: f64,
    support_vectors: Vec<Features>,
    /// `coefficients[class][sv]`, already signed and scaled.
    coefficients: Vec<Vec<f64>>,
}

impl KernelSvm {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            gamma: 0.0,
            support_vectors: Vec::new(),
            coefficients: Vec::new(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.coefficients.len()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(format!("svm gamma {} is not positive", self.gamma));
        }
        let n_support = self.support_vectors.len();
        for (class, coef) in self.coefficients.iter().enumerate() {
            if coef.len() != n_support {
                return Err(format!(
                    "svm class {class} has {} coefficients for {n_support} support vectors",
                    coef.len()
                ));
            }
        }
        Ok(())
    }

    pub fn decision_function(&self, x: &Features) -> Vec<f64> {
        let k: Vec<f64> = self.support_vectors.iter().map(|sv| rbf(self.gamma, sv, x)).collect();
        self.coefficients
            .iter()
            .map(|coef| coef.iter().zip(&k).map(|(a, kv)| a * kv).sum())
            .collect()
    }
}

impl Classifier for KernelSvm {
    fn name(&self) -> &'static str {
        "SVM"
    }

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()> {
        let n = samples.len();
        if n == 0 || n_classes == 0 || self.config.epochs == 0 {
            return Err(Error::InsufficientData(
                "svm needs samples, classes and at least one epoch".to_string(),
            ));
        }

        let gamma = self.config.gamma.unwrap_or_else(|| scale_gamma(&samples.x));
        let gram: Vec<Vec<f64>> = samples
            .x
            .iter()
            .map(|a| samples.x.iter().map(|b| rbf(gamma, a, b)).collect())
            .collect();

        let lambda = 1.0 / (self.config.c * n as f64);
        let steps = self.config.epochs * n;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        // alphas[class][i]: how many times row i violated the margin.
        let mut alphas = vec![vec![0u32; n]; n_classes];
        for (class, alpha) in alphas.iter_mut().enumerate() {
            let sign = |i: usize| if samples.y[i] == class { 1.0 } else { -1.0 };
            // g[k] = sum_j alpha_j y_j K(j, k), kept current as alphas change.
            let mut g = vec![0.0; n];
            for t in 1..=steps {
                let i = rng.gen_range(0..n);
                let yi = sign(i);
                let margin = yi * g[i] / (lambda * t as f64);
                if margin < 1.0 {
                    alpha[i] += 1;
                    for (gk, kik) in g.iter_mut().zip(&gram[i]) {
                        *gk += yi * kik;
                    }
                }
            }
        }

        let scale = 1.0 / (lambda * steps as f64);
        let support: Vec<usize> = (0..n)
            .filter(|&i| alphas.iter().any(|a| a[i] > 0))
            .collect();

        self.gamma = gamma;
        self.support_vectors = support.iter().map(|&i| samples.x[i]).collect();
        self.coefficients = alphas
            .iter()
            .enumerate()
            .map(|(class, alpha)| {
                support
                    .iter()
                    .map(|&i| {
                        let yi = if samples.y[i] == class { 1.0 } else { -1.0 };
                        alpha[i] as f64 * yi * scale
                    })
                    .collect()
            })
            .collect();

        tracing::debug!(gamma, support_vectors = support.len(), "svm fitted");
        Ok(())
    }

    fn predict_one(&self, x: &Features) -> usize {
        argmax(&self.decision_function(x))
    }
}

fn rbf(gamma: f64, a: &Features, b: &Features) -> f64 {
    let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * dist).exp()
}

/// `1 / (n_features * var)` over every cell of `x`; falls back to `1 / n_features`
/// when the data has no spread.
fn scale_gamma(x: &[Features]) -> f64 {
    let count = (x.len() * N_FEATURES) as f64;
    let mean = x.iter().flatten().sum::<f64>() / count;
    let var = x.iter().flatten().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    if var > 0.0 {
        1.0 / (N_FEATURES as f64 * var)
    } else {
        1.0 / N_FEATURES as f64
    }
}
