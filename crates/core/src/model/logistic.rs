//! Multinomial logistic regression fitted by full-batch gradient descent.

use super::{argmax, Classifier, Features, Samples, N_FEATURES};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop when the loss improves by less than this.
    pub tolerance: f64,
    /// Inverse L2 strength (larger = weaker penalty).
    pub c: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iter: 1000,
            tolerance: 1e-7,
            c: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticConfig,
    /// `weights[class][feature]`
    weights: Vec<[f64; N_FEATURES]>,
    bias: Vec<f64>,
    iterations: usize,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            bias: Vec::new(),
            iterations: 0,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.bias.len()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.weights.len() != self.bias.len() {
            return Err(format!(
                "logistic regression has {} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            ));
        }
        Ok(())
    }

    fn logits(&self, x: &Features) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
            .collect()
    }

    pub fn predict_proba(&self, x: &Features) -> Vec<f64> {
        softmax(&self.logits(x))
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn fit(&mut self, samples: &Samples, n_classes: usize) -> Result<()> {
        if samples.is_empty() || n_classes == 0 {
            return Err(Error::InsufficientData(
                "logistic regression needs at least one sample and class".to_string(),
            ));
        }

        let n = samples.len() as f64;
        // sklearn-style objective: C * sum(loss) + 0.5 * |w|^2, divided through by C * n.
        let alpha = 1.0 / (self.config.c * n);

        self.weights = vec![[0.0; N_FEATURES]; n_classes];
        self.bias = vec![0.0; n_classes];
        self.iterations = 0;

        let mut prev_loss = f64::INFINITY;
        for iter in 0..self.config.max_iter {
            let mut grad_w = vec![[0.0; N_FEATURES]; n_classes];
            let mut grad_b = vec![0.0; n_classes];
            let mut loss = 0.0;

            for (x, &y) in samples.x.iter().zip(&samples.y) {
                let p = self.predict_proba(x);
                loss -= p[y].max(1e-15).ln();
                for c in 0..n_classes {
                    let err = p[c] - if c == y { 1.0 } else { 0.0 };
                    for j in 0..N_FEATURES {
                        grad_w[c][j] += err * x[j];
                    }
                    grad_b[c] += err;
                }
            }

            loss /= n;
            let penalty: f64 = self.weights.iter().flatten().map(|w| w * w).sum();
            loss += 0.5 * alpha * penalty;

            for c in 0..n_classes {
                for j in 0..N_FEATURES {
                    let g = grad_w[c][j] / n + alpha * self.weights[c][j];
                    self.weights[c][j] -= self.config.learning_rate * g;
                }
                self.bias[c] -= self.config.learning_rate * grad_b[c] / n;
            }

            self.iterations = iter + 1;
            if (prev_loss - loss).abs() < self.config.tolerance {
                tracing::debug!(iterations = self.iterations, loss, "logistic regression converged");
                break;
            }
            prev_loss = loss;
        }

        Ok(())
    }

    fn predict_one(&self, x: &Features) -> usize {
        argmax(&self.logits(x))
    }
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_is_a_distribution() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
        // Large logits do not overflow.
        let p = softmax(&[1000.0, 0.0]);
        assert!((p[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn separates_three_bands_on_one_feature() {
        let mut samples = Samples::default();
        for i in 0..90 {
            let v = i as f64 / 30.0 - 1.5;
            let class = i / 30;
            samples.push([v, 0.0, -v], class);
        }

        let mut model = LogisticRegression::new(LogisticConfig::default());
        model.fit(&samples, 3).unwrap();

        assert_eq!(model.n_classes(), 3);
        assert!(model.iterations() > 0 && model.iterations() <= 1000);
        assert!(model.score(&samples) > 0.9);
        assert_eq!(model.predict_one(&[-1.4, 0.0, 1.4]), 0);
        assert_eq!(model.predict_one(&[1.4, 0.0, -1.4]), 2);
    }

    #[test]
    fn refuses_empty_training_set() {
        let mut model = LogisticRegression::new(LogisticConfig::default());
        assert!(model.fit(&Samples::default(), 3).is_err());
    }

    #[test]
    fn validate_matches_weights_to_biases() {
        let mut model = LogisticRegression::new(LogisticConfig::default());
        model.weights = vec![[0.0; N_FEATURES]; 3];
        model.bias = vec![0.0; 3];
        assert_eq!(model.validate(), Ok(()));

        model.weights.pop();
        assert!(model.validate().unwrap_err().contains("2 weight rows but 3 biases"));
    }
}
