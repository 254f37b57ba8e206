use super::{Features, N_FEATURES};
use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Population mean/std per column. A constant column gets scale 1 so it maps to 0.
    pub fn fit(rows: &[Features]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; N_FEATURES];
        let mut scale = vec![1.0; N_FEATURES];

        for j in 0..N_FEATURES {
            mean[j] = rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            if std > f64::EPSILON * mean[j].abs().max(1.0) {
                scale[j] = std;
            }
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &Features) -> Features {
        let mut out = [0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform_all(&self, rows: &[Features]) -> Vec<Features> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.mean.len() == N_FEATURES
            && self.scale.len() == N_FEATURES
            && self.mean.iter().all(|m| m.is_finite())
            && self.scale.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_to_zero_mean_unit_variance() {
        let rows = vec![[1.0, 10.0, 5.0], [3.0, 20.0, 5.0], [5.0, 30.0, 5.0]];
        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler.transform_all(&rows);

        for j in 0..2 {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / 3.0;
            let var: f64 = scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
        // Constant column keeps scale 1 and maps to zero.
        assert_eq!(scaler.scale[2], 1.0);
        assert!(scaled.iter().all(|r| r[2] == 0.0));
        assert!(scaler.is_consistent());
    }

    #[test]
    fn transform_uses_stored_parameters() {
        let scaler = StandardScaler {
            mean: vec![100.0, 10.0, 20.0],
            scale: vec![50.0, 5.0, 10.0],
        };
        assert_eq!(scaler.transform(&[150.0, 0.0, 20.0]), [1.0, -2.0, 0.0]);
    }
}
