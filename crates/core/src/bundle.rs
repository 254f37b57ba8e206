//! The persisted model artifact: classifier, scaler and label encoder as one JSON document.

use crate::domain::Recommendation;
use crate::error::{Error, Result};
use crate::model::encoder::LabelEncoder;
use crate::model::metrics::EvaluationReport;
use crate::model::scaler::StandardScaler;
use crate::model::{Classifier, Features, TrainedModel};
use crate::train::ZeroRevenuePolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub id: uuid::Uuid,
    pub trained_at: DateTime<Utc>,
    pub dataset: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub zero_revenue: ZeroRevenuePolicy,
    pub rows_used: usize,
    pub rows_dropped: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub selected: String,
    pub accuracy: f64,
    pub evaluations: Vec<EvaluationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub schema_version: u32,
    pub classifier: TrainedModel,
    pub scaler: StandardScaler,
    pub encoder: LabelEncoder,
    pub metadata: TrainingMetadata,
}

impl ModelBundle {
    /// Scales `features`, classifies, and decodes the class id.
    pub fn predict(&self, features: &Features) -> Result<Recommendation> {
        let class = self.classifier.predict_one(&self.scaler.transform(features));
        self.encoder.decode(class).ok_or(Error::UnknownClass(class))
    }

    /// Writes the bundle next to `path` and renames it into place, so readers never see a
    /// partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".tmp-{}", self.metadata.id));
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, &json)?;
        if let Err(err) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }

        tracing::info!(path = %path.display(), bytes = json.len(), "saved model bundle");
        Ok(())
    }

    /// Reads and validates a bundle. Every failure maps to [`Error::BundleLoadFailure`].
    pub fn load(path: &Path) -> Result<Self> {
        let fail = |reason: String| Error::BundleLoadFailure {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
        let bundle: ModelBundle = serde_json::from_slice(&bytes).map_err(|e| fail(e.to_string()))?;
        bundle.validate().map_err(fail)?;

        tracing::info!(
            path = %path.display(),
            classifier = bundle.classifier.name(),
            trained_at = %bundle.metadata.trained_at,
            "loaded model bundle"
        );
        Ok(bundle)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.schema_version != BUNDLE_SCHEMA_VERSION {
            return Err(format!(
                "schema version {} (expected {BUNDLE_SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        if !self.scaler.is_consistent() {
            return Err("scaler parameters are malformed".to_string());
        }
        if self.encoder.is_empty() {
            return Err("label encoder has no classes".to_string());
        }
        if self.classifier.n_classes() != self.encoder.len() {
            return Err(format!(
                "classifier has {} classes but encoder has {}",
                self.classifier.n_classes(),
                self.encoder.len()
            ));
        }
        self.classifier.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::tests::synthetic_dataset;
    use crate::train::{train, TrainingConfig};

    fn trained() -> ModelBundle {
        train(&synthetic_dataset(80), &TrainingConfig::default()).unwrap()
    }

    #[test]
    fn save_then_load_predicts_identically() {
        let bundle = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("bundle.json");

        bundle.save(&path).unwrap();
        let loaded = ModelBundle::load(&path).unwrap();

        assert_eq!(loaded.metadata, bundle.metadata);
        assert_eq!(loaded.scaler, bundle.scaler);
        for row in [[1000.0, 150.0, 350.0], [900.0, 10.0, 20.0], [1100.0, 80.0, 200.0], [0.0, 0.0, 0.0]] {
            assert_eq!(loaded.predict(&row).unwrap(), bundle.predict(&row).unwrap());
        }

        // Only the bundle remains; the temp file was renamed away.
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn load_failures_are_bundle_load_failures() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.json");
        assert!(matches!(ModelBundle::load(&missing), Err(Error::BundleLoadFailure { .. })));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, b"{\"classifier\": ").unwrap();
        assert!(matches!(ModelBundle::load(&corrupt), Err(Error::BundleLoadFailure { .. })));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let mut bundle = trained();
        bundle.schema_version = 99;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        bundle.save(&path).unwrap();

        match ModelBundle::load(&path) {
            Err(Error::BundleLoadFailure { reason, .. }) => assert!(reason.contains("schema version 99")),
            other => panic!("expected load failure, got {other:?}"),
        }
    }

    #[test]
    fn encoder_mismatch_is_rejected() {
        let mut bundle = trained();
        bundle.encoder = LabelEncoder::fit(&[Recommendation::Hold]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        bundle.save(&path).unwrap();

        assert!(matches!(ModelBundle::load(&path), Err(Error::BundleLoadFailure { .. })));
    }

    fn load_with_classifier(classifier: serde_json::Value) -> Result<ModelBundle> {
        let mut value = serde_json::to_value(trained()).unwrap();
        value["classifier"] = classifier;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        ModelBundle::load(&path)
    }

    fn tree_json(root: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "kind": "decision_tree",
            "config": crate::model::tree::TreeConfig::default(),
            "n_classes": 3,
            "root": root,
            "feature_importances": [0.0, 0.0, 0.0],
        })
    }

    fn load_failure_reason(result: Result<ModelBundle>) -> String {
        match result {
            Err(Error::BundleLoadFailure { reason, .. }) => reason,
            other => panic!("expected load failure, got {other:?}"),
        }
    }

    #[test]
    fn tree_split_on_unknown_feature_is_rejected() {
        let leaf = serde_json::json!({"node": "leaf", "distribution": [1.0, 0.0, 0.0]});
        let root = serde_json::json!({
            "node": "split",
            "feature": 7,
            "threshold": 0.0,
            "left": leaf,
            "right": leaf,
        });
        let reason = load_failure_reason(load_with_classifier(tree_json(root)));
        assert!(reason.contains("feature 7"), "{reason}");
    }

    #[test]
    fn tree_without_root_is_rejected() {
        let reason = load_failure_reason(load_with_classifier(tree_json(serde_json::Value::Null)));
        assert!(reason.contains("no root"), "{reason}");
    }

    #[test]
    fn empty_forest_is_rejected() {
        let forest = serde_json::json!({
            "kind": "random_forest",
            "config": crate::model::forest::ForestConfig::default(),
            "n_classes": 3,
            "trees": [],
        });
        let reason = load_failure_reason(load_with_classifier(forest));
        assert!(reason.contains("no trees"), "{reason}");
    }

    #[test]
    fn logistic_weights_must_match_biases() {
        let logistic = serde_json::json!({
            "kind": "logistic",
            "config": crate::model::logistic::LogisticConfig::default(),
            "weights": [[0.1, 0.2, 0.3], [0.0, 0.0, 0.0]],
            "bias": [0.0, 0.0, 0.0],
            "iterations": 10,
        });
        let reason = load_failure_reason(load_with_classifier(logistic));
        assert!(reason.contains("weight rows"), "{reason}");
    }

    #[test]
    fn svm_coefficients_must_match_support_vectors() {
        let svm = serde_json::json!({
            "kind": "kernel_svm",
            "config": crate::model::svm::SvmConfig::default(),
            "gamma": 0.33,
            "support_vectors": [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            "coefficients": [[1.0, -1.0], [-1.0], [0.5, 0.5]],
        });
        let reason = load_failure_reason(load_with_classifier(svm));
        assert!(reason.contains("support vectors"), "{reason}");
    }

    #[test]
    fn documents_carry_the_expected_members() {
        let value = serde_json::to_value(trained()).unwrap();
        for key in ["schema_version", "classifier", "scaler", "encoder", "metadata"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["classifier"]["kind"].is_string());
        assert_eq!(value["metadata"]["zero_revenue"], serde_json::json!("drop"));
    }
}
