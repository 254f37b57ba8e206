//! Offline training: label rows by EBITDA margin, run the classifier bake-off, and package
//! the winner with its preprocessing into a [`ModelBundle`].

use crate::bundle::{ModelBundle, TrainingMetadata, BUNDLE_SCHEMA_VERSION};
use crate::domain::{Column, Dataset, FinancialRecord, Recommendation};
use crate::error::{Error, Result};
use crate::model::encoder::LabelEncoder;
use crate::model::metrics::EvaluationReport;
use crate::model::scaler::StandardScaler;
use crate::model::split::train_test_split;
use crate::model::{Classifier, Features, Samples, TrainedModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FEATURE_COLUMNS: [Column; 3] = [Column::Revenue, Column::NetIncome, Column::Ebitda];
pub const MIN_TRAINING_ROWS: usize = 5;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// What to do with rows whose EBITDA margin is undefined (revenue == 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRevenuePolicy {
    /// Skip the row and count it in the bundle metadata.
    #[default]
    Drop,
    /// Abort training.
    Reject,
}

impl fmt::Display for ZeroRevenuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZeroRevenuePolicy::Drop => "drop",
            ZeroRevenuePolicy::Reject => "reject",
        })
    }
}

impl FromStr for ZeroRevenuePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(ZeroRevenuePolicy::Drop),
            "reject" => Ok(ZeroRevenuePolicy::Reject),
            other => Err(format!("unknown zero-revenue policy {other:?} (expected drop|reject)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub zero_revenue: ZeroRevenuePolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            zero_revenue: ZeroRevenuePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: Features,
    pub margin: f64,
    pub label: Recommendation,
}

#[derive(Debug, Clone, Default)]
pub struct LabelledRows {
    pub examples: Vec<TrainingExample>,
    pub dropped: usize,
}

pub fn features_of(record: &FinancialRecord) -> Features {
    [record.revenue, record.net_income, record.ebitda]
}

/// Labels every record by its EBITDA margin. Rows are numbered from 1 in diagnostics.
pub fn label_records(records: &[FinancialRecord], policy: ZeroRevenuePolicy) -> Result<LabelledRows> {
    let mut out = LabelledRows::default();

    for (idx, record) in records.iter().enumerate() {
        let row = idx + 1;
        let features = features_of(record);
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidRecord {
                row,
                detail: format!("non-finite {}", FEATURE_COLUMNS[pos]),
            });
        }

        if record.revenue == 0.0 {
            match policy {
                ZeroRevenuePolicy::Reject => return Err(Error::UndefinedMargin { row }),
                ZeroRevenuePolicy::Drop => {
                    tracing::warn!(row, year = record.year, "dropping row with zero revenue");
                    out.dropped += 1;
                    continue;
                }
            }
        }

        let margin = record.ebitda / record.revenue;
        out.examples.push(TrainingExample {
            features,
            margin,
            label: Recommendation::from_margin(margin),
        });
    }

    Ok(out)
}

/// Highest held-out accuracy wins. A later candidate must be strictly better to replace the
/// incumbent, so ties go to the one trained first.
pub fn select_best(evaluated: Vec<(TrainedModel, EvaluationReport)>) -> Option<(TrainedModel, EvaluationReport)> {
    evaluated
        .into_iter()
        .reduce(|best, next| if next.1.accuracy > best.1.accuracy { next } else { best })
}

/// Trains every candidate classifier and returns a bundle holding the one with the best
/// held-out accuracy (earliest candidate on ties).
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<ModelBundle> {
    if let Some(column) = dataset.first_missing(&FEATURE_COLUMNS) {
        return Err(Error::MissingColumn(column));
    }

    let labelled = label_records(&dataset.records, config.zero_revenue)?;
    let n = labelled.examples.len();
    if n < MIN_TRAINING_ROWS {
        return Err(Error::InsufficientData(format!(
            "{n} labelled rows, need at least {MIN_TRAINING_ROWS}"
        )));
    }

    let labels: Vec<Recommendation> = labelled.examples.iter().map(|e| e.label).collect();
    let encoder = LabelEncoder::fit(&labels);

    let (train_idx, test_idx) = train_test_split(n, config.test_fraction, config.seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(Error::InsufficientData(format!(
            "split of {n} rows at test fraction {} leaves an empty partition",
            config.test_fraction
        )));
    }

    let raw_train: Vec<Features> = train_idx.iter().map(|&i| labelled.examples[i].features).collect();
    let scaler = StandardScaler::fit(&raw_train);

    let to_samples = |indices: &[usize]| -> Result<Samples> {
        let mut samples = Samples::default();
        for &i in indices {
            let example = &labelled.examples[i];
            let class = encoder
                .encode(example.label)
                .ok_or_else(|| Error::InsufficientData(format!("label {} not encoded", example.label)))?;
            samples.push(scaler.transform(&example.features), class);
        }
        Ok(samples)
    };
    let train_set = to_samples(&train_idx)?;
    let test_set = to_samples(&test_idx)?;

    tracing::info!(
        dataset = %dataset.name,
        rows = n,
        dropped = labelled.dropped,
        train = train_set.len(),
        test = test_set.len(),
        classes = ?encoder.class_names(),
        "training classifiers"
    );

    let class_names = encoder.class_names();
    let mut evaluated = Vec::new();
    for mut model in TrainedModel::candidates(config.seed) {
        model.fit(&train_set, encoder.len())?;
        let predicted = model.predict(&test_set.x);
        let report = EvaluationReport::new(model.name(), &test_set.y, &predicted, &class_names);
        tracing::info!(classifier = model.name(), accuracy = report.accuracy, "evaluated");
        evaluated.push((model, report));
    }

    let evaluations: Vec<EvaluationReport> = evaluated.iter().map(|(_, r)| r.clone()).collect();
    let (classifier, best) = select_best(evaluated)
        .ok_or_else(|| Error::InsufficientData("no candidate classifiers".to_string()))?;

    tracing::info!(classifier = classifier.name(), accuracy = best.accuracy, "selected classifier");

    let metadata = TrainingMetadata {
        id: uuid::Uuid::new_v4(),
        trained_at: chrono::Utc::now(),
        dataset: dataset.name.clone(),
        seed: config.seed,
        test_fraction: config.test_fraction,
        zero_revenue: config.zero_revenue,
        rows_used: n,
        rows_dropped: labelled.dropped,
        train_rows: train_set.len(),
        test_rows: test_set.len(),
        selected: classifier.name().to_string(),
        accuracy: best.accuracy,
        evaluations,
    };

    Ok(ModelBundle {
        schema_version: BUNDLE_SCHEMA_VERSION,
        classifier,
        scaler,
        encoder,
        metadata,
    })
}
