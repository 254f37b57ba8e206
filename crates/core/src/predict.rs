use crate::bundle::ModelBundle;
use crate::domain::{Dataset, FinancialRecord, Recommendation};
use crate::error::{Error, Result};
use crate::model::FEATURE_NAMES;
use crate::train::FEATURE_COLUMNS;
use serde::{Deserialize, Serialize};

/// One inference input. Fields are optional so that an absent value is reported instead of
/// being defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(default, alias = "Revenue")]
    pub revenue: Option<f64>,
    #[serde(default, alias = "Net Income", alias = "netIncome")]
    pub net_income: Option<f64>,
    #[serde(default, alias = "EBITDA")]
    pub ebitda: Option<f64>,
}

impl FeatureRow {
    pub fn new(revenue: f64, net_income: f64, ebitda: f64) -> Self {
        Self {
            revenue: Some(revenue),
            net_income: Some(net_income),
            ebitda: Some(ebitda),
        }
    }

    fn features(&self) -> Result<[f64; 3]> {
        let values = [self.revenue, self.net_income, self.ebitda];
        let mut out = [0.0; 3];
        for (i, value) in values.into_iter().enumerate() {
            out[i] = value
                .filter(|v| v.is_finite())
                .ok_or(Error::MissingFeature(FEATURE_NAMES[i]))?;
        }
        Ok(out)
    }

    /// Features of a record read from `dataset`. A column the source file did not carry
    /// stays `None`, so prediction reports it instead of scoring the ingest placeholder.
    pub fn from_dataset_record(dataset: &Dataset, record: &FinancialRecord) -> Self {
        let [revenue, net_income, ebitda] =
            FEATURE_COLUMNS.map(|column| record.metric(column).filter(|_| dataset.has(column)));
        Self {
            revenue,
            net_income,
            ebitda,
        }
    }
}

pub fn predict(bundle: &ModelBundle, row: &FeatureRow) -> Result<Recommendation> {
    let features = row.features()?;
    bundle.predict(&features)
}

/// Predicts only the first row of a batch; an empty batch has no features to use.
pub fn predict_first(bundle: &ModelBundle, rows: &[FeatureRow]) -> Result<Recommendation> {
    let row = rows.first().ok_or(Error::MissingFeature(FEATURE_NAMES[0]))?;
    if rows.len() > 1 {
        tracing::debug!(ignored = rows.len() - 1, "predicting first row only");
    }
    predict(bundle, row)
}
