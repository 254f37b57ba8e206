use crate::domain::record::{Column, Dataset, FinancialRecord, Month};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const FALLBACK_YEAR: i32 = 2023;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Cumulative January..=M, compared across years.
    Ytd,
    /// Month M only, compared across years.
    Yoy,
    /// Every month of year Y, in calendar order.
    Monthly,
}

impl ViewMode {
    fn required_columns(self) -> &'static [Column] {
        &[
            Column::Year,
            Column::Month,
            Column::Revenue,
            Column::Ebitda,
            Column::Cost,
        ]
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Ytd => "YTD",
            ViewMode::Yoy => "YOY",
            ViewMode::Monthly => "Monthly",
        })
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ytd" => Ok(ViewMode::Ytd),
            "yoy" => Ok(ViewMode::Yoy),
            // "yearly" is what the dashboard sends for the per-month view of one year.
            "monthly" | "yearly" => Ok(ViewMode::Monthly),
            other => Err(format!("unknown view mode: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKey {
    Year(i32),
    Month(Month),
}

impl PeriodKey {
    /// Chart label; years never carry a decimal part.
    pub fn label(&self) -> String {
        match self {
            PeriodKey::Year(y) => y.to_string(),
            PeriodKey::Month(m) => m.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPeriod {
    pub key: PeriodKey,
    pub label: String,
    pub revenue: f64,
    pub ebitda: f64,
    pub cost: f64,
}

impl AggregatedPeriod {
    fn new(key: PeriodKey) -> Self {
        Self {
            label: key.label(),
            key,
            revenue: 0.0,
            ebitda: 0.0,
            cost: 0.0,
        }
    }

    fn add(&mut self, record: &FinancialRecord) {
        self.revenue += record.revenue;
        self.ebitda += record.ebitda;
        self.cost += record.cost;
    }
}

/// Group `records` for charting. Rows come back sorted by key ascending.
///
/// `selector` is a month name for YTD/YOY and a year for Monthly. A selector outside
/// that domain, or one that matches nothing, yields an empty result.
pub fn aggregate(records: &[FinancialRecord], mode: ViewMode, selector: &str) -> Vec<AggregatedPeriod> {
    match mode {
        ViewMode::Ytd | ViewMode::Yoy => {
            let Ok(month) = selector.parse::<Month>() else {
                log_invalid_selector(mode, selector);
                return Vec::new();
            };
            let keep = |m: Month| match mode {
                ViewMode::Ytd => m.index() <= month.index(),
                _ => m == month,
            };

            let mut by_year: BTreeMap<i32, AggregatedPeriod> = BTreeMap::new();
            for record in records {
                let Some(m) = record.month else { continue };
                if !keep(m) {
                    continue;
                }
                by_year
                    .entry(record.year)
                    .or_insert_with(|| AggregatedPeriod::new(PeriodKey::Year(record.year)))
                    .add(record);
            }
            by_year.into_values().collect()
        }
        ViewMode::Monthly => {
            let Ok(year) = selector.trim().parse::<i32>() else {
                log_invalid_selector(mode, selector);
                return Vec::new();
            };

            let mut rows: Vec<(Month, &FinancialRecord)> = records
                .iter()
                .filter(|r| r.year == year)
                .filter_map(|r| r.month.map(|m| (m, r)))
                .collect();
            rows.sort_by_key(|(m, _)| *m);

            rows.into_iter()
                .map(|(m, r)| {
                    let mut row = AggregatedPeriod::new(PeriodKey::Month(m));
                    row.add(r);
                    row
                })
                .collect()
        }
    }
}

/// Like [`aggregate`], but degrades to an empty result when the dataset lacks a column
/// the view needs.
pub fn aggregate_dataset(dataset: &Dataset, mode: ViewMode, selector: &str) -> Vec<AggregatedPeriod> {
    if let Some(column) = dataset.first_missing(mode.required_columns()) {
        let err = Error::MissingColumn(column);
        tracing::warn!(dataset = %dataset.name, %mode, error = %err, "aggregation skipped");
        return Vec::new();
    }
    aggregate(&dataset.records, mode, selector)
}

fn log_invalid_selector(mode: ViewMode, selector: &str) {
    let err = Error::InvalidPeriodSelector(selector.to_string());
    tracing::debug!(%mode, error = %err, "empty aggregation");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOptions {
    pub options: Vec<String>,
    pub default: String,
}

/// Selector values offered for a view mode. Monthly falls back to [`FALLBACK_YEAR`] when
/// the dataset has no `Year` column or no records.
pub fn period_options(dataset: &Dataset, mode: ViewMode) -> PeriodOptions {
    match mode {
        ViewMode::Ytd | ViewMode::Yoy => PeriodOptions {
            options: Month::ALL.iter().map(|m| m.name().to_string()).collect(),
            default: Month::January.name().to_string(),
        },
        ViewMode::Monthly => {
            let mut years = if dataset.has(Column::Year) {
                dataset.years()
            } else {
                Vec::new()
            };
            if years.is_empty() {
                years.push(FALLBACK_YEAR);
            }
            let default = years.last().copied().unwrap_or(FALLBACK_YEAR).to_string();
            PeriodOptions {
                options: years.iter().map(|y| y.to_string()).collect(),
                default,
            }
        }
    }
}
