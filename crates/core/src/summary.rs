//! Metric-by-period table of the most recent records, as shown on the introduction tab.

use crate::domain::record::{Column, Dataset};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_ROWS: usize = 12;

const METRIC_ORDER: [Column; 4] = [Column::Revenue, Column::Cost, Column::Ebitda, Column::NetIncome];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    /// One header per record, e.g. "March 2024".
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub metric: String,
    pub values: Vec<String>,
}

/// Transpose the last `n` records (file order) into one row per present metric.
pub fn recent_table(dataset: &Dataset, n: usize) -> SummaryTable {
    let start = dataset.records.len().saturating_sub(n);
    let recent = &dataset.records[start..];

    let columns = recent.iter().map(|r| r.period_label()).collect();
    let rows = METRIC_ORDER
        .iter()
        .filter(|c| dataset.has(**c))
        .map(|&column| SummaryRow {
            metric: column.header().to_string(),
            values: recent
                .iter()
                .filter_map(|r| r.metric(column))
                .map(format_amount)
                .collect(),
        })
        .collect();

    SummaryTable { columns, rows }
}

/// Whole units with thousands separators; negatives in parentheses.
pub fn format_amount(x: f64) -> String {
    let rounded = x.round();
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("({grouped})")
    } else {
        grouped
    }
}
