//! Plain-text console output for the worker subcommands.

use factsheet_core::aggregate::{AggregatedPeriod, ViewMode};
use factsheet_core::bundle::ModelBundle;
use factsheet_core::summary::format_amount;
use std::fmt::Write;

pub fn training_summary(bundle: &ModelBundle) -> String {
    let meta = &bundle.metadata;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "dataset {}: {} rows used, {} dropped (zero revenue: {}), {} train / {} test, seed {}",
        meta.dataset, meta.rows_used, meta.rows_dropped, meta.zero_revenue, meta.train_rows, meta.test_rows, meta.seed
    );
    out.push('\n');

    for evaluation in &meta.evaluations {
        out.push_str(&evaluation.render());
        out.push('\n');
    }

    out.push_str("accuracy comparison:\n");
    for evaluation in &meta.evaluations {
        let marker = if evaluation.classifier == meta.selected { "*" } else { " " };
        let _ = writeln!(out, "{marker} {:<20} {:.4}", evaluation.classifier, evaluation.accuracy);
    }
    let _ = writeln!(out, "selected: {} ({:.4})", meta.selected, meta.accuracy);
    out
}

pub fn aggregation_table(mode: ViewMode, rows: &[AggregatedPeriod]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>16} {:>16} {:>16}", mode.to_string(), "Revenue", "EBITDA", "Cost");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12} {:>16} {:>16} {:>16}",
            row.label,
            format_amount(row.revenue),
            format_amount(row.ebitda),
            format_amount(row.cost)
        );
    }
    out
}
