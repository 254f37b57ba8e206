use crate::domain::record::{Column, Dataset, FinancialRecord, Month};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

/// Load a company table from a CSV file. The dataset is named after the file stem.
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dataset = read_csv(&name, file)?;

    tracing::debug!(
        path = %path.display(),
        rows = dataset.records.len(),
        columns = ?dataset.columns,
        "dataset loaded"
    );
    Ok(dataset)
}

/// Parse CSV text with a header row. Unknown columns are ignored; absent known columns
/// are left out of `Dataset::columns` and their values default to zero.
pub fn read_csv<R: Read>(name: &str, reader: R) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut positions: BTreeMap<Column, usize> = BTreeMap::new();
    for (idx, header) in rdr.headers()?.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            positions.entry(column).or_insert(idx);
        }
    }

    let mut records = Vec::new();
    let mut seen: HashSet<(i32, Option<Month>)> = HashSet::new();
    for (idx, row) in rdr.records().enumerate() {
        let row_no = idx + 1;
        let row = row?;
        let cell = |column: Column| positions.get(&column).map(|&i| row.get(i).unwrap_or(""));

        let year = match cell(Column::Year) {
            Some(s) => parse_year(s).map_err(|detail| Error::InvalidRecord { row: row_no, detail })?,
            None => 0,
        };
        let month = match cell(Column::Month) {
            Some(s) => Some(s.parse::<Month>().map_err(|e| Error::InvalidRecord {
                row: row_no,
                detail: e.to_string(),
            })?),
            None => None,
        };
        let metric = |column: Column| -> Result<f64> {
            match cell(column) {
                Some(s) => parse_amount(s).map_err(|detail| Error::InvalidRecord {
                    row: row_no,
                    detail: format!("{column}: {detail}"),
                }),
                None => Ok(0.0),
            }
        };

        let record = FinancialRecord {
            year,
            month,
            revenue: metric(Column::Revenue)?,
            net_income: metric(Column::NetIncome)?,
            ebitda: metric(Column::Ebitda)?,
            cost: metric(Column::Cost)?,
        };

        if month.is_some() && !seen.insert((year, month)) {
            tracing::warn!(dataset = name, year, month = ?month, row = row_no, "duplicate (year, month) record");
        }
        records.push(record);
    }

    let columns: BTreeSet<Column> = positions.into_keys().collect();
    Ok(Dataset {
        name: name.to_string(),
        columns,
        records,
    })
}

fn parse_year(s: &str) -> std::result::Result<i32, String> {
    if let Ok(y) = s.parse::<i32>() {
        return Ok(y);
    }
    // Spreadsheet exports sometimes write years as floats ("2024.0").
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i32::MAX as f64 => Ok(f as i32),
        _ => Err(format!("Year: not a whole number: {s:?}")),
    }
}

fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let v = cleaned
        .parse::<f64>()
        .map_err(|_| format!("not a number: {s:?}"))?;
    if !v.is_finite() {
        return Err(format!("not a finite number: {s:?}"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Year,Month,Revenue,Net Income,EBITDA,Cost,Year-Month
2023,January,100,5,10,50,2023-01
2023,February,200,8,20,80,2023-02
2024.0, March ,\"1,500\",-3.5,40,90,2024-03
";

    #[test]
    fn parses_known_columns_and_ignores_extras() {
        let ds = read_csv("Acme", SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.name, "Acme");
        assert_eq!(ds.columns.len(), 6);
        assert_eq!(ds.records.len(), 3);

        let r = &ds.records[2];
        assert_eq!(r.year, 2024);
        assert_eq!(r.month, Some(Month::March));
        assert_eq!(r.revenue, 1500.0);
        assert_eq!(r.net_income, -3.5);
    }

    #[test]
    fn missing_columns_are_recorded_not_fatal() {
        let csv = "Year,Revenue,EBITDA\n2023,100,10\n";
        let ds = read_csv("NoMonth", csv.as_bytes()).unwrap();
        assert!(!ds.has(Column::Month));
        assert!(!ds.has(Column::Cost));
        assert_eq!(ds.records[0].month, None);
        assert_eq!(ds.records[0].cost, 0.0);
        assert_eq!(
            ds.first_missing(&[Column::Year, Column::Month, Column::Cost]),
            Some(Column::Month)
        );
    }

    #[test]
    fn abbreviated_or_lowercase_months_are_data_errors() {
        for month in ["Mar", "march"] {
            let csv = format!("Year,Month,Revenue\n2023,{month},1\n");
            assert!(matches!(
                read_csv("Loose", csv.as_bytes()),
                Err(Error::InvalidRecord { row: 1, .. })
            ));
        }
    }

    #[test]
    fn rejects_foreign_month_with_row_number() {
        let csv = "Year,Month,Revenue\n2023,January,1\n2023,Smarch,2\n";
        let err = read_csv("Bad", csv.as_bytes()).unwrap_err();
        match err {
            Error::InvalidRecord { row, .. } => assert_eq!(row, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_numeric_amounts() {
        let csv = "Year,Month,Revenue\n2023,January,abc\n";
        assert!(matches!(
            read_csv("Bad", csv.as_bytes()),
            Err(Error::InvalidRecord { row: 1, .. })
        ));

        let csv = "Year,Month,Revenue\n2023,January,inf\n";
        assert!(read_csv("Bad", csv.as_bytes()).is_err());
    }

    #[test]
    fn keeps_duplicate_periods() {
        let csv = "Year,Month,Revenue\n2023,May,1\n2023,May,2\n";
        let ds = read_csv("Dup", csv.as_bytes()).unwrap();
        assert_eq!(ds.records.len(), 2);
    }

    #[test]
    fn loads_from_file_using_stem_as_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Globex.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let ds = load_csv(&path).unwrap();
        assert_eq!(ds.name, "Globex");
        assert_eq!(ds.records.len(), 3);
    }
}
