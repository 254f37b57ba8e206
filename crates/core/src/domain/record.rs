use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Calendar index, January = 1.
    pub fn index(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown month name: {0:?}")]
pub struct UnknownMonth(pub String);

impl FromStr for Month {
    type Err = UnknownMonth;

    /// Only the canonical full names ("January" .. "December") parse; surrounding
    /// whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Month::ALL
            .into_iter()
            .find(|m| m.name() == needle)
            .ok_or_else(|| UnknownMonth(s.to_string()))
    }
}

/// Dataset columns the system understands. Header matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    Year,
    Month,
    Revenue,
    NetIncome,
    Ebitda,
    Cost,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Year,
        Column::Month,
        Column::Revenue,
        Column::NetIncome,
        Column::Ebitda,
        Column::Cost,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Year => "Year",
            Column::Month => "Month",
            Column::Revenue => "Revenue",
            Column::NetIncome => "Net Income",
            Column::Ebitda => "EBITDA",
            Column::Cost => "Cost",
        }
    }

    pub fn from_header(h: &str) -> Option<Self> {
        let h = h.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.header().eq_ignore_ascii_case(h))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub year: i32,
    /// `None` only when the dataset has no `Month` column.
    pub month: Option<Month>,
    pub revenue: f64,
    pub net_income: f64,
    pub ebitda: f64,
    pub cost: f64,
}

impl FinancialRecord {
    pub fn new(year: i32, month: Month, revenue: f64, net_income: f64, ebitda: f64, cost: f64) -> Self {
        Self {
            year,
            month: Some(month),
            revenue,
            net_income,
            ebitda,
            cost,
        }
    }

    pub fn metric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Revenue => Some(self.revenue),
            Column::NetIncome => Some(self.net_income),
            Column::Ebitda => Some(self.ebitda),
            Column::Cost => Some(self.cost),
            Column::Year | Column::Month => None,
        }
    }

    /// Label used for table headers: "March 2024", or "2024" without a month.
    pub fn period_label(&self) -> String {
        match self.month {
            Some(m) => format!("{m} {}", self.year),
            None => self.year.to_string(),
        }
    }
}

/// A loaded company table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: BTreeSet<Column>,
    pub records: Vec<FinancialRecord>,
}

impl Dataset {
    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// First column of `required` that the dataset lacks.
    pub fn first_missing(&self, required: &[Column]) -> Option<Column> {
        required.iter().copied().find(|c| !self.has(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the highest (year, month); ties keep the later row.
    pub fn latest(&self) -> Option<&FinancialRecord> {
        self.records
            .iter()
            .max_by_key(|r| (r.year, r.month.map(Month::index).unwrap_or(0)))
    }

    pub fn years(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.records.iter().map(|r| r.year).collect();
        set.into_iter().collect()
    }
}
