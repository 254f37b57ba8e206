use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    Invest,
    Hold,
    Divest,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Invest => "Invest",
            Recommendation::Hold => "Hold",
            Recommendation::Divest => "Divest",
        }
    }

    /// Label for an EBITDA margin. First matching rule wins.
    pub fn from_margin(margin: f64) -> Self {
        MARGIN_RULES
            .iter()
            .find(|rule| rule.matches(margin))
            .map(|rule| rule.label)
            .unwrap_or(Recommendation::Divest)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Invest" => Ok(Recommendation::Invest),
            "Hold" => Ok(Recommendation::Hold),
            "Divest" => Ok(Recommendation::Divest),
            other => Err(format!("unknown recommendation label: {other:?}")),
        }
    }
}

pub const INVEST_FROM: f64 = 0.30;
pub const HOLD_FROM: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
enum Bound {
    /// margin >= x
    AtLeast(f64),
    Any,
}

#[derive(Debug, Clone, Copy)]
struct MarginRule {
    bound: Bound,
    label: Recommendation,
}

impl MarginRule {
    fn matches(&self, margin: f64) -> bool {
        match self.bound {
            Bound::AtLeast(x) => margin >= x,
            Bound::Any => true,
        }
    }
}

// Both boundaries belong to the upper band: 0.30 is Invest, 0.15 is Hold.
const MARGIN_RULES: [MarginRule; 3] = [
    MarginRule {
        bound: Bound::AtLeast(INVEST_FROM),
        label: Recommendation::Invest,
    },
    MarginRule {
        bound: Bound::AtLeast(HOLD_FROM),
        label: Recommendation::Hold,
    },
    MarginRule {
        bound: Bound::Any,
        label: Recommendation::Divest,
    },
];
