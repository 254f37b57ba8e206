use crate::domain::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

/// Label <-> class id mapping. Classes are kept in lexical order of their names, so the
/// mapping depends only on which labels occur, never on row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<Recommendation>,
}

impl LabelEncoder {
    pub fn fit(labels: &[Recommendation]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_by_key(|l| l.as_str());
        classes.dedup();
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: Recommendation) -> Option<usize> {
        self.classes.iter().position(|c| *c == label)
    }

    pub fn decode(&self, id: usize) -> Option<Recommendation> {
        self.classes.get(id).copied()
    }

    pub fn class_names(&self) -> Vec<&'static str> {
        self.classes.iter().map(|c| c.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Recommendation::*;

    #[test]
    fn orders_classes_lexically() {
        let enc = LabelEncoder::fit(&[Invest, Hold, Divest, Invest]);
        assert_eq!(enc.class_names(), vec!["Divest", "Hold", "Invest"]);
        assert_eq!(enc.encode(Divest), Some(0));
        assert_eq!(enc.encode(Invest), Some(2));
        assert_eq!(enc.decode(1), Some(Hold));
        assert_eq!(enc.decode(3), None);
    }

    #[test]
    fn only_observed_labels_are_encoded() {
        let enc = LabelEncoder::fit(&[Invest, Divest]);
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.encode(Hold), None);
        assert_eq!(enc.decode(1), Some(Invest));
    }
}
