use serde::{Deserialize, Serialize};

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// `matrix[true][predicted]` counts.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub classifier: String,
    pub accuracy: f64,
    pub classes: Vec<ClassReport>,
    pub confusion: Vec<Vec<usize>>,
}

impl EvaluationReport {
    pub fn new(classifier: &str, y_true: &[usize], y_pred: &[usize], class_names: &[&str]) -> Self {
        let confusion = confusion_matrix(y_true, y_pred, class_names.len());

        let classes = class_names
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let tp = confusion[c][c];
                let predicted: usize = confusion.iter().map(|row| row[c]).sum();
                let support: usize = confusion[c].iter().sum();

                // Undefined ratios (no predictions / no support) report as 0.
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };

                ClassReport {
                    label: name.to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            classifier: classifier.to_string(),
            accuracy: accuracy(y_true, y_pred),
            classes,
            confusion,
        }
    }

    /// Plain-text rendering in the usual classification-report layout.
    pub fn render(&self) -> String {
        let mut out = format!("--- {} ---\naccuracy: {:.4}\n", self.classifier, self.accuracy);
        out.push_str(&format!(
            "{:>12} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        for c in &self.classes {
            out.push_str(&format!(
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                c.label, c.precision, c.recall, c.f1, c.support
            ));
        }
        out.push_str("confusion (rows = true, cols = predicted):\n");
        for row in &self.confusion {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:>6}")).collect();
            out.push_str(&cells.join(""));
            out.push('\n');
        }
        out
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
