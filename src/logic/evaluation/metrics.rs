use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::logic::model::Discriminator;

/// Confusion counts with the genuine user as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    /// Genuine accepted
    #[serde(rename = "TP")]
    pub tp: usize,
    /// Genuine rejected (false reject)
    #[serde(rename = "FN")]
    pub fn_: usize,
    /// Impostor accepted (false accept)
    #[serde(rename = "FP")]
    pub fp: usize,
    /// Impostor rejected
    #[serde(rename = "TN")]
    pub tn: usize,
}

impl ConfusionCounts {
    pub fn total(&self) -> usize {
        self.tp + self.fn_ + self.fp + self.tn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// False accept rate
    pub far: f64,
    /// False reject rate
    pub frr: f64,
    /// (FAR + FRR) / 2. An approximation, not a threshold-sweep crossing.
    pub eer: f64,
    pub confusion: ConfusionCounts,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl EvaluationMetrics {
    pub fn from_counts(confusion: ConfusionCounts) -> Self {
        let frr = ratio(confusion.fn_, confusion.tp + confusion.fn_);
        let far = ratio(confusion.fp, confusion.fp + confusion.tn);
        Self {
            accuracy: ratio(confusion.tp + confusion.tn, confusion.total()),
            far,
            frr,
            eer: (far + frr) / 2.0,
            confusion,
        }
    }
}

/// Classify the genuine test rows and the impostor rows (both already
/// normalized) and derive the rates.
pub fn evaluate(
    model: &dyn Discriminator,
    genuine: &Array2<f64>,
    impostors: &Array2<f64>,
) -> EvaluationMetrics {
    let mut counts = ConfusionCounts::default();

    for accepted in model.predict_batch(genuine) {
        if accepted {
            counts.tp += 1;
        } else {
            counts.fn_ += 1;
        }
    }
    for accepted in model.predict_batch(impostors) {
        if accepted {
            counts.fp += 1;
        } else {
            counts.tn += 1;
        }
    }

    EvaluationMetrics::from_counts(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayView1};

    /// Accepts rows whose first value is positive.
    struct SignModel;

    impl Discriminator for SignModel {
        fn predict(&self, row: ArrayView1<f64>) -> bool {
            row[0] > 0.0
        }

        fn predict_proba(&self, _row: ArrayView1<f64>) -> Option<f64> {
            None
        }
    }

    #[test]
    fn test_counts_and_rates() {
        let genuine = array![[1.0], [2.0], [-1.0], [3.0]];
        let impostors = array![[-1.0], [-2.0], [0.5], [-3.0], [-4.0]];

        let m = evaluate(&SignModel, &genuine, &impostors);
        assert_eq!(
            m.confusion,
            ConfusionCounts {
                tp: 3,
                fn_: 1,
                fp: 1,
                tn: 4
            }
        );
        assert_eq!(m.frr, 0.25);
        assert_eq!(m.far, 0.2);
        assert_eq!(m.accuracy, 7.0 / 9.0);
        assert!((m.eer - 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_empty_denominators_are_zero() {
        let m = EvaluationMetrics::from_counts(ConfusionCounts::default());
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.far, 0.0);
        assert_eq!(m.frr, 0.0);
        assert_eq!(m.eer, 0.0);

        let only_genuine = EvaluationMetrics::from_counts(ConfusionCounts {
            tp: 4,
            fn_: 0,
            fp: 0,
            tn: 0,
        });
        assert_eq!(only_genuine.far, 0.0);
        assert_eq!(only_genuine.accuracy, 1.0);
    }

    #[test]
    fn test_rates_bounded() {
        for tp in 0..4 {
            for fp in 0..4 {
                let m = EvaluationMetrics::from_counts(ConfusionCounts {
                    tp,
                    fn_: 3 - tp,
                    fp,
                    tn: 3 - fp,
                });
                for rate in [m.accuracy, m.far, m.frr, m.eer] {
                    assert!((0.0..=1.0).contains(&rate));
                }
                assert_eq!(m.accuracy, (tp + 3 - fp) as f64 / 6.0);
            }
        }
    }

    #[test]
    fn test_confusion_serializes_upper_case() {
        let json = serde_json::to_value(ConfusionCounts::default()).unwrap();
        assert!(json.get("TP").is_some());
        assert!(json.get("FN").is_some());
    }
}
