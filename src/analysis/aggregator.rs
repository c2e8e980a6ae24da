//! Online aggregation of per-batch analytic results.
//!
//! Each batch result is folded into an [`AggregateReport`] as it arrives.
//! Categorical confidences and the scalar mean use a two-point average by
//! default, so later batches weigh more than earlier ones. Frequencies are
//! summed.

use crate::models::{AnalyticKind, AnalyticResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// How repeated observations are averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Averaging {
    /// `(old + new) / 2` on every fold.
    #[default]
    Pairwise,
    /// True running mean over every observation.
    Arithmetic,
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("expected a {expected} result, got {found}")]
    KeyMismatch { expected: String, found: String },
}

impl AggregationError {
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        AggregationError::KeyMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Running statistics for one detected category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub count: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarRunning {
    pub mean: Option<f64>,
    /// Every folded value, in fold order.
    pub raw_values: Vec<f64>,
}

/// Cumulative report for one platform's run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub averaging: Averaging,
    pub categorical: BTreeMap<String, CategoryStat>,
    pub scalar: ScalarRunning,
    pub frequencies: BTreeMap<String, u64>,
    pub batches_folded: usize,
}

impl AggregateReport {
    pub fn new(averaging: Averaging) -> Self {
        Self {
            averaging,
            ..Self::default()
        }
    }

    /// Categories ordered by count, most frequent first.
    pub fn top_categories(&self, n: usize) -> Vec<(&String, &CategoryStat)> {
        let mut categories: Vec<_> = self.categorical.iter().collect();
        categories.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        categories.truncate(n);
        categories
    }

    /// Phrases ordered by count, most frequent first.
    pub fn top_phrases(&self, n: usize) -> Vec<(&String, u64)> {
        let mut phrases: Vec<_> = self.frequencies.iter().map(|(p, c)| (p, *c)).collect();
        phrases.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        phrases.truncate(n);
        phrases
    }
}

/// Two-point average.
pub fn pairwise_mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Fold one batch result into `report`.
///
/// `expected` is the kind the batch was submitted for; a result of any other
/// shape means the endpoint answered something else, and nothing is folded.
pub fn fold(
    report: &mut AggregateReport,
    expected: AnalyticKind,
    result: AnalyticResult,
) -> Result<(), AggregationError> {
    let found = result.kind();
    if found != expected {
        return Err(AggregationError::mismatch(expected.to_string(), found.to_string()));
    }

    let averaging = report.averaging;
    match result {
        AnalyticResult::Categorical(detections) => {
            for detection in detections {
                match report.categorical.get_mut(&detection.name) {
                    None => {
                        report.categorical.insert(
                            detection.name,
                            CategoryStat {
                                count: 1,
                                confidence: detection.confidence,
                            },
                        );
                    }
                    Some(stat) => {
                        stat.count += 1;
                        stat.confidence = match averaging {
                            Averaging::Pairwise => pairwise_mean(stat.confidence, detection.confidence),
                            Averaging::Arithmetic => {
                                stat.confidence + (detection.confidence - stat.confidence) / stat.count as f64
                            }
                        };
                    }
                }
            }
        }
        AnalyticResult::Scalar(value) => {
            let scalar = &mut report.scalar;
            scalar.raw_values.push(value);
            scalar.mean = Some(match (scalar.mean, averaging) {
                (None, _) => value,
                (Some(mean), Averaging::Pairwise) => pairwise_mean(mean, value),
                (Some(mean), Averaging::Arithmetic) => {
                    mean + (value - mean) / scalar.raw_values.len() as f64
                }
            });
        }
        AnalyticResult::Frequencies(phrases) => {
            for (phrase, count) in phrases {
                *report.frequencies.entry(phrase).or_default() += count;
            }
        }
    }

    report.batches_folded += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Detection;

    fn detection(name: &str, confidence: f64) -> Detection {
        Detection {
            name: name.to_string(),
            confidence,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn fold_scalars(averaging: Averaging, values: &[f64]) -> AggregateReport {
        let mut report = AggregateReport::new(averaging);
        for value in values {
            fold(&mut report, AnalyticKind::Sentiment, AnalyticResult::Scalar(*value)).unwrap();
        }
        report
    }

    #[test]
    fn test_pairwise_scalar_mean_favours_recent_values() {
        let report = fold_scalars(Averaging::Pairwise, &[0.2, 0.8]);
        assert_close(report.scalar.mean.unwrap(), 0.5);

        let report = fold_scalars(Averaging::Pairwise, &[0.2, 0.8, 0.8]);
        assert_close(report.scalar.mean.unwrap(), 0.65);
        assert_eq!(report.scalar.raw_values, vec![0.2, 0.8, 0.8]);
        assert_eq!(report.batches_folded, 3);
    }

    #[test]
    fn test_arithmetic_scalar_mean() {
        let report = fold_scalars(Averaging::Arithmetic, &[0.2, 0.8, 0.8]);
        assert_close(report.scalar.mean.unwrap(), 0.6);
    }

    #[test]
    fn test_empty_report_has_no_mean() {
        let report = AggregateReport::default();
        assert_eq!(report.scalar.mean, None);
        assert_eq!(report.averaging, Averaging::Pairwise);
    }

    #[test]
    fn test_categorical_fold() {
        let mut report = AggregateReport::default();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![detection("English", 1.0), detection("French", 0.4)]),
        )
        .unwrap();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![detection("English", 0.5)]),
        )
        .unwrap();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![detection("English", 0.25)]),
        )
        .unwrap();

        let english = &report.categorical["English"];
        assert_eq!(english.count, 3);
        // (1.0 + 0.5) / 2 = 0.75, then (0.75 + 0.25) / 2
        assert_close(english.confidence, 0.5);
        assert_eq!(report.categorical["French"].count, 1);
        assert_close(report.categorical["French"].confidence, 0.4);
    }

    #[test]
    fn test_repeated_name_in_one_batch_folds_per_detection() {
        let mut report = AggregateReport::default();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![detection("English", 0.0)]),
        )
        .unwrap();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![detection("English", 1.0), detection("English", 0.5)]),
        )
        .unwrap();

        let english = &report.categorical["English"];
        assert_eq!(english.count, 3);
        // (0.0 + 1.0) / 2 = 0.5, then (0.5 + 0.5) / 2
        assert_close(english.confidence, 0.5);
        assert_eq!(report.batches_folded, 2);
    }

    #[test]
    fn test_categorical_arithmetic_mean() {
        let mut report = AggregateReport::new(Averaging::Arithmetic);
        for confidence in [1.0, 0.5, 0.25] {
            fold(
                &mut report,
                AnalyticKind::Languages,
                AnalyticResult::Categorical(vec![detection("English", confidence)]),
            )
            .unwrap();
        }
        assert_close(report.categorical["English"].confidence, 1.75 / 3.0);
    }

    #[test]
    fn test_frequencies_add() {
        let mut report = AggregateReport::default();
        let first = BTreeMap::from([("rust".to_string(), 2), ("async".to_string(), 1)]);
        let second = BTreeMap::from([("rust".to_string(), 3)]);

        fold(&mut report, AnalyticKind::KeyPhrases, AnalyticResult::Frequencies(first)).unwrap();
        fold(&mut report, AnalyticKind::KeyPhrases, AnalyticResult::Frequencies(second)).unwrap();

        assert_eq!(report.frequencies["rust"], 5);
        assert_eq!(report.frequencies["async"], 1);
        assert_eq!(report.top_phrases(1), vec![(&"rust".to_string(), 5)]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut report = AggregateReport::default();
        let err = fold(&mut report, AnalyticKind::Languages, AnalyticResult::Scalar(0.3)).unwrap_err();

        assert_eq!(
            err,
            AggregationError::KeyMismatch {
                expected: "languages".to_string(),
                found: "sentiment".to_string(),
            }
        );
        assert_eq!(report, AggregateReport::default());
    }

    #[test]
    fn test_top_categories_order() {
        let mut report = AggregateReport::default();
        fold(
            &mut report,
            AnalyticKind::Languages,
            AnalyticResult::Categorical(vec![
                detection("German", 0.9),
                detection("English", 0.9),
                detection("English", 0.8),
            ]),
        )
        .unwrap();

        let top = report.top_categories(5);
        assert_eq!(top[0].0, "English");
        assert_eq!(top[1].0, "German");
    }

    #[test]
    fn test_averaging_from_config_string() {
        let averaging: Averaging = serde_json::from_str("\"arithmetic\"").unwrap();
        assert_eq!(averaging, Averaging::Arithmetic);
    }
}
