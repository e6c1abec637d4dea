use crate::metrics::PerformanceMetrics;
use serde::Serialize;
use std::cmp::Ordering;

/// Stand-ins for averages that could not be computed.
const MISSING_RATIO: f64 = 0.0;
const MISSING_LEAKAGE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Improvement,
    Regression,
    Unchanged,
}

impl Vote {
    /// Votes on a signal where larger is better.
    fn higher_is_better(before: f64, after: f64) -> Self {
        match after.partial_cmp(&before) {
            Some(Ordering::Greater) => Vote::Improvement,
            Some(Ordering::Less) => Vote::Regression,
            _ => Vote::Unchanged,
        }
    }
}

/// Majority vote over ON/OFF ratio, leakage and score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub on_off_ratio: Vote,
    pub leakage: Vote,
    pub score: Vote,
    pub improvements: usize,
    pub regressions: usize,
    /// Strictly more improvements than regressions. Ties are not improvements.
    pub improved: bool,
}

pub fn compare(previous: &PerformanceMetrics, current: &PerformanceMetrics) -> Comparison {
    let ratio = Vote::higher_is_better(
        previous.average_on_off_ratio.unwrap_or(MISSING_RATIO),
        current.average_on_off_ratio.unwrap_or(MISSING_RATIO),
    );
    // Lower leakage is better: compare negated values.
    let leakage = Vote::higher_is_better(
        -previous.average_leakage.unwrap_or(MISSING_LEAKAGE),
        -current.average_leakage.unwrap_or(MISSING_LEAKAGE),
    );
    let score = Vote::higher_is_better(previous.overall_score, current.overall_score);

    let votes = [ratio, leakage, score];
    let improvements = votes.iter().filter(|v| **v == Vote::Improvement).count();
    let regressions = votes.iter().filter(|v| **v == Vote::Regression).count();

    Comparison {
        on_off_ratio: ratio,
        leakage,
        score,
        improvements,
        regressions,
        improved: improvements > regressions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn metrics(ratio: Option<f64>, leakage: Option<f64>, score: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            overall_score: score,
            average_on_off_ratio: ratio,
            average_leakage: leakage,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(metrics(Some(20.0), Some(5.0), 1.0), true)]
    #[case(metrics(Some(20.0), Some(20.0), 0.5), false)]
    // One up, one down, one flat
    #[case(metrics(Some(20.0), Some(20.0), 1.0), false)]
    #[case(metrics(Some(10.0), Some(10.0), 1.0), false)]
    #[case(metrics(Some(10.0), Some(9.0), 1.0), true)]
    fn test_majority_vote(#[case] current: PerformanceMetrics, #[case] expected: bool) {
        let previous = metrics(Some(10.0), Some(10.0), 1.0);
        assert_eq!(compare(&previous, &current).improved, expected);
    }

    #[test]
    fn test_missing_averages_use_pessimistic_defaults() {
        let previous = metrics(None, None, 1.0);
        let current = metrics(Some(1.0), Some(99.0), 1.0);
        let c = compare(&previous, &current);
        assert_eq!(c.on_off_ratio, Vote::Improvement);
        assert_eq!(c.leakage, Vote::Improvement);
        assert!(c.improved);
    }
}
