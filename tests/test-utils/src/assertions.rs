//! Custom assertions and brute-force reference statistics

use pretty_assertions::assert_eq;
use services_common::{Amount, TransactionRecord};

/// Assert that two floating point values are approximately equal
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    let diff = (left - right).abs();
    assert!(
        diff <= tolerance,
        "Values not approximately equal: {} != {} (diff: {}, tolerance: {})",
        left,
        right,
        diff,
        tolerance
    );
}

/// Reference aggregates recomputed from scratch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedStatistics {
    pub count: u64,
    pub sum: i128,
    pub min: Option<Amount>,
    pub max: Option<Amount>,
    pub average: Option<Amount>,
    pub top_ids: Vec<String>,
}

/// Statistics over `records` taken in order, keeping the first of any repeated id
pub fn expected_statistics(records: &[TransactionRecord], k: usize) -> ExpectedStatistics {
    let mut seen = std::collections::HashSet::new();
    let distinct: Vec<&TransactionRecord> = records
        .iter()
        .filter(|r| seen.insert(r.transaction_id().as_str().to_string()))
        .collect();

    let count = distinct.len() as u64;
    let sum: i128 = distinct.iter().map(|r| i128::from(r.amount().as_i64())).sum();

    // Stable sort keeps insertion order among equal amounts
    let mut ranked = distinct.clone();
    ranked.sort_by(|a, b| b.amount().cmp(&a.amount()));

    ExpectedStatistics {
        count,
        sum,
        min: distinct.iter().map(|r| r.amount()).min(),
        max: distinct.iter().map(|r| r.amount()).max(),
        average: Amount::mean(sum, count),
        top_ids: ranked
            .iter()
            .take(k)
            .map(|r| r.transaction_id().as_str().to_string())
            .collect(),
    }
}

/// Assert that `top` lists the ids a full sort would pick
pub fn assert_top_k_matches(records: &[TransactionRecord], top: &[TransactionRecord], k: usize) {
    let expected = expected_statistics(records, k).top_ids;
    let actual: Vec<String> = top
        .iter()
        .map(|r| r.transaction_id().as_str().to_string())
        .collect();
    assert_eq!(actual, expected);
}

/// Assert that amounts never increase along `top`
pub fn assert_sorted_desc(top: &[TransactionRecord]) {
    for window in top.windows(2) {
        assert!(
            window[0].amount() >= window[1].amount(),
            "Top transactions not descending: {} < {}",
            window[0].amount(),
            window[1].amount()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::factories::TransactionFactory;

    #[test]
    fn test_expected_statistics_ties() {
        let records = TransactionFactory::new().records(&[10.0, 50.0, 5.0, 80.0, 80.0, 30.0]);
        let expected = expected_statistics(&records, 3);
        assert_eq!(expected.count, 6);
        assert_eq!(expected.sum, 255 * 10_000);
        assert_eq!(expected.min, Some(Amount::from_f64(5.0)));
        assert_eq!(expected.max, Some(Amount::from_f64(80.0)));
        assert_eq!(expected.top_ids, vec!["tx-3", "tx-4", "tx-1"]);
    }

    #[test]
    fn test_expected_statistics_skips_repeated_ids() {
        let factory = TransactionFactory::new();
        let records = vec![
            factory.record_with_id("a", 10.0),
            factory.record_with_id("a", 500.0),
        ];
        let expected = expected_statistics(&records, 3);
        assert_eq!(expected.count, 1);
        assert_eq!(expected.top_ids, vec!["a"]);
    }
}
