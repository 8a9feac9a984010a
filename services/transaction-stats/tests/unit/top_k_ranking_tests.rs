//! Top-K ranking against a full sort

use proptest::prelude::*;
use rstest::*;
use services_common::TransactionRecord;
use test_utils::{
    TransactionFactory, api_records, assert_sorted_desc, assert_top_k_matches, factory,
    tied_records,
};
use transaction_stats::{StatisticsEngine, StatsResult};

fn top_ids(engine: &StatisticsEngine) -> StatsResult<Vec<String>> {
    Ok(engine
        .snapshot()?
        .top_k
        .iter()
        .map(|r| r.transaction_id().as_str().to_string())
        .collect())
}

#[rstest]
fn test_ties_keep_earlier_insertion(tied_records: Vec<TransactionRecord>) -> StatsResult<()> {
    let engine = StatisticsEngine::new(3);
    for record in &tied_records {
        engine.apply_insert(record.clone())?;
    }
    assert_eq!(top_ids(&engine)?, vec!["tx-3", "tx-4", "tx-1"]);
    Ok(())
}

#[rstest]
fn test_api_records_rank(api_records: Vec<TransactionRecord>) -> StatsResult<()> {
    let engine = StatisticsEngine::new(3);
    for record in &api_records {
        engine.apply_insert(record.clone())?;
    }
    assert_eq!(top_ids(&engine)?, vec!["test2", "test3", "test1"]);
    Ok(())
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
#[case(10)]
fn test_top_k_never_exceeds_capacity(factory: TransactionFactory, #[case] k: usize) -> StatsResult<()> {
    let engine = StatisticsEngine::new(k);
    let records = factory.records(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
    for (applied, record) in records.iter().enumerate() {
        engine.apply_insert(record.clone())?;
        let snapshot = engine.snapshot()?;
        assert_eq!(snapshot.top_k.len(), k.min(applied + 1));
    }
    Ok(())
}

#[rstest]
fn test_equal_amount_does_not_displace(factory: TransactionFactory) -> StatsResult<()> {
    let engine = StatisticsEngine::new(2);
    engine.apply_insert(factory.record_with_id("a", 50.0))?;
    engine.apply_insert(factory.record_with_id("b", 50.0))?;
    engine.apply_insert(factory.record_with_id("c", 50.0))?;
    assert_eq!(top_ids(&engine)?, vec!["a", "b"]);
    assert_eq!(engine.metrics().top_k_evictions, 0);
    Ok(())
}

proptest! {
    #[test]
    fn prop_top_k_matches_sorted_prefix(
        cents in prop::collection::vec(-500i64..500, 0..80),
        k in 1usize..10,
    ) {
        let amounts: Vec<f64> = cents.iter().map(|c| *c as f64 / 10.0).collect();
        let records = TransactionFactory::new().records(&amounts);
        let engine = StatisticsEngine::new(k);
        for record in &records {
            engine.apply_insert(record.clone()).unwrap();
        }
        let snapshot = engine.snapshot().unwrap();

        prop_assert_eq!(snapshot.top_k.len(), k.min(records.len()));
        assert_sorted_desc(&snapshot.top_k);
        assert_top_k_matches(&records, &snapshot.top_k, k);
    }
}
