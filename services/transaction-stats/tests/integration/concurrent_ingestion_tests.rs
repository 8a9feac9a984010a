//! Concurrent clients against one service

use anyhow::Result;
use std::sync::Arc;
use test_utils::{TransactionFactory, expected_statistics, init_test_logging};
use tokio::task::JoinSet;
use transaction_stats::{
    InMemoryTransactionStore, StatisticsConfig, StatisticsService, TransactionService,
};

fn shared_service(queue: usize) -> Result<Arc<TransactionService>> {
    init_test_logging();
    let config = StatisticsConfig {
        dispatcher_queue_capacity: queue,
        ..StatisticsConfig::default()
    };
    Ok(Arc::new(TransactionService::new(
        config,
        Arc::new(InMemoryTransactionStore::new()),
    )?))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unique_inserts() -> Result<()> {
    let service = shared_service(8)?;
    let factory = TransactionFactory::new();

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        let request = factory.request(format!("concurrent_{i}"), f64::from(i) * 10.0 + 5.0);
        tasks.spawn(async move { service.create_transaction(request).await });
    }

    let mut success_count = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined?.is_ok() {
            success_count += 1;
        }
    }
    assert_eq!(success_count, 20);

    service.flush().await?;
    let snapshot = service.snapshot()?;
    assert_eq!(snapshot.count, 20);
    let top: Vec<&str> = snapshot.top_k.iter().map(|r| r.transaction_id().as_str()).collect();
    assert_eq!(top, vec!["concurrent_19", "concurrent_18", "concurrent_17"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_race() -> Result<()> {
    let service = shared_service(4)?;
    let factory = TransactionFactory::new();

    // Five unique ids, each submitted twice
    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        let request = factory.request(format!("race_{}", i % 5), 100.0);
        tasks.spawn(async move { service.create_transaction(request).await });
    }

    let mut success_count = 0;
    let mut error_count = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => success_count += 1,
            Err(e) => {
                assert_eq!(e.status_code(), 400);
                error_count += 1;
            }
        }
    }
    assert_eq!(success_count, 5);
    assert_eq!(error_count, 5);

    service.flush().await?;
    assert_eq!(service.snapshot()?.count, 5);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_delete_keeps_store_and_engine_aligned() -> Result<()> {
    let service = shared_service(16)?;
    let factory = TransactionFactory::new();

    let mut tasks = JoinSet::new();
    for i in 0..30 {
        let service = Arc::clone(&service);
        let request = factory.request(format!("mixed_{i}"), f64::from(i));
        tasks.spawn(async move {
            if i % 10 == 9 {
                service.delete_transactions().await.map(|_| ())
            } else {
                service.create_transaction(request).await.map(|_| ())
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    service.flush().await?;

    // Whatever interleaving won, replaying the store must agree with live state
    let live = service.snapshot()?;
    service.recover().await?;
    assert_eq!(service.snapshot()?, live);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_snapshots_see_consistent_state() -> Result<()> {
    let service = shared_service(64)?;
    let factory = TransactionFactory::new();
    let records = factory.records(&(0..200).map(f64::from).collect::<Vec<_>>());

    let writer = {
        let service = Arc::clone(&service);
        let factory = factory.clone();
        let records = records.clone();
        tokio::spawn(async move {
            for record in records {
                service
                    .create_transaction(
                        factory.request(record.transaction_id().as_str(), record.amount().as_f64()),
                    )
                    .await?;
            }
            anyhow::Ok(())
        })
    };

    for _ in 0..50 {
        let snapshot = service.snapshot()?;
        assert!(snapshot.top_k.len() as u64 <= snapshot.count.min(3));
        if let (Some(min), Some(max)) = (snapshot.min, snapshot.max) {
            assert!(min <= max);
        }
        tokio::task::yield_now().await;
    }

    writer.await??;
    service.flush().await?;
    let expected = expected_statistics(&records, 3);
    let snapshot = service.snapshot()?;
    assert_eq!(snapshot.count, expected.count);
    assert_eq!(snapshot.sum, expected.sum);
    Ok(())
}
