//! Bounded batch runner
//!
//! Items run in fixed-size batches: everything inside a batch runs
//! concurrently, and the next batch starts only after the whole batch has
//! finished. Each item's outcome is recorded under its key, so one failure
//! never hides the others. Keys must be unique: a repeated key is recorded as
//! an `InvalidInput` failure under a suffixed id and its item is not run.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Run `task` over `items` in batches of `batch_size`, keyed by `key`
pub async fn run_batched<'a, I, T, K, F, Fut>(
    items: &'a [I],
    batch_size: usize,
    key: K,
    task: F,
) -> HashMap<String, Result<T>>
where
    K: Fn(&I) -> String,
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let batch_size = batch_size.max(1);
    let mut results = HashMap::with_capacity(items.len());

    let keyed: Vec<(String, &'a I)> = items.iter().map(|item| (key(item), item)).collect();
    let all_keys: HashSet<&str> = keyed.iter().map(|(id, _)| id.as_str()).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut runnable = Vec::with_capacity(keyed.len());

    for (id, item) in &keyed {
        let count = seen.entry(id.as_str()).or_insert(0);
        *count += 1;
        if *count == 1 {
            runnable.push((id.clone(), *item));
            continue;
        }

        let mut suffix = *count;
        let mut duplicate_id = format!("{}#{}", id, suffix);
        while all_keys.contains(duplicate_id.as_str()) || results.contains_key(&duplicate_id) {
            suffix += 1;
            duplicate_id = format!("{}#{}", id, suffix);
        }
        warn!(item_id = %id, recorded_as = %duplicate_id, "Duplicate batch item id");
        results.insert(
            duplicate_id,
            Err(Error::InvalidInput(format!("Duplicate item id '{}'", id))),
        );
    }

    for (batch_index, batch) in runnable.chunks(batch_size).enumerate() {
        debug!(batch = batch_index, size = batch.len(), "Starting batch");

        let outcomes = join_all(batch.iter().map(|(_, item)| task(*item))).await;

        for ((id, _), outcome) in batch.iter().zip(outcomes) {
            if let Err(e) = &outcome {
                warn!(item_id = %id, error = %e, "Batch item failed");
            }
            results.insert(id.clone(), outcome);
        }
    }

    results
}

/// Split batch results into successes and failures, sorted by key
pub fn partition_results<T>(
    results: HashMap<String, Result<T>>,
) -> (Vec<(String, T)>, Vec<(String, crate::error::Error)>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for (id, result) in results {
        match result {
            Ok(value) => ok.push((id, value)),
            Err(e) => failed.push((id, e)),
        }
    }
    ok.sort_by(|a, b| a.0.cmp(&b.0));
    failed.sort_by(|a, b| a.0.cmp(&b.0));
    (ok, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let items: Vec<u32> = (1..=7).collect();
        let results = run_batched(&items, 3, |n| format!("item-{}", n), |n| async move {
            if n % 3 == 0 {
                Err(Error::Other(format!("bad {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results.len(), 7);
        assert!(results["item-3"].is_err());
        assert!(results["item-6"].is_err());
        assert_eq!(*results["item-7"].as_ref().unwrap(), 70);

        let (ok, failed) = partition_results(results);
        assert_eq!(ok.len(), 5);
        assert_eq!(failed.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(), vec!["item-3", "item-6"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_batch_size() {
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        let items: Vec<u32> = (0..8).collect();
        let (in_flight, max_seen) = (&in_flight, &max_seen);

        run_batched(&items, 3, |n| n.to_string(), move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batches_complete_in_order() {
        let log = Mutex::new(Vec::new());
        let items: Vec<u32> = (0..6).collect();

        let log_ref = &log;

        run_batched(&items, 2, |n| n.to_string(), move |n| {
            let log = log_ref;
            async move {
                log.lock().unwrap().push(format!("start-{}", n));
                tokio::task::yield_now().await;
                log.lock().unwrap().push(format!("end-{}", n));
                Ok(())
            }
        })
        .await;

        let log = log.into_inner().unwrap();
        let position = |s: &str| log.iter().position(|l| l == s).unwrap();
        // Every item of batch N ends before any item of batch N+1 starts
        assert!(position("end-0") < position("start-2"));
        assert!(position("end-1") < position("start-2"));
        assert!(position("end-3") < position("start-4"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_do_not_hide_failures() {
        let items = vec![("call", "   "), ("call", "good text"), ("call#2", "other")];
        let runs = AtomicUsize::new(0);
        let runs_ref = &runs;

        let results = run_batched(&items, 3, |(id, _)| id.to_string(), move |(_, text)| async move {
            runs_ref.fetch_add(1, Ordering::SeqCst);
            if text.trim().is_empty() {
                Err(Error::InvalidInput("empty".into()))
            } else {
                Ok(text.len())
            }
        })
        .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results["call"], Err(Error::InvalidInput(_))));
        assert!(matches!(results["call#3"], Err(Error::InvalidInput(_))));
        assert_eq!(*results["call#2"].as_ref().unwrap(), 5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_batch_size_still_runs() {
        let items = vec![1u32, 2];
        let results = run_batched(&items, 0, |n| n.to_string(), |n| async move { Ok(*n) }).await;
        assert_eq!(results.len(), 2);
    }
}
