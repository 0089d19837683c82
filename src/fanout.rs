//! Bounded-concurrency batch execution
//!
//! [`map_bounded`] runs one async operation per input item with at most a
//! fixed number in flight, returning outputs in input order. It is the
//! engine's only source of intra-subscription parallelism: message-body
//! fetches and article extraction both fan out through it.

use crate::error::{Error, Result};
use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Apply `op` to every item with at most `limit` operations in flight.
///
/// Outputs are returned in input order regardless of completion order.
/// A `limit` of zero is treated as one; a limit above the item count
/// spawns only as many workers as there are items.
///
/// The first operation failure fails the whole batch. Operations already
/// in flight on other workers are not cancelled; they run to completion
/// in the background and their results are discarded.
pub async fn map_bounded<T, U, F, Fut>(items: Vec<T>, limit: usize, op: F) -> Result<Vec<U>>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<U>> + Send + 'static,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    let workers = limit.max(1).min(total);
    let items = Arc::new(items);
    let cursor = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let items = Arc::clone(&items);
        let cursor = Arc::clone(&cursor);
        let op = op.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::with_capacity(total.div_ceil(workers));
            loop {
                // fetch_add hands each index to exactly one worker
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }
                let output = op(items[index].clone()).await?;
                claimed.push((index, output));
            }
            Ok::<_, Error>(claimed)
        }));
    }

    // try_join_all resolves on the first worker error. The remaining join
    // handles are dropped, which detaches the tasks rather than aborting
    // them, so in-flight operations finish in the background.
    let worker_outputs = try_join_all(handles.into_iter().map(|handle| async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Executor(format!("worker panicked: {e}"))),
        }
    }))
    .await?;

    let mut indexed: Vec<(usize, U)> = worker_outputs.into_iter().flatten().collect();
    indexed.sort_unstable_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, output)| output).collect())
}
