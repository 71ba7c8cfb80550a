use crate::domain::{SyncError, SyncResult};
use crate::infra::ConnectionLimiter;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Result of one item of a batch, tagged with the id or path it was for.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub item: String,
    pub result: SyncResult<T>,
}

/// Outcomes in the order they completed.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<BatchOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|v| (o.item.as_str(), v)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.item.as_str(), e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs `op` for every item concurrently and collects each outcome.
///
/// A failing item never stops its siblings. `on_outcome` sees results as
/// they complete, which is not input order.
pub async fn run_batch<T, F, Fut>(
    items: Vec<String>,
    limiter: &ConnectionLimiter,
    op: F,
    mut on_outcome: impl FnMut(&BatchOutcome<T>),
) -> BatchReport<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .map(|item| {
            let work = op(item.clone());
            async move {
                let _permit = limiter.acquire().await;
                BatchOutcome {
                    item,
                    result: work.await,
                }
            }
        })
        .collect();

    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some(outcome) = pending.next().await {
        if let Err(e) = &outcome.result {
            log::debug!("{} failed: {e}", outcome.item);
        }
        on_outcome(&outcome);
        outcomes.push(outcome);
    }

    BatchReport { outcomes }
}
