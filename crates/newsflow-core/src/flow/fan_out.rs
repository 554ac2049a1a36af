//! Bounded fan-out with join semantics.
//!
//! Results come back in dispatch order regardless of completion order, and
//! the first error aborts the batch (in-flight invocations are dropped).

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::crew::CrewOutput;
use crate::models::TokenUsage;

/// Run `f` over `items` with at most `limit` invocations in flight.
pub async fn fan_out<I, F, Fut, T, E>(items: I, limit: usize, f: F) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .try_collect()
        .await
}

/// Separate outputs from their summed token usage.
pub fn split_usage<T>(results: Vec<CrewOutput<T>>) -> (Vec<T>, TokenUsage) {
    let usage = results.iter().map(|r| r.usage).sum();
    let outputs = results.into_iter().map(|r| r.output).collect();
    (outputs, usage)
}
