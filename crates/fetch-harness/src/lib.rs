//! Mock [`fetch_core::DataSource`] implementations for exercising the
//! planner and executor without real I/O.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fetch_core::{DataSource, SourceName};
use tracing::debug;

/// A source backed by a fixed, in-memory map, built once at construction
/// time. Identities absent from the map are permanently "not found": the
/// map never grows.
///
/// An optional uniform latency (`with_latency`) lets tests exercise
/// parallel-dispatch timing without a real I/O-bound source.
pub struct MapSource<I, V> {
    name: SourceName,
    data: HashMap<I, V>,
    latency: Duration,
}

impl<I, V> MapSource<I, V>
where
    I: Eq + Hash,
{
    /// Build a source named `name`, serving exactly the entries in `data`,
    /// with no artificial latency.
    pub fn new(name: impl Into<SourceName>, data: impl IntoIterator<Item = (I, V)>) -> Self {
        Self { name: name.into(), data: data.into_iter().collect(), latency: Duration::ZERO }
    }

    /// Delay every `fetch_one`/`fetch_many` call by `latency` before
    /// returning, to simulate a real remote source.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl<I, V> DataSource for MapSource<I, V>
where
    I: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Identity = I;
    type Value = V;

    fn name(&self) -> SourceName {
        self.name.clone()
    }

    async fn fetch_one(&self, id: &Self::Identity) -> Option<Self::Value> {
        debug!(source = %self.name, ?id, "fetch_one");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.data.get(id).cloned()
    }

    async fn fetch_many(&self, ids: &[Self::Identity]) -> HashMap<Self::Identity, Self::Value> {
        debug!(source = %self.name, count = ids.len(), "fetch_many");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        ids.iter()
            .filter_map(|id| self.data.get(id).cloned().map(|v| (id.clone(), v)))
            .collect()
    }
}

/// Wraps another source and records how many times it was called and how
/// many identities it was asked for in total, so a test can assert that the
/// planner actually batches instead of calling a source once per identity.
pub struct CountingSource<S> {
    inner: S,
    one_calls: AtomicUsize,
    many_calls: AtomicUsize,
    items_requested: AtomicUsize,
}

impl<S> CountingSource<S> {
    /// Wrap `inner`, starting every counter at zero.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            one_calls: AtomicUsize::new(0),
            many_calls: AtomicUsize::new(0),
            items_requested: AtomicUsize::new(0),
        }
    }

    /// How many times `fetch_one` was called directly.
    pub fn one_calls(&self) -> usize {
        self.one_calls.load(Ordering::SeqCst)
    }

    /// How many times `fetch_many` was called: one call per round this
    /// source appeared in, regardless of how many identities it carried.
    pub fn many_calls(&self) -> usize {
        self.many_calls.load(Ordering::SeqCst)
    }

    /// Total identities requested across every call, `fetch_one` and
    /// `fetch_many` alike.
    pub fn items_requested(&self) -> usize {
        self.items_requested.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: DataSource> DataSource for CountingSource<S> {
    type Identity = S::Identity;
    type Value = S::Value;

    fn name(&self) -> SourceName {
        self.inner.name()
    }

    async fn fetch_one(&self, id: &Self::Identity) -> Option<Self::Value> {
        self.one_calls.fetch_add(1, Ordering::SeqCst);
        self.items_requested.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_one(id).await
    }

    async fn fetch_many(&self, ids: &[Self::Identity]) -> HashMap<Self::Identity, Self::Value> {
        self.many_calls.fetch_add(1, Ordering::SeqCst);
        self.items_requested.fetch_add(ids.len(), Ordering::SeqCst);
        self.inner.fetch_many(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn map_source_misses_are_none() {
        let source = MapSource::new("widgets", [(1u32, "a"), (2u32, "b")]);
        assert_eq!(source.fetch_one(&1).await, Some("a"));
        assert_eq!(source.fetch_one(&99).await, None);
    }

    #[tokio::test]
    async fn counting_source_tracks_batched_calls() {
        let source = CountingSource::new(MapSource::new("widgets", [(1u32, "a"), (2u32, "b")]));
        let _ = source.fetch_many(&[1, 2]).await;
        assert_eq!(source.many_calls(), 1);
        assert_eq!(source.items_requested(), 2);
        assert_eq!(source.one_calls(), 0);
    }
}
