//! The adapter surface a data source implements.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

/// The stable name of a data source.
///
/// Two sources with the same name are treated as the same source for
/// caching and batching purposes, regardless of whether they are the same
/// `Arc` instance.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SourceName(Arc<str>);

impl SourceName {
    /// Build a new source name from anything that can become a `String`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::from(name.into().into_boxed_str()))
    }

    /// Borrow the name as a `str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for SourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SourceName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A user-provided adapter for one data source.
///
/// Implementations must be referentially transparent with respect to
/// identity equality: fetching the same identity twice within one run must
/// yield the same value. The planner relies on this to dedupe and cache
/// fetches safely.
///
/// Only [`name`](DataSource::name) and [`fetch_one`](DataSource::fetch_one)
/// are required; [`fetch_many`](DataSource::fetch_many) has a default
/// implementation that fans `fetch_one` out over the effect capability's
/// parallel combinator, so a source that cannot batch efficiently does not
/// need to write anything beyond the minimal contract.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// The type that names one item within this source.
    type Identity: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static;

    /// The fetched payload type. Must be `Clone` because a single cached
    /// value may be handed out to more than one AST node requesting the
    /// same identity.
    type Value: Clone + Send + Sync + 'static;

    /// The stable name of this source.
    fn name(&self) -> SourceName;

    /// Fetch a single identity. Returns `None` if the identity is unknown.
    async fn fetch_one(&self, id: &Self::Identity) -> Option<Self::Value>;

    /// Fetch a nonempty batch of identities at once.
    ///
    /// May return a partial mapping; identities missing from the result are
    /// treated as "not found". The default implementation loops over
    /// [`fetch_one`](DataSource::fetch_one) concurrently; override this for
    /// sources that support a real batched query.
    async fn fetch_many(
        &self,
        ids: &[Self::Identity],
    ) -> HashMap<Self::Identity, Self::Value> {
        let fetched = join_all(ids.iter().map(|id| async move {
            let value = self.fetch_one(id).await;
            (id.clone(), value)
        }))
        .await;

        fetched
            .into_iter()
            .filter_map(|(id, value)| value.map(|v| (id, v)))
            .collect()
    }
}
