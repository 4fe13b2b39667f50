//! Groups a frontier's uncached requests by source into deduplicated
//! batches, one compiled query per source per round.

use std::collections::HashMap;
use std::sync::Arc;

use crate::erased::{ErasedIdentity, ErasedSource};
use crate::source::SourceName;

/// A public, source-agnostic description of one compiled query.
///
/// Identities are rendered with their `Debug` representation rather than
/// exposed as a concrete type, since a `Request` may outlive the run (it is
/// carried inside [`crate::FetchError`]) and has no way to stay generic
/// over every source's `Identity` type at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Exactly one identity was requested of the source this round.
    One(String),
    /// More than one identity was requested of the source this round,
    /// deduplicated. A source that appears as both `One` and `Many` within
    /// the same frontier is always compiled as `Many`: batching subsumes
    /// singletons.
    Many(Vec<String>),
}

impl Request {
    fn from_ids(ids: &[ErasedIdentity]) -> Self {
        if let [single] = ids {
            Request::One(format!("{single:?}"))
        } else {
            Request::Many(ids.iter().map(|id| format!("{id:?}")).collect())
        }
    }
}

/// One source's compiled batch for a round.
pub(crate) struct SourceBatch {
    pub(crate) source: Arc<dyn ErasedSource>,
    pub(crate) ids: Vec<ErasedIdentity>,
}

impl SourceBatch {
    pub(crate) fn request(&self) -> Request {
        Request::from_ids(&self.ids)
    }
}

/// Group already-deduplicated-and-filtered `(source, identity)` pairs by
/// source name, preserving first-encounter order.
pub(crate) fn compile_batches(
    missing: Vec<(Arc<dyn ErasedSource>, ErasedIdentity)>,
) -> Vec<SourceBatch> {
    let mut order: Vec<SourceName> = Vec::new();
    let mut groups: HashMap<SourceName, SourceBatch> = HashMap::new();

    for (source, id) in missing {
        let name = source.name();
        groups
            .entry(name.clone())
            .and_modify(|batch| batch.ids.push(id.clone()))
            .or_insert_with(|| {
                order.push(name.clone());
                SourceBatch { source, ids: vec![id] }
            });
    }

    order.into_iter().filter_map(|name| groups.remove(&name)).collect()
}
