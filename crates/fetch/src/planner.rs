//! The frontier: every `Req` reachable in an AST without crossing a `Bind`.

use std::sync::Arc;

use itertools::Itertools;

use crate::cache::FetchCache;
use crate::erased::{CacheKey, ErasedIdentity, ErasedSource};

/// The requests a round's planner can see "all at once".
///
/// `frontier(Bind(l, _))` stops at `l`: nothing inside the continuation
/// can be known to exist until `l` resolves, so it can never share a round
/// with anything else. Built by repeated [`Frontier::push`] calls from
/// [`crate::ast::FetchAst::frontier_into`].
#[derive(Default)]
pub(crate) struct Frontier {
    entries: Vec<(Arc<dyn ErasedSource>, ErasedIdentity)>,
}

impl Frontier {
    pub(crate) fn push(&mut self, source: Arc<dyn ErasedSource>, id: ErasedIdentity) {
        self.entries.push((source, id));
    }

    /// The subset not already present in `cache`, deduplicated by cache key
    /// and kept in first-encounter order.
    pub(crate) fn uncached(
        &self,
        cache: &dyn FetchCache,
    ) -> Vec<(Arc<dyn ErasedSource>, ErasedIdentity)> {
        self.entries
            .iter()
            .filter(|(source, id)| cache.get(&CacheKey(source.name(), id.clone())).is_none())
            .unique_by(|(source, id)| CacheKey(source.name(), id.clone()))
            .map(|(source, id)| (source.clone(), id.clone()))
            .collect()
    }
}
