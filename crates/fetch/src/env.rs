//! The bookkeeping environment a run threads through: the cache it ends
//! with, and the sequence of rounds it took to build it.

use std::fmt;
use std::sync::Arc;

use crate::batch::Request;
use crate::cache::FetchCache;
use crate::source::SourceName;

/// One source's query within a round, recorded for observability.
#[derive(Debug, Clone)]
pub struct Query {
    /// The source that was asked.
    pub source: SourceName,
    /// What was asked of it.
    pub request: Request,
    /// `Debug` representations of the identities the source actually
    /// returned a value for (a subset of what `request` asked for).
    pub fetched: Vec<String>,
}

/// One parallel dispatch: every query in a round is issued concurrently and
/// awaited together before the next round is planned.
#[derive(Debug, Clone, Default)]
pub struct Round {
    /// The queries dispatched this round, one per source.
    pub queries: Vec<Query>,
}

impl Round {
    /// How many identities this round actually resolved a value for, across
    /// every query in it.
    pub fn items_fetched(&self) -> usize {
        self.queries.iter().map(|q| q.fetched.len()).sum()
    }
}

/// The artifact a run produces alongside its result: the cache state and
/// the round-by-round history that led to it.
pub struct Environment {
    cache: Arc<dyn FetchCache>,
    rounds: Vec<Round>,
}

impl Environment {
    pub(crate) fn new(cache: Arc<dyn FetchCache>) -> Self {
        Self { cache, rounds: Vec::new() }
    }

    pub(crate) fn cache(&self) -> &dyn FetchCache {
        &*self.cache
    }

    pub(crate) fn record_round(&mut self, round: Round) {
        self.rounds.push(round);
    }

    /// The rounds a run took, in dispatch order.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// How many rounds a run took. `0` means the AST was already fully
    /// resolved (`Pure`/`Err`) before a single fetch was dispatched.
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// How many identities were fetched across every round, counting a
    /// value found by two different rounds' queries (impossible under
    /// correct planning, since a resolved identity is removed from the
    /// frontier) only once per round it actually appeared in.
    pub fn total_items_fetched(&self) -> usize {
        self.rounds.iter().map(Round::items_fetched).sum()
    }

    /// Consume the environment, keeping only the cache it ended with.
    ///
    /// Useful for deliberately reusing a warm cache across independent
    /// runs; the library never does this implicitly.
    pub fn into_cache(self) -> Arc<dyn FetchCache> {
        self.cache
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("round_count", &self.rounds.len())
            .field("rounds", &self.rounds)
            .finish()
    }
}
