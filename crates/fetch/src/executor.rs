//! The driver loop: plan a frontier, compile it into batches, dispatch a
//! round, rewrite the AST against the updated cache, repeat until the AST
//! collapses to `Pure`/`Err`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::ast::{Fetch, FetchAst};
use crate::batch::{compile_batches, Request};
use crate::cache::{FetchCache, InMemoryCache};
use crate::env::{Environment, Query, Round};
use crate::erased::{CacheKey, CachedValue, ErasedIdentity};
use crate::error::FetchError;
use crate::planner::Frontier;
use crate::source::SourceName;

/// Configuration for a run, currently just the cache backend to use.
///
/// Exists as its own type (rather than a bare `Arc<dyn FetchCache>`
/// parameter) so future knobs, like a round budget or a tracing span name,
/// have somewhere to land without breaking every caller.
pub struct RunConfig {
    cache: Arc<dyn FetchCache>,
}

impl RunConfig {
    /// The default configuration: a fresh [`InMemoryCache`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific cache backend for this run, e.g. a pre-seeded
    /// [`InMemoryCache`] or a [`crate::cache::ForgetfulCache`].
    pub fn with_cache(mut self, cache: Arc<dyn FetchCache>) -> Self {
        self.cache = cache;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { cache: Arc::new(InMemoryCache::new()) }
    }
}

/// Run `ast` to completion, discarding the [`Environment`] it accumulates.
pub async fn run<A>(ast: Fetch<A>) -> Result<A, FetchError>
where
    A: Clone + Send + Sync + 'static,
{
    run_with(ast, RunConfig::default()).await
}

/// Run `ast` to completion, returning the [`Environment`] alongside the
/// result.
pub async fn run_env<A>(ast: Fetch<A>) -> Result<(A, Environment), FetchError>
where
    A: Clone + Send + Sync + 'static,
{
    run_env_with(ast, RunConfig::default()).await
}

/// Run `ast` to completion with a custom [`RunConfig`], discarding the
/// [`Environment`] it accumulates.
pub async fn run_with<A>(ast: Fetch<A>, config: RunConfig) -> Result<A, FetchError>
where
    A: Clone + Send + Sync + 'static,
{
    run_env_with(ast, config).await.map(|(value, _env)| value)
}

/// Run `ast` to completion with a custom [`RunConfig`], returning the
/// [`Environment`] alongside the result.
pub async fn run_env_with<A>(
    ast: Fetch<A>,
    config: RunConfig,
) -> Result<(A, Environment), FetchError>
where
    A: Clone + Send + Sync + 'static,
{
    let mut env = Environment::new(config.cache);
    let mut ast = ast;

    loop {
        let mut frontier = Frontier::default();
        ast.frontier_into(&mut frontier);

        let missing = frontier.uncached(env.cache());
        if missing.is_empty() {
            // Nothing left to fetch, either because the frontier was empty
            // to begin with (a Join/Bind tree built entirely from already-
            // known values collapses this way without ever being a literal
            // Pure/Err itself) or because every reachable Req is already
            // resolved in the cache (e.g. a Bind revisiting a previously
            // fetched identity). Rewrite and keep going; only a literal
            // Pure/Err ends the run.
            match ast {
                FetchAst::Pure(value) => return Ok((value, env)),
                FetchAst::Err(payload) => return Err(FetchError::UnhandledException { env, payload }),
                other => {
                    ast = other.rewrite(env.cache());
                    continue;
                }
            }
        }

        let batches = compile_batches(missing);
        debug!(batches = batches.len(), "dispatching round");

        let results: Vec<HashMap<ErasedIdentity, CachedValue>> = join_all(
            batches.iter().map(|batch| batch.source.fetch_batch(batch.ids.clone())),
        )
        .await;

        let mut queries = Vec::with_capacity(batches.len());
        let mut first_not_found: Option<(SourceName, Request)> = None;
        let mut missing_by_source: HashMap<SourceName, Vec<String>> = HashMap::new();

        for (batch, found) in batches.iter().zip(results.iter()) {
            let name = batch.source.name();

            for (id, value) in found {
                env.cache().put(CacheKey(name.clone(), id.clone()), value.clone());
            }

            let misses: Vec<String> = batch
                .ids
                .iter()
                .filter(|id| !found.contains_key(*id))
                .map(|id| format!("{id:?}"))
                .collect();

            if !misses.is_empty() {
                if batch.ids.len() == 1 {
                    if first_not_found.is_none() {
                        first_not_found = Some((name.clone(), batch.request()));
                    }
                } else {
                    missing_by_source.entry(name.clone()).or_default().extend(misses);
                }
            }

            queries.push(Query {
                source: name,
                request: batch.request(),
                fetched: found.keys().map(|id| format!("{id:?}")).collect(),
            });
        }

        env.record_round(Round { queries });

        // A round's NotFound (a One query that came back empty) always wins
        // over that same round's MissingIdentities, even when both kinds of
        // problem occurred together.
        if let Some((source, request)) = first_not_found {
            warn!(%source, ?request, "identity not found");
            return Err(FetchError::NotFound { env, source, request });
        }
        if !missing_by_source.is_empty() {
            warn!(sources = missing_by_source.len(), "missing identities");
            return Err(FetchError::MissingIdentities { env, missing: missing_by_source });
        }

        ast = ast.rewrite(env.cache());
    }
}
