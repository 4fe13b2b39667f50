//! A deduplicating, batching, parallel-fetching scheduler for declaratively
//! described fetches.
//!
//! A [`Fetch<A>`](Fetch) value describes a computation that produces an `A`
//! out of reads against one or more [`DataSource`]s, without actually
//! issuing any of them. Building one is free: [`FetchAst::pure`],
//! [`request`], [`product`]/[`FetchAst::map`]/[`FetchAst::flat_map`],
//! [`traverse`], and [`sequence`] are the combinators that assemble a
//! description out of smaller ones. Only [`run`] (and its siblings
//! [`run_env`], [`run_with`],
//! [`run_env_with`]) actually executes one, round by round: each round asks
//! every source-name-distinct, cache-key-distinct identity it can currently
//! see in parallel, merges the results into the cache, and rewrites the
//! description against the updated cache before planning the next round.
//!
//! A `Bind`'s continuation is opaque to the planner until its left side
//! resolves, so it can never share a round with anything outside it.
//! That's the one scheduling decision this library makes for you.

mod ast;
mod batch;
mod cache;
mod env;
mod erased;
mod executor;
mod planner;
mod source;

mod error;

pub use ast::{error, product, request, sequence, traverse, Fetch, FetchAst};
pub use batch::Request;
pub use cache::{FetchCache, ForgetfulCache, InMemoryCache};
pub use env::{Environment, Query, Round};
pub use erased::{CacheKey, CachedValue};
pub use error::{FetchError, Payload};
pub use executor::{run, run_env, run_env_with, run_with, RunConfig};
pub use source::{DataSource, SourceName};
