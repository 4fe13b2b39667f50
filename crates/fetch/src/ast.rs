//! The `Fetch` description type and the combinators that build it.
//!
//! `FetchAst<A>` is a free monad/applicative over a single constructor,
//! `Req`, with `Join` as the only parallel combinator and `Bind` as the only
//! sequential one. `Join` and `Bind` close over the erased type of their
//! children behind a boxed trait object (`JoinThunk`/`BindThunk`) since
//! `FetchAst<A>` cannot itself hold a `FetchAst<X>` for a varying `X`.

use std::sync::Arc;

use crate::cache::FetchCache;
use crate::erased::{CacheKey, ErasedIdentity};
use crate::error::Payload;
use crate::planner::Frontier;
use crate::source::DataSource;

/// A description of a (possibly deferred, possibly dependent) computation
/// that produces an `A`, built out of fetches against one or more
/// [`DataSource`]s.
///
/// `Fetch<A>` values are inert: building one never calls a source. Only
/// [`run`](crate::run)/[`run_env`](crate::run_env) execute them.
pub enum FetchAst<A> {
    /// An already-known value; contributes nothing to the frontier.
    Pure(A),
    /// A user-lifted failure.
    Err(Payload),
    /// A single deferred fetch.
    Req(ReqNode<A>),
    /// Two independent sub-computations, combined once both resolve.
    Join(Box<dyn JoinThunk<A>>),
    /// A sub-computation followed by a continuation that is opaque until
    /// the left side resolves.
    Bind(Box<dyn BindThunk<A>>),
}

/// Shorter public alias for the type most call sites actually name.
pub type Fetch<A> = FetchAst<A>;

// Every type parameter that can end up as a `Req`'s `A` needs `Clone` (to
// be cloned out of the cache) and `Sync` (the cache is shared across a
// round's concurrently-dispatched batches) in addition to `Send + 'static`.
// Since `Join`/`Bind` nest arbitrarily, that requirement propagates to
// every combinator here, not just `Req` itself.
impl<A: Clone + Send + Sync + 'static> FetchAst<A> {
    /// Lift an already-known value; no fetch is ever issued for it.
    pub fn pure(value: A) -> Self {
        FetchAst::Pure(value)
    }

    /// Transform the eventual result with a plain function.
    ///
    /// Defined as `flat_map(self, |a| Pure(f(a)))`: `map` is not a distinct
    /// primitive, just a convenience wrapper around `flat_map`.
    pub fn map<B, F>(self, f: F) -> FetchAst<B>
    where
        B: Clone + Send + Sync + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        self.flat_map(move |a| FetchAst::Pure(f(a)))
    }

    /// Sequence this computation with a continuation that depends on its
    /// result. The continuation is opaque to the planner: nothing inside it
    /// can share a round with `self`.
    pub fn flat_map<B, K>(self, k: K) -> FetchAst<B>
    where
        B: Clone + Send + Sync + 'static,
        K: FnOnce(A) -> FetchAst<B> + Send + 'static,
    {
        FetchAst::Bind(Box::new(BindNode { left: self, k: Some(k), _marker: std::marker::PhantomData }))
    }

    pub(crate) fn frontier_into(&self, out: &mut Frontier) {
        match self {
            FetchAst::Pure(_) | FetchAst::Err(_) => {}
            FetchAst::Req(req) => req.frontier_into(out),
            FetchAst::Join(join) => join.frontier_into(out),
            FetchAst::Bind(bind) => bind.frontier_into(out),
        }
    }

    pub(crate) fn rewrite(self, cache: &dyn FetchCache) -> FetchAst<A> {
        match self {
            FetchAst::Pure(v) => FetchAst::Pure(v),
            FetchAst::Err(e) => FetchAst::Err(e),
            FetchAst::Req(req) => req.rewrite(cache),
            FetchAst::Join(join) => join.rewrite(cache),
            FetchAst::Bind(bind) => bind.rewrite(cache),
        }
    }
}

/// Lift a single identity fetch against `source`.
pub fn request<S: DataSource>(source: Arc<S>, id: S::Identity) -> FetchAst<S::Value> {
    FetchAst::Req(ReqNode {
        source: Arc::new(crate::erased::SourceHandle(source)),
        id: ErasedIdentity::new(id),
        _marker: std::marker::PhantomData,
    })
}

/// Lift a user error payload. Reducing this node (i.e. reaching it as the
/// terminal state of a run) surfaces `FetchError::UnhandledException`.
pub fn error<A, E>(payload: E) -> FetchAst<A>
where
    E: Into<Payload>,
{
    FetchAst::Err(payload.into())
}

/// Combine two independent computations in parallel. Requests inside `l`
/// and `r` that are cache-key-disjoint may share a round; requests to the
/// same source are batched together.
pub fn product<X, Y>(l: FetchAst<X>, r: FetchAst<Y>) -> FetchAst<(X, Y)>
where
    X: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
{
    FetchAst::Join(Box::new(JoinNode { left: l, right: r, combine: Some(|x, y| (x, y)) }))
}

/// Run `f` over every item of `items` and collect the results, fetching all
/// of them in parallel wherever the planner can prove they are independent.
///
/// Implemented as a right-leaning fold of [`product`], matching
/// `traverse(items, f) ≡ right-leaning Join fold`.
pub fn traverse<T, A, F>(items: Vec<T>, mut f: F) -> FetchAst<Vec<A>>
where
    A: Clone + Send + Sync + 'static,
    F: FnMut(T) -> FetchAst<A>,
{
    let mut asts: Vec<FetchAst<A>> = items.into_iter().map(&mut f).collect();
    let mut acc: FetchAst<Vec<A>> = FetchAst::Pure(Vec::with_capacity(asts.len()));
    while let Some(next) = asts.pop() {
        acc = product(next, acc).map(|(a, mut rest)| {
            rest.insert(0, a);
            rest
        });
    }
    acc
}

/// Collect a list of independent computations into one that produces a
/// list of their results. Defined as `traverse(asts, identity)`.
pub fn sequence<A: Clone + Send + Sync + 'static>(asts: Vec<FetchAst<A>>) -> FetchAst<Vec<A>> {
    traverse(asts, |ast| ast)
}

/// A single deferred fetch node.
pub(crate) struct ReqNode<A> {
    source: Arc<dyn crate::erased::ErasedSource>,
    id: ErasedIdentity,
    _marker: std::marker::PhantomData<A>,
}

impl<A> ReqNode<A> {
    fn frontier_into(&self, out: &mut Frontier) {
        out.push(self.source.clone(), self.id.clone());
    }

    fn key(&self) -> CacheKey {
        CacheKey(self.source.name(), self.id.clone())
    }
}

impl<A: Clone + Send + Sync + 'static> ReqNode<A> {
    fn rewrite(self, cache: &dyn FetchCache) -> FetchAst<A> {
        let key = self.key();
        match cache.get(&key) {
            Some(value) => {
                let downcast = value.downcast::<A>();
                debug_assert!(
                    downcast.is_some(),
                    "cached value for source {:?} does not match the requested type",
                    key.source_name()
                );
                match downcast {
                    Some(v) => FetchAst::Pure(v),
                    // Defensive: a type-mismatched stored value should never
                    // happen outside of programmer error; in release builds
                    // we conservatively keep waiting rather than panic.
                    None => FetchAst::Req(self),
                }
            }
            // By the executor's loop invariant, `rewrite` is only called once
            // every Req currently in the frontier is known to the cache.
            // Falling through to "still pending" here is defensive only.
            None => FetchAst::Req(self),
        }
    }
}

/// Object-safe facade over a `Join` node closing over its erased children.
pub(crate) trait JoinThunk<A>: Send {
    fn frontier_into(&self, out: &mut Frontier);
    fn rewrite(self: Box<Self>, cache: &dyn FetchCache) -> FetchAst<A>;
}

struct JoinNode<X, Y, A, F> {
    left: FetchAst<X>,
    right: FetchAst<Y>,
    combine: Option<F>,
}

impl<X, Y, A, F> JoinThunk<A> for JoinNode<X, Y, A, F>
where
    X: Clone + Send + Sync + 'static,
    Y: Clone + Send + Sync + 'static,
    F: FnOnce(X, Y) -> A + Send + 'static,
{
    fn frontier_into(&self, out: &mut Frontier) {
        self.left.frontier_into(out);
        self.right.frontier_into(out);
    }

    fn rewrite(self: Box<Self>, cache: &dyn FetchCache) -> FetchAst<A> {
        let JoinNode { left, right, combine } = *self;
        let combine = combine.expect("JoinNode.combine is only taken once, at collapse time");
        match (left.rewrite(cache), right.rewrite(cache)) {
            (FetchAst::Err(e), _) => FetchAst::Err(e),
            (_, FetchAst::Err(e)) => FetchAst::Err(e),
            (FetchAst::Pure(x), FetchAst::Pure(y)) => FetchAst::Pure(combine(x, y)),
            (left, right) => {
                FetchAst::Join(Box::new(JoinNode { left, right, combine: Some(combine) }))
            }
        }
    }
}

/// Object-safe facade over a `Bind` node closing over its erased left side
/// and continuation.
pub(crate) trait BindThunk<A>: Send {
    fn frontier_into(&self, out: &mut Frontier);
    fn rewrite(self: Box<Self>, cache: &dyn FetchCache) -> FetchAst<A>;
}

struct BindNode<X, A, K> {
    left: FetchAst<X>,
    // `Option` so the node can be reconstructed (moving `k` back in)
    // without requiring `K: Clone` when the left side hasn't resolved yet;
    // consumed exactly once, at collapse time.
    k: Option<K>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<fn(X) -> A>,
}

impl<X, A, K> BindThunk<A> for BindNode<X, A, K>
where
    X: Clone + Send + Sync + 'static,
    K: FnOnce(X) -> FetchAst<A> + Send,
{
    fn frontier_into(&self, out: &mut Frontier) {
        self.left.frontier_into(out);
    }

    fn rewrite(self: Box<Self>, cache: &dyn FetchCache) -> FetchAst<A> {
        let BindNode { left, k, .. } = *self;
        let k = k.expect("BindNode.k is only taken once, at collapse time");
        match left.rewrite(cache) {
            FetchAst::Pure(x) => k(x),
            FetchAst::Err(e) => FetchAst::Err(e),
            left => FetchAst::Bind(Box::new(BindNode { left, k: Some(k), _marker: std::marker::PhantomData })),
        }
    }
}
