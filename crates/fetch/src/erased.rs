//! Type-erased identity/value/source handles.
//!
//! One cache and one round planner serve every [`DataSource`] in a run, but
//! each source has its own concrete `Identity`/`Value` types. This module is
//! the existential wrapper that lets `Req`, `Frontier`, and `Cache` treat
//! every source uniformly while still downcasting back to the statically
//! known type at the one place (`Req::rewrite`, `SourceHandle::fetch_batch`)
//! that actually needs it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::source::{DataSource, SourceName};

/// Blanket-implemented object-safe facade over `Eq + Hash + Clone + 'static`
/// identities, so a `Box<dyn AnyIdentity>` can be compared and hashed
/// without knowing its concrete type.
trait AnyIdentity: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn eq_dyn(&self, other: &dyn AnyIdentity) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
    fn clone_dyn(&self) -> Box<dyn AnyIdentity>;
}

impl<T> AnyIdentity for T
where
    T: Any + Eq + Hash + Clone + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn AnyIdentity) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        Hash::hash(self, &mut state)
    }

    fn clone_dyn(&self) -> Box<dyn AnyIdentity> {
        Box::new(self.clone())
    }
}

/// A type-erased identity, comparable and hashable across source types.
pub(crate) struct ErasedIdentity(Box<dyn AnyIdentity>);

impl ErasedIdentity {
    pub(crate) fn new<T>(id: T) -> Self
    where
        T: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    {
        Self(Box::new(id))
    }

    /// Downcast back to the concrete identity type, cloning it out.
    ///
    /// Returns `None` on mismatch; callers only invoke this with the type
    /// that originally produced the identity (guaranteed by construction
    /// inside `request`/`SourceHandle`), so a `None` here indicates two
    /// sources sharing a name but disagreeing on `Identity`.
    pub(crate) fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.0.as_any().downcast_ref::<T>().cloned()
    }
}

impl Clone for ErasedIdentity {
    fn clone(&self) -> Self {
        Self(self.0.clone_dyn())
    }
}

impl PartialEq for ErasedIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl Eq for ErasedIdentity {}

impl Hash for ErasedIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_dyn(state)
    }
}

impl fmt::Debug for ErasedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// A type-erased, cheaply cloneable fetched value.
///
/// Public because custom [`crate::cache::FetchCache`] backends need to be
/// able to name this type, even though they cannot inspect its contents
/// without knowing the expected concrete type.
#[derive(Clone)]
pub struct CachedValue(Arc<dyn Any + Send + Sync>);

impl CachedValue {
    /// Wrap a concrete fetched value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Downcast to the expected type, cloning the stored value out.
    ///
    /// A `None` here means a source's cached value does not match the type
    /// a `Req` node expected for it, a programming error (two sources
    /// sharing a name but disagreeing on `Value`) rather than a recoverable
    /// runtime condition, so callers `debug_assert!` on it rather than
    /// threading the failure through `FetchError`.
    pub(crate) fn downcast<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.0.downcast_ref::<T>().cloned()
    }
}

/// (source name, identity): the cache's key type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey(pub(crate) SourceName, pub(crate) ErasedIdentity);

impl CacheKey {
    /// The name of the source this key belongs to.
    pub fn source_name(&self) -> &SourceName {
        &self.0
    }
}

/// Object-safe, type-erased facade over [`DataSource`], used by the planner
/// and executor so they can hold a `Vec` of heterogeneous sources.
#[async_trait]
pub(crate) trait ErasedSource: Send + Sync {
    fn name(&self) -> SourceName;

    async fn fetch_batch(
        &self,
        ids: Vec<ErasedIdentity>,
    ) -> HashMap<ErasedIdentity, CachedValue>;
}

/// Wraps a concrete `Arc<S>` so it can be stored as `Arc<dyn ErasedSource>`.
pub(crate) struct SourceHandle<S: DataSource>(pub(crate) Arc<S>);

#[async_trait]
impl<S: DataSource> ErasedSource for SourceHandle<S> {
    fn name(&self) -> SourceName {
        self.0.name()
    }

    async fn fetch_batch(
        &self,
        ids: Vec<ErasedIdentity>,
    ) -> HashMap<ErasedIdentity, CachedValue> {
        let typed_ids: Vec<S::Identity> = ids
            .iter()
            .map(|id| {
                id.downcast::<S::Identity>()
                    .expect("identity type mismatch for source: two sources share a name but disagree on Identity")
            })
            .collect();

        let fetched = self.0.fetch_many(&typed_ids).await;

        ids.into_iter()
            .zip(typed_ids)
            .filter_map(|(erased, typed)| {
                fetched.get(&typed).cloned().map(|v| (erased, CachedValue::new(v)))
            })
            .collect()
    }
}
