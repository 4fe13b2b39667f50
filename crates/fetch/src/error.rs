//! Errors surfaced by a run.

use std::collections::HashMap;

use thiserror::Error;

use crate::batch::Request;
use crate::env::Environment;
use crate::source::SourceName;

/// A user-lifted failure payload, as passed to [`crate::error`].
pub type Payload = Box<dyn std::error::Error + Send + Sync>;

/// The ways a run can fail.
///
/// Every variant carries the [`Environment`] as it stood at the moment of
/// failure, so callers can inspect exactly which rounds ran and what was
/// cached before the run gave up.
#[derive(Error, Debug)]
pub enum FetchError {
    /// A single-identity request resolved, but the source returned no value
    /// for it.
    #[error("identity not found: {request:?} (source {source})")]
    NotFound {
        /// The environment accumulated up to and including the failing round.
        env: Environment,
        /// The source that failed to resolve the identity.
        source: SourceName,
        /// The request that came back empty.
        request: Request,
    },

    /// A batched request resolved with one or more identities missing from
    /// the source's response.
    #[error("missing identities: {missing:?}")]
    MissingIdentities {
        /// The environment accumulated up to and including the failing round.
        env: Environment,
        /// Missing identities, grouped by the source that was asked for them.
        missing: HashMap<SourceName, Vec<String>>,
    },

    /// An explicit `error(...)` node was reduced to the terminal state of
    /// the run.
    #[error("unhandled exception: {payload}")]
    UnhandledException {
        /// The environment accumulated up to and including the failing round.
        env: Environment,
        /// The payload passed to `error(...)`.
        payload: Payload,
    },
}
