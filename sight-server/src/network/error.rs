//! Network map errors.
//!
//! Every segment queried against a map was fed to it at build time, so
//! these errors signal a broken invariant rather than bad input.

use crate::domain::{DomainError, StopKey};

#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// A stop that was never added to the map
    #[error("stop {0} is not part of the network map")]
    UnknownStop(StopKey),

    /// No edge between two parent stops that should be connected
    #[error("no edge between {from} and {to} in the network map")]
    MissingEdge { from: StopKey, to: StopKey },

    /// A composite edge that (indirectly) contains itself
    #[error("edge between {from} and {to} is composed of itself")]
    CyclicComposition { from: StopKey, to: StopKey },

    #[error(transparent)]
    Domain(#[from] DomainError),
}
