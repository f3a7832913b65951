//! Tree model error types

use std::sync::Arc;

use super::ResolveError;
use crate::node::NodeId;

/// Errors that can occur while operating on a tree model.
///
/// Unknown ids and stale node references are not errors: lookups return
/// `None` and operations on stale nodes are no-ops.
///
/// The type is `Clone` so a single in-flight refresh can hand the same
/// outcome to every caller that joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TreeError {
    /// The child resolver failed. The previous children were kept.
    #[error("Failed to resolve children of `{id}`: {source}")]
    Resolution {
        /// The composite whose children were being resolved.
        id: NodeId,
        /// The resolver's error.
        #[source]
        source: Arc<ResolveError>,
    },

    /// A selection stack broke its ordering contract.
    #[error("Selection invariant violated: {0}")]
    InvariantViolation(String),

    /// Persisted state could not be decoded.
    #[error("Invalid persisted state: {0}")]
    InvalidState(String),

    /// Persisted state was written by an incompatible version.
    #[error("Unsupported state version {found} (expected {expected})")]
    UnsupportedStateVersion {
        /// Version found in the persisted state.
        found: u32,
        /// Version this crate writes.
        expected: u32,
    },

    /// The background refresh task did not run to completion.
    #[error("Refresh of `{id}` aborted: {reason}")]
    RefreshAborted {
        /// The composite being refreshed.
        id: NodeId,
        /// Why the task stopped.
        reason: String,
    },
}

impl TreeError {
    /// Creates a resolution error for the given composite.
    pub fn resolution(id: impl Into<NodeId>, source: ResolveError) -> Self {
        Self::Resolution {
            id: id.into(),
            source: Arc::new(source),
        }
    }

    /// Returns `true` if this error came from the child resolver.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}
