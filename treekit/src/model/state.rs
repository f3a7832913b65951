//! Persisted model state

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::selection::SelectionState;

/// Version written by [`TreeModel::store_state`](crate::TreeModel::store_state).
pub const STATE_VERSION: u32 = 1;

/// Serializable snapshot of a model's view state.
///
/// Only the selection stack is persisted, as node ids. Node content is
/// never stored, so restoring against a changed tree simply drops what no
/// longer exists.
///
/// ```json
/// {
///   "version": 1,
///   "selection": {
///     "selectionStack": [
///       { "node": "src", "type": "TOGGLE", "focus": "src" },
///       { "node": "src/main.rs", "type": "RANGE", "focus": "src" }
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeModelState {
    pub version: u32,
    pub selection: SelectionState,
}

impl TreeModelState {
    /// Creates a new state at the current version.
    pub fn new(selection: SelectionState) -> Self {
        Self {
            version: STATE_VERSION,
            selection,
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, TreeError> {
        serde_json::to_value(self).map_err(|err| TreeError::InvalidState(err.to_string()))
    }

    /// Decode from JSON.
    ///
    /// The version is checked before the rest of the value is decoded, so
    /// state written by another version fails with
    /// [`TreeError::UnsupportedStateVersion`] rather than a decode error.
    pub fn from_json(value: serde_json::Value) -> Result<Self, TreeError> {
        let found = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| TreeError::InvalidState("missing `version`".to_string()))?;
        if found != u64::from(STATE_VERSION) {
            return Err(TreeError::UnsupportedStateVersion {
                found: u32::try_from(found).unwrap_or(u32::MAX),
                expected: STATE_VERSION,
            });
        }
        serde_json::from_value(value).map_err(|err| TreeError::InvalidState(err.to_string()))
    }

    pub(crate) fn check_version(&self) -> Result<(), TreeError> {
        if self.version == STATE_VERSION {
            Ok(())
        } else {
            Err(TreeError::UnsupportedStateVersion {
                found: self.version,
                expected: STATE_VERSION,
            })
        }
    }
}
