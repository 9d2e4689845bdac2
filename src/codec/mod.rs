//! Format Codec: stateless translation between [`CognitiveState`] and the
//! versioned JSON-LD document format (spec.md §4.1).

pub mod context;
pub mod export;
pub mod import;

pub use export::{ExportOptions, FORMAT_V2, export_state};
pub use import::{ImportResult, import_document};

use crate::error::RedstringError;
use crate::model::CognitiveState;

/// `exportState` fails only when `state` is absent; callers already hold a
/// `&CognitiveState` so this exists for the one adapter boundary case where
/// a caller passes a possibly-absent state (spec.md §4.1 "Error
/// conditions").
pub fn export_state_checked(
    state: Option<&CognitiveState>,
    opts: &ExportOptions,
) -> Result<serde_json::Value, RedstringError> {
    let state = state.ok_or_else(|| RedstringError::InvalidInput("state is required".to_string()))?;
    export_state(state, opts)
}
