//! Canonical error type for the universe lifecycle and save-coordination engine.
//!
//! Every subsystem (codec, adapters, manager, coordinator) returns
//! `Result<T, RedstringError>`. Variants line up one-to-one with the error
//! kinds enumerated in spec.md §7 so callers can match on policy rather than
//! on ad hoc strings.

use thiserror::Error;

/// Which storage slot an error originated from, for composite reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Local,
    Git,
    Browser,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Local => write!(f, "local"),
            Slot::Git => write!(f, "git"),
            Slot::Browser => write!(f, "browser"),
        }
    }
}

/// One slot's failure reason, used to build `AllSlotsFailed` composites.
#[derive(Debug, Clone)]
pub struct SlotFailure {
    pub slot: Slot,
    pub reason: String,
}

/// Canonical error type for all engine operations.
#[derive(Error, Debug)]
pub enum RedstringError {
    /// `exportState` called with no state, or a caller passed a structurally
    /// invalid argument (spec.md §4.1 "Error conditions").
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A slot has no handle, no engine, or is disabled. Callers should
    /// log-and-skip rather than abort the fan-out (spec.md §7).
    #[error("slot unavailable: {slot}: {reason}")]
    SlotUnavailable { slot: Slot, reason: String },

    /// File handle permission was revoked or never granted; auto-save must
    /// be disabled for the slot until the user re-picks (spec.md §7).
    #[error("permission error on {slot}: {reason}")]
    Permission { slot: Slot, reason: String },

    /// Document-level parse failure: caller gets an empty state plus a list
    /// of warnings rather than a hard error (spec.md §4.1 rule 6).
    #[error("parse error: {0}")]
    Parse(String),

    /// BrowserKV write exceeded available quota even after eviction
    /// (spec.md §4.2, §7).
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Git write conflict (HTTP 409) or transient network failure; retry
    /// policy is one retry after 2s (spec.md §7).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network-level failure talking to a storage slot's transport.
    #[error("network error: {0}")]
    Network(String),

    /// Auth token acquisition/refresh failed twice; the slot stops
    /// attempting further writes until the embedder re-authenticates
    /// (spec.md §7).
    #[error("auth required: {0}")]
    AuthRequired(String),

    /// Every enabled slot failed during a fan-out save or a fallback load;
    /// carries the per-slot reasons for a single composite error (spec.md §7).
    #[error("all slots failed: {}", format_failures(.0))]
    AllSlotsFailed(Vec<SlotFailure>),

    /// Underlying JSON (de)serialization failure not otherwise classified.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O failure (native adapters only).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for adapter-level failures that don't fit the taxonomy
    /// above (e.g. a malformed host response). Kept narrow and rare.
    #[error("adapter error: {0}")]
    Adapter(String),
}

fn format_failures(failures: &[SlotFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.slot, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RedstringError {
    /// True for the error kinds spec.md §7 says should retry once rather
    /// than propagate immediately (Conflict, Network).
    pub fn is_retryable(&self) -> bool {
        matches!(self, RedstringError::Conflict(_) | RedstringError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_slots_failed_formats_each_reason() {
        let err = RedstringError::AllSlotsFailed(vec![
            SlotFailure { slot: Slot::Local, reason: "no handle".into() },
            SlotFailure { slot: Slot::Git, reason: "401".into() },
        ]);
        let msg = format!("{}", err);
        assert!(msg.contains("local: no handle"));
        assert!(msg.contains("git: 401"));
    }

    #[test]
    fn retryable_kinds() {
        assert!(RedstringError::Conflict("409".into()).is_retryable());
        assert!(RedstringError::Network("timeout".into()).is_retryable());
        assert!(!RedstringError::Quota("full".into()).is_retryable());
    }
}
