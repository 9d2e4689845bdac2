//! `GitRepo` adapter: dispatches to a registered [`SyncEngine`] when one is
//! present for the universe, else falls back to a direct [`GitProvider`]
//! call against `<universeFolder>/<universeFile>` (spec.md §4.2).
//!
//! Token acquisition (GitHub App installation tokens refreshed past 45
//! minutes, OAuth refresh-on-demand, the one-time 401 retry) is the
//! `GitProvider` implementation's concern, not this adapter's: it is an
//! external collaborator per spec.md §1.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::adapters::{GitProvider, SyncEngine};
use crate::codec::export::{ExportOptions, export_state};
use crate::error::RedstringError;
use crate::model::CognitiveState;

/// Which path the adapter took to reach Git, surfaced for status events
/// and tests rather than hidden inside a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitMode {
    Engine,
    Direct,
}

/// Coordinates for the direct-mode path: where in the repository the
/// universe's single document lives (spec.md §3, §6 "Git layout").
#[derive(Debug, Clone)]
pub struct GitPath {
    pub universe_folder: String,
    pub universe_file: String,
}

impl GitPath {
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.universe_folder, self.universe_file)
    }
}

/// The `GitRepo` slot for one universe: either an engine registration or a
/// provider + path, never both (engine mode takes priority when present,
/// per spec.md §4.2).
pub enum GitRepoSlot {
    Engine(Arc<dyn SyncEngine>),
    Direct { provider: Arc<dyn GitProvider>, path: GitPath },
}

impl GitRepoSlot {
    pub fn mode(&self) -> GitMode {
        match self {
            GitRepoSlot::Engine(_) => GitMode::Engine,
            GitRepoSlot::Direct { .. } => GitMode::Direct,
        }
    }

    /// Read the universe's document. In direct mode, a read failure
    /// (including a 404 for a universe that has never been saved to Git)
    /// propagates so the caller's load-order fallback can try the next slot
    /// (spec.md §8 S6) — the Git file is only ever created by a subsequent
    /// `save`, never fabricated as a side effect of a failed read. A
    /// present-but-empty file is not an error: it returns an empty state
    /// without writing anything back.
    pub async fn load(&self) -> Result<Value, RedstringError> {
        match self {
            GitRepoSlot::Engine(engine) => match engine.load_from_git().await? {
                Some(doc) => Ok(doc),
                None => Ok(empty_document()?),
            },
            GitRepoSlot::Direct { provider, path } => {
                let full_path = path.full_path();
                let text = provider.read_file_raw(&full_path).await.inspect_err(|e| {
                    warn!(path = %full_path, error = %e, "direct git read failed");
                })?;
                if text.trim().is_empty() {
                    debug!(path = %full_path, "direct git file present but empty");
                    return empty_document();
                }
                serde_json::from_str(&text).map_err(RedstringError::from)
            }
        }
    }

    /// Debounced write path: `updateState` in engine mode, a raw overwrite
    /// in direct mode.
    pub async fn save(&self, document: &Value) -> Result<(), RedstringError> {
        match self {
            GitRepoSlot::Engine(engine) => engine.update_state(document).await,
            GitRepoSlot::Direct { provider, path } => {
                let full_path = path.full_path();
                let body = serde_json::to_string_pretty(document)?;
                provider.write_file_raw(&full_path, &body).await.inspect_err(|e| {
                    warn!(path = %full_path, error = %e, "direct git write failed");
                })
            }
        }
    }

    /// Force-save path: `forceCommit` in engine mode, identical to `save`
    /// in direct mode (there is no separate forced write in that path).
    pub async fn force_save(&self, document: &Value) -> Result<(), RedstringError> {
        match self {
            GitRepoSlot::Engine(engine) => engine.force_commit(document).await,
            GitRepoSlot::Direct { .. } => self.save(document).await,
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self {
            GitRepoSlot::Engine(engine) => engine.is_healthy(),
            GitRepoSlot::Direct { .. } => true,
        }
    }
}

fn empty_document() -> Result<Value, RedstringError> {
    export_state(&CognitiveState::default(), &ExportOptions::default())
}

/// True when an error's message indicates a Git conflict or transient
/// network failure that warrants the one-retry-after-2s policy
/// (spec.md §4.3 "Conflict policy", §7).
pub fn is_conflict_or_network(err: &RedstringError) -> bool {
    matches!(err, RedstringError::Conflict(_) | RedstringError::Network(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeProvider {
        files: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl GitProvider for FakeProvider {
        async fn is_available(&self) -> bool {
            true
        }
        async fn read_file_raw(&self, path: &str) -> Result<String, RedstringError> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| RedstringError::Network("404".to_string()))
        }
        async fn write_file_raw(&self, path: &str, body: &str) -> Result<(), RedstringError> {
            self.files.lock().unwrap().insert(path.to_string(), body.to_string());
            Ok(())
        }
    }

    /// A 404 (missing key) from the provider propagates as an error rather
    /// than being silently papered over with a fabricated document — it's
    /// the Manager's load-order fallback that decides what happens next
    /// (spec.md §8 S6), not this adapter.
    #[tokio::test]
    async fn missing_file_propagates_the_provider_error() {
        let provider = Arc::new(FakeProvider { files: Mutex::new(std::collections::HashMap::new()) });
        let slot = GitRepoSlot::Direct {
            provider: provider.clone(),
            path: GitPath { universe_folder: "universes/s1".into(), universe_file: "s1.redstring".into() },
        };
        let err = slot.load().await.unwrap_err();
        assert!(matches!(err, RedstringError::Network(_)));
        assert!(provider.files.lock().unwrap().is_empty(), "a failed load must not write anything back");
    }

    /// A file that exists but is empty is not an error: it reads back as an
    /// empty state without the adapter writing anything.
    #[tokio::test]
    async fn present_but_empty_file_reads_as_empty_state() {
        let mut files = std::collections::HashMap::new();
        files.insert("universes/s1/s1.redstring".to_string(), "   ".to_string());
        let provider = Arc::new(FakeProvider { files: Mutex::new(files) });
        let slot = GitRepoSlot::Direct {
            provider: provider.clone(),
            path: GitPath { universe_folder: "universes/s1".into(), universe_file: "s1.redstring".into() },
        };
        let doc = slot.load().await.unwrap();
        assert_eq!(doc["format"], crate::codec::export::FORMAT_V2);
        assert_eq!(provider.files.lock().unwrap()["universes/s1/s1.redstring"], "   ");
    }

    #[tokio::test]
    async fn existing_file_round_trips() {
        let mut files = std::collections::HashMap::new();
        files.insert("universes/s1/s1.redstring".to_string(), "{\"format\":\"x\"}".to_string());
        let provider = Arc::new(FakeProvider { files: Mutex::new(files) });
        let slot = GitRepoSlot::Direct {
            provider,
            path: GitPath { universe_folder: "universes/s1".into(), universe_file: "s1.redstring".into() },
        };
        let doc = slot.load().await.unwrap();
        assert_eq!(doc["format"], "x");
    }
}
