//! Storage Adapters: the three narrow interfaces the Manager fans saves and
//! loads out to (spec.md §4.2). Each slot has a native implementation (used
//! by non-browser embedders and by this crate's own tests) and, where the
//! host primitive is browser-only, a `wasm32` implementation behind
//! `web-sys`.
//!
//! The Git transport's authentication (GitHub App installation tokens,
//! OAuth refresh) and the batched sync engine itself are external
//! collaborators (spec.md §1): this module defines the contracts they must
//! satisfy ([`GitProvider`], [`SyncEngine`]) rather than implementing them.

pub mod browser_kv;
pub mod git_repo;
pub mod local_file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RedstringError;

/// An opaque, session-scoped handle to a local file. The codec and Manager
/// never inspect its contents; only presence and `path` survive a process
/// restart (spec.md §9 "Opaque file handles").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    pub path: String,
}

/// `LocalFile` adapter contract (spec.md §4.2). Implementations must treat
/// writes as full-file overwrites; there are no partial writes.
///
/// The trait itself stays `Send + Sync` on every target so the Manager can
/// hold slot adapters behind one `Arc<dyn LocalFileAdapter>` regardless of
/// platform. Only the *futures returned by its async methods* relax the
/// `Send` bound on wasm32: the host file-picker calls wrap JS promises
/// (`wasm_bindgen::JsValue` is not `Send`), and `wasm32-unknown-unknown`
/// has no OS threads to send across.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait LocalFileAdapter: Send + Sync {
    async fn pick_for_create(&self, suggested_name: &str) -> Result<FileHandle, RedstringError>;
    async fn pick_for_open(&self) -> Result<FileHandle, RedstringError>;
    async fn read(&self, handle: &FileHandle) -> Result<String, RedstringError>;
    async fn write(&self, handle: &FileHandle, text: &str) -> Result<(), RedstringError>;
    async fn query_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError>;
    async fn request_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError>;
}

/// External batched committer that owns Git-side retry/sha bookkeeping
/// (spec.md §6 "Sync-engine contract"). Consumed, never implemented, by
/// this crate.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    async fn update_state(&self, document: &Value) -> Result<(), RedstringError>;
    async fn force_commit(&self, document: &Value) -> Result<(), RedstringError>;
    async fn load_from_git(&self) -> Result<Option<Value>, RedstringError>;
    fn is_healthy(&self) -> bool;
    fn get_status(&self) -> EngineStatus;
    fn stop(&self);
    fn last_commit_time(&self) -> Option<DateTime<Utc>>;
    fn consecutive_errors(&self) -> u32;
    fn pending_commits(&self) -> u32;
}

/// Snapshot returned by [`SyncEngine::get_status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub healthy: bool,
    pub last_commit_time: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub pending_commits: u32,
}

/// Direct-mode Git transport (spec.md §6 "Provider contract"): consumed
/// when no sync engine is registered for a universe.
#[async_trait]
pub trait GitProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn read_file_raw(&self, path: &str) -> Result<String, RedstringError>;
    async fn write_file_raw(&self, path: &str, body: &str) -> Result<(), RedstringError>;
}

/// One record in the `BrowserKV` object store (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserRecord {
    pub id: String,
    pub data: Value,
    pub saved_at: String,
}

/// `BrowserKV` adapter contract. Implementations must evict down to the 3
/// most-recent records by `saved_at` and retry once before reporting
/// `RedstringError::Quota` (spec.md §4.2, §7). See [`LocalFileAdapter`] for
/// why the async-trait mode differs by target.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait BrowserKvAdapter: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<BrowserRecord>, RedstringError>;
    async fn write(&self, key: &str, data: &Value) -> Result<(), RedstringError>;
    async fn delete(&self, key: &str) -> Result<(), RedstringError>;
}
