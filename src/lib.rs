//! Redstring Core: the persistence and cross-device sync engine for a
//! cognitive-space editor.
//!
//! **A universe is a single cognitive space that can live in up to three
//! storage slots at once** — a local file, a Git repository, and a browser
//! key/value store — with one of them designated the source of truth. This
//! crate owns everything below the UI: the versioned JSON-LD wire format,
//! the three storage adapters, the registry that tracks which universes
//! exist and where they live, and the debounced save pipeline that decides
//! when and where a UI-driven change actually gets written.
//!
//! # Data flow
//!
//! ```text
//! UI mutation
//!   -> SaveCoordinator::on_state_change (classify, fingerprint, debounce)
//!   -> UniverseManager::save_active_universe (fan out Git -> Local -> Browser)
//!   -> codec::export_state (pure state -> JSON-LD document)
//!   -> adapters::{GitRepoSlot, LocalFileAdapter, BrowserKvAdapter}
//! ```
//!
//! Load is the mirror: the Manager picks a slot order from the universe's
//! `sourceOfTruth`, reads a document, and `codec::import_document` turns it
//! back into a [`model::CognitiveState`] for the UI.
//!
//! # Crate structure
//!
//! - [`model`]: the cognitive-space data model ([`model::CognitiveState`])
//!   and the universe registry entry ([`model::Universe`]).
//! - [`codec`]: pure `exportState`/`importDocument` conversion between
//!   `CognitiveState` and the versioned JSON-LD wire format.
//! - [`adapters`]: the three storage slot contracts and their native/wasm32
//!   implementations.
//! - [`manager`]: the universe registry, load/save orchestration, health
//!   watchdog, and discovery.
//! - [`coordinator`]: the priority-tiered debouncer sitting in front of the
//!   Manager's save path.
//! - [`device`]: the deterministic host-capabilities-to-slot-configuration
//!   function.
//! - [`status`]: the pub/sub status event bus shared by the Manager and
//!   Coordinator.
//! - [`error`]: the crate-wide `RedstringError` type.
//! - [`time`]: timestamp/identifier helpers.

pub mod adapters;
pub mod codec;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod manager;
pub mod model;
pub mod status;
pub mod time;

pub use error::RedstringError;
pub use model::CognitiveState;

/// Test-only tracing init, mirroring the teacher's `OnceLock`-guarded
/// singleton pattern ([`manager::install_global`]) so every test process
/// installs the `fmt` subscriber at most once regardless of run order.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use std::sync::OnceLock;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();
    });
}
