//! Data model: universes (registry entries) and cognitive state (graphs,
//! prototypes, edges, UI state). See spec.md §3.

pub mod state;
pub mod universe;

pub use state::{
    CanvasSize, CognitiveState, Directionality, Edge, Graph, Instance, Prototype, RightPanelTab,
    RightPanelTabType, Viewport,
};
pub use universe::{
    BrowserRole, BrowserStorageConfig, GitPriority, GitRepoConfig, LinkedRepo, LocalFileConfig,
    SourceOfTruth, SyncStatus, Universe, UniverseMetadata, slugify, uniquify_slug,
};
