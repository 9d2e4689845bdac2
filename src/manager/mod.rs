//! Universe Manager: the registry of universes, their storage slots, and
//! the load/save orchestration that ties the codec and adapters together
//! (spec.md §4.3).
//!
//! Grounded in the teacher's `DbBroker` (single serialized entry point for
//! all state mutation, reachable as a process-wide singleton via
//! [`install_global`]/[`with_global`]) but generalized from one SQLite
//! connection to three heterogeneous storage slots with failover between
//! them.

pub mod discovery;
pub mod health;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{error, warn};

use crate::adapters::git_repo::{GitRepoSlot, is_conflict_or_network};
use crate::adapters::{BrowserKvAdapter, FileHandle, LocalFileAdapter, SyncEngine};
use crate::codec::{ExportOptions, export_state, import_document};
use crate::device::DeviceProfile;
use crate::error::{RedstringError, Slot, SlotFailure};
use crate::model::{
    BrowserStorageConfig, GitRepoConfig, LocalFileConfig, SourceOfTruth, SyncStatus, Universe,
    UniverseMetadata, slugify, uniquify_slug,
};
use crate::model::CognitiveState;
use crate::status::{StatusBus, StatusEventType};
use crate::time::now_iso8601;

/// Result of a fan-out save: which enabled slots accepted the write and
/// which didn't (spec.md §4.3 "saveActiveUniverse").
#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub succeeded: Vec<Slot>,
    pub failed: Vec<SlotFailure>,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

/// Read-only view of a universe's registry entry plus its live slot health.
/// See [`UniverseManager::snapshot`].
#[derive(Debug, Clone)]
pub struct UniverseSnapshot {
    pub slug: String,
    pub name: String,
    pub source_of_truth: SourceOfTruth,
    pub local_file_enabled: bool,
    pub git_repo_enabled: bool,
    pub browser_storage_enabled: bool,
    pub is_active: bool,
    pub git_engine_status: Option<crate::adapters::EngineStatus>,
    pub unhealthy_ticks: u32,
}

/// Runs `export_state` off the async task on native, where a large document
/// can take long enough to matter; `wasm32` has no OS thread pool to offload
/// onto, so it runs inline there the way a browser idle callback would
/// (spec.md §5's single-threaded cooperative model — `exportState` is the one
/// documented exception allowed to leave the cooperative task).
#[cfg(not(target_arch = "wasm32"))]
async fn export_state_offloaded(state: CognitiveState, opts: ExportOptions<'static>) -> Result<Value, RedstringError> {
    tokio::task::spawn_blocking(move || export_state(&state, &opts))
        .await
        .map_err(|e| RedstringError::InvalidInput(format!("export task panicked: {e}")))?
}

#[cfg(target_arch = "wasm32")]
async fn export_state_offloaded(state: CognitiveState, opts: ExportOptions<'static>) -> Result<Value, RedstringError> {
    export_state(&state, &opts)
}

/// The registry of universes plus everything needed to load/save them:
/// adapter handles, per-slug Git slots, and the device profile that gates
/// default slot configuration. A process-wide singleton is reachable via
/// [`install_global`]/[`with_global`], matching the teacher's
/// `DbBroker`/`SqlitePool` pattern, but nothing requires using it that way
/// — tests construct their own.
pub struct UniverseManager {
    registry: HashMap<String, Universe>,
    active_slug: Option<String>,
    active_state: Option<CognitiveState>,
    local_adapter: Arc<dyn LocalFileAdapter>,
    browser_adapter: Arc<dyn BrowserKvAdapter>,
    local_handles: HashMap<String, FileHandle>,
    git_slots: HashMap<String, GitRepoSlot>,
    device_profile: DeviceProfile,
    status: StatusBus,
    unhealthy_counts: HashMap<String, u32>,
}

impl UniverseManager {
    /// Build a manager from a registry loaded by the embedder from the
    /// host key/value store (`unified_universes_list`, `active_universe_slug`,
    /// `universe_file_handles`); if empty, creates the default universe
    /// (spec.md §4.3 "Startup"). Normalizes every entry with the *safe*
    /// normalizer (conservative defaults, no device calls) to avoid
    /// bootstrap recursion.
    pub fn startup(
        mut loaded_registry: HashMap<String, Universe>,
        active_slug: Option<String>,
        local_handles: HashMap<String, FileHandle>,
        local_adapter: Arc<dyn LocalFileAdapter>,
        browser_adapter: Arc<dyn BrowserKvAdapter>,
        status: StatusBus,
    ) -> Self {
        let mut warnings = Vec::new();
        for universe in loaded_registry.values_mut() {
            warnings.extend(normalize_universe(universe));
        }

        if loaded_registry.is_empty() {
            let now = now_iso8601();
            let default = Universe {
                slug: "universe".to_string(),
                name: "Universe".to_string(),
                source_of_truth: SourceOfTruth::Local,
                local_file: LocalFileConfig { enabled: true, ..LocalFileConfig::default() },
                git_repo: GitRepoConfig::disabled(),
                browser_storage: BrowserStorageConfig::for_slug("universe", true),
                device_config: DeviceProfile::conservative_default(),
                metadata: UniverseMetadata::new_at(&now),
            };
            loaded_registry.insert(default.slug.clone(), default);
        }

        let active_slug = active_slug
            .filter(|s| loaded_registry.contains_key(s))
            .or_else(|| loaded_registry.keys().next().cloned());

        for warning in warnings {
            status.emit(StatusEventType::Warning, warning);
        }

        Self {
            registry: loaded_registry,
            active_slug,
            active_state: None,
            local_adapter,
            browser_adapter,
            local_handles,
            git_slots: HashMap::new(),
            device_profile: DeviceProfile::conservative_default(),
            status,
            unhealthy_counts: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &HashMap<String, Universe> {
        &self.registry
    }

    pub fn active_slug(&self) -> Option<&str> {
        self.active_slug.as_deref()
    }

    pub fn active_state(&self) -> Option<&CognitiveState> {
        self.active_state.as_ref()
    }

    pub fn status_bus(&self) -> &StatusBus {
        &self.status
    }

    /// The active universe's registered Git engine status, when one is
    /// registered in engine mode (spec.md §4.4 rule 5). `None` in
    /// direct-provider mode or when no Git slot is registered yet for the
    /// active universe — the Save Coordinator treats that as "proceed, let
    /// the save itself report the concrete failure".
    pub fn active_engine_status(&self) -> Option<crate::adapters::EngineStatus> {
        let slug = self.active_slug.as_deref()?;
        match self.git_slots.get(slug)? {
            GitRepoSlot::Engine(engine) => Some(engine.get_status()),
            GitRepoSlot::Direct { .. } => None,
        }
    }

    /// Read-only projection of a registry entry plus its live slot health,
    /// for diagnostics and tests (not a new persistence behavior — every
    /// field already exists on [`Universe`] or the registered Git slot).
    pub fn snapshot(&self, slug: &str) -> Option<UniverseSnapshot> {
        let universe = self.registry.get(slug)?;
        Some(UniverseSnapshot {
            slug: universe.slug.clone(),
            name: universe.name.clone(),
            source_of_truth: universe.source_of_truth,
            local_file_enabled: universe.local_file.enabled,
            git_repo_enabled: universe.git_repo.enabled,
            browser_storage_enabled: universe.browser_storage.enabled,
            is_active: self.active_slug.as_deref() == Some(slug),
            git_engine_status: match self.git_slots.get(slug) {
                Some(GitRepoSlot::Engine(engine)) => Some(engine.get_status()),
                Some(GitRepoSlot::Direct { .. }) | None => None,
            },
            unhealthy_ticks: self.unhealthy_counts.get(slug).copied().unwrap_or(0),
        })
    }

    /// Snapshot every universe in the registry, sorted by slug for stable
    /// diagnostic output.
    pub fn snapshot_all(&self) -> Vec<UniverseSnapshot> {
        let mut slugs: Vec<&String> = self.registry.keys().collect();
        slugs.sort();
        slugs.into_iter().filter_map(|slug| self.snapshot(slug)).collect()
    }

    /// Re-normalize every entry against the real device profile and persist
    /// only if anything changed (spec.md §4.3 "Startup": "schedule device
    /// profile initialization on a short timer; once ready, re-normalize").
    /// Returns whether any entry actually changed.
    pub fn apply_device_profile(&mut self, profile: DeviceProfile) -> bool {
        self.device_profile = profile;
        let mut changed = false;
        for universe in self.registry.values_mut() {
            let before = (universe.device_config, universe.source_of_truth, universe.local_file.enabled, universe.git_repo.enabled, universe.browser_storage.enabled);
            universe.device_config = profile;
            let warnings = normalize_universe(universe);
            for w in warnings {
                self.status.emit(StatusEventType::Warning, w);
            }
            let after = (universe.device_config, universe.source_of_truth, universe.local_file.enabled, universe.git_repo.enabled, universe.browser_storage.enabled);
            if before != after {
                changed = true;
            }
        }
        changed
    }

    // ---- registry mutation ----------------------------------------------

    /// Create a universe with local + browser enabled per the current
    /// device profile, Git disabled (spec.md §4.3 `createUniverse`).
    pub fn create_universe(&mut self, name: &str) -> String {
        let slug = self.fresh_slug(name);
        let now = now_iso8601();
        let universe = Universe {
            slug: slug.clone(),
            name: name.to_string(),
            source_of_truth: self.device_profile.source_of_truth,
            local_file: LocalFileConfig {
                enabled: self.device_profile.enable_local_file_storage,
                ..LocalFileConfig::default()
            },
            git_repo: GitRepoConfig::disabled(),
            browser_storage: BrowserStorageConfig::for_slug(&slug, true),
            device_config: self.device_profile,
            metadata: UniverseMetadata::new_at(&now),
        };
        self.registry.insert(slug.clone(), universe);
        self.normalize_slug(&slug);
        slug
    }

    /// Create a Git-only universe: local storage is never enabled
    /// regardless of device profile, since the caller explicitly opted
    /// into Git-only mode (spec.md §4.3 `createGitOnlyUniverse`).
    pub fn create_git_only_universe(&mut self, name: &str, mut git_cfg: GitRepoConfig) -> String {
        let slug = self.fresh_slug(name);
        if git_cfg.universe_folder.is_empty() || git_cfg.universe_file.is_empty() {
            let (folder, file) = GitRepoConfig::defaults_for_slug(&slug);
            git_cfg.universe_folder = folder;
            git_cfg.universe_file = file;
        }
        git_cfg.enabled = true;
        let now = now_iso8601();
        let universe = Universe {
            slug: slug.clone(),
            name: name.to_string(),
            source_of_truth: SourceOfTruth::Git,
            local_file: LocalFileConfig::default(),
            git_repo: git_cfg,
            browser_storage: BrowserStorageConfig::for_slug(&slug, true),
            device_config: self.device_profile,
            metadata: UniverseMetadata::new_at(&now),
        };
        self.registry.insert(slug.clone(), universe);
        self.normalize_slug(&slug);
        slug
    }

    /// Create a universe from a `user/repo` coordinate (the UI's "open from
    /// a Git URL" flow reduces to this once it has parsed the URL; URL
    /// parsing itself lives in the host, which is closer to the UI layer
    /// than this engine).
    pub fn create_universe_from_git_repo(&mut self, name: &str, linked_repo: crate::model::LinkedRepo) -> String {
        let (folder, file) = GitRepoConfig::defaults_for_slug(&slugify(name));
        let git_cfg = GitRepoConfig {
            enabled: true,
            linked_repo: Some(linked_repo),
            schema_path: "schema".to_string(),
            universe_folder: folder,
            universe_file: file,
            priority: crate::model::GitPriority::Primary,
        };
        self.create_git_only_universe(name, git_cfg)
    }

    fn fresh_slug(&self, name: &str) -> String {
        let base = slugify(name);
        let existing: std::collections::HashSet<String> = self.registry.keys().cloned().collect();
        uniquify_slug(&base, &existing)
    }

    fn normalize_slug(&mut self, slug: &str) {
        if let Some(universe) = self.registry.get_mut(slug) {
            for warning in normalize_universe(universe) {
                self.status.emit(StatusEventType::Warning, warning);
            }
        }
    }

    pub fn update_universe(&mut self, slug: &str, patch: impl FnOnce(&mut Universe)) -> Result<(), RedstringError> {
        let universe = self
            .registry
            .get_mut(slug)
            .ok_or_else(|| RedstringError::InvalidInput(format!("no universe {slug}")))?;
        patch(universe);
        universe.metadata.last_modified = now_iso8601();
        self.normalize_slug(slug);
        Ok(())
    }

    /// Refuses to delete the last remaining universe (spec.md §3
    /// "deleted only when >= 2 universes exist").
    pub fn delete_universe(&mut self, slug: &str) -> Result<(), RedstringError> {
        if self.registry.len() <= 1 {
            return Err(RedstringError::InvalidInput(
                "cannot delete the last remaining universe".to_string(),
            ));
        }
        if !self.registry.contains_key(slug) {
            return Err(RedstringError::InvalidInput(format!("no universe {slug}")));
        }
        self.registry.remove(slug);
        self.local_handles.remove(slug);
        self.git_slots.remove(slug);
        if self.active_slug.as_deref() == Some(slug) {
            self.active_slug = self.registry.keys().next().cloned();
        }
        Ok(())
    }

    pub fn register_local_handle(&mut self, slug: &str, handle: FileHandle) {
        self.local_handles.insert(slug.to_string(), handle);
    }

    pub fn register_git_direct(&mut self, slug: &str, provider: Arc<dyn crate::adapters::GitProvider>) {
        let universe = match self.registry.get(slug) {
            Some(u) => u,
            None => return,
        };
        let path = crate::adapters::git_repo::GitPath {
            universe_folder: universe.git_repo.universe_folder.clone(),
            universe_file: universe.git_repo.universe_file.clone(),
        };
        self.git_slots.insert(slug.to_string(), GitRepoSlot::Direct { provider, path });
    }

    /// `setGitSyncEngine`: refuses to replace an existing engine for the
    /// slug (stops the new one, returns false); re-registering the same
    /// instance is idempotent (spec.md §4.3 "Sync-engine singleton rule").
    pub fn set_git_sync_engine(&mut self, slug: &str, engine: Arc<dyn SyncEngine>) -> bool {
        if let Some(existing) = self.git_slots.get(slug) {
            if let GitRepoSlot::Engine(existing_engine) = existing {
                if Arc::ptr_eq(existing_engine, &engine) {
                    return true;
                }
                engine.stop();
                return false;
            }
        }
        self.git_slots.insert(slug.to_string(), GitRepoSlot::Engine(engine));
        true
    }

    // ---- load / save ------------------------------------------------------

    /// `loadUniverseData`: try the source-of-truth slot, then fall back
    /// through the remaining enabled slots in `local -> git -> browser`
    /// order, skipping whichever was already tried. Never fails: an
    /// all-slots failure yields an empty state (spec.md §4.3 "Load order").
    pub async fn load_universe_data(&self, slug: &str) -> Result<(CognitiveState, Vec<String>), RedstringError> {
        let universe = self
            .registry
            .get(slug)
            .ok_or_else(|| RedstringError::InvalidInput(format!("no universe {slug}")))?;

        let mut tried = Vec::new();
        let mut warnings = Vec::new();

        if universe.source_of_truth == SourceOfTruth::Git && universe.git_repo.enabled {
            tried.push(Slot::Git);
            match self.load_from_slot(universe, Slot::Git).await {
                Ok(state) => return Ok((state, warnings)),
                Err(e) => warnings.push(format!("git load failed: {e}")),
            }
        } else if universe.source_of_truth == SourceOfTruth::Local && universe.local_file.enabled {
            tried.push(Slot::Local);
            match self.load_from_slot(universe, Slot::Local).await {
                Ok(state) => return Ok((state, warnings)),
                Err(e) => warnings.push(format!("local load failed: {e}")),
            }
        }

        for slot in [Slot::Local, Slot::Git, Slot::Browser] {
            if tried.contains(&slot) {
                continue;
            }
            let enabled = match slot {
                Slot::Local => universe.local_file.enabled,
                Slot::Git => universe.git_repo.enabled,
                Slot::Browser => universe.browser_storage.enabled,
            };
            if !enabled {
                continue;
            }
            match self.load_from_slot(universe, slot).await {
                Ok(state) => return Ok((state, warnings)),
                Err(e) => warnings.push(format!("{slot} load failed: {e}")),
            }
        }

        warnings.push("all enabled slots failed; returning empty state".to_string());
        Ok((CognitiveState::default(), warnings))
    }

    async fn load_from_slot(&self, universe: &Universe, slot: Slot) -> Result<CognitiveState, RedstringError> {
        let document: Value = match slot {
            Slot::Local => {
                let handle = self.local_handles.get(&universe.slug).ok_or_else(|| RedstringError::SlotUnavailable {
                    slot: Slot::Local,
                    reason: "no file handle registered".to_string(),
                })?;
                let text = self.local_adapter.read(handle).await?;
                serde_json::from_str(&text)?
            }
            Slot::Git => {
                let git_slot = self.git_slots.get(&universe.slug).ok_or_else(|| RedstringError::SlotUnavailable {
                    slot: Slot::Git,
                    reason: "no sync engine or provider registered".to_string(),
                })?;
                git_slot.load().await?
            }
            Slot::Browser => {
                let record = self
                    .browser_adapter
                    .read(&universe.browser_storage.key)
                    .await?
                    .ok_or_else(|| RedstringError::SlotUnavailable {
                        slot: Slot::Browser,
                        reason: "no record for key".to_string(),
                    })?;
                record.data
            }
        };

        let result = import_document(&document);
        Ok(result.state)
    }

    /// `saveActiveUniverse`: exports once, fans out Git -> Local -> Browser
    /// in that order, and reports partial success (spec.md §4.3, §7).
    pub async fn save_active_universe(&mut self, state: Option<CognitiveState>) -> Result<SaveOutcome, RedstringError> {
        let slug = self
            .active_slug
            .clone()
            .ok_or_else(|| RedstringError::InvalidInput("no active universe".to_string()))?;
        if let Some(state) = state {
            self.active_state = Some(state);
        }
        let state = self
            .active_state
            .clone()
            .ok_or_else(|| RedstringError::InvalidInput("no state to save".to_string()))?;
        self.save_universe(&slug, &state).await
    }

    /// Write `state` to the active universe's local-file slot only,
    /// updating in-memory `active_state` but leaving Git/Browser
    /// untouched. Used by the Save Coordinator's (shorter) local-delay
    /// timer, independent of its (longer) Git-delay timer
    /// (spec.md §4.4 "Priority table").
    pub async fn save_local_only(&mut self, state: CognitiveState) -> Result<(), RedstringError> {
        let slug = self
            .active_slug
            .clone()
            .ok_or_else(|| RedstringError::InvalidInput("no active universe".to_string()))?;
        self.active_state = Some(state.clone());

        let universe = self
            .registry
            .get(&slug)
            .ok_or_else(|| RedstringError::InvalidInput(format!("no universe {slug}")))?;
        if !universe.local_file.enabled {
            return Ok(());
        }
        let handle = self
            .local_handles
            .get(&slug)
            .ok_or_else(|| RedstringError::SlotUnavailable { slot: Slot::Local, reason: "no file handle registered".to_string() })?;

        let opts = ExportOptions { title: universe.name.clone(), ..Default::default() };
        let document = export_state_offloaded(state.clone(), opts).await?;
        let text = serde_json::to_string_pretty(&document)?;
        self.local_adapter.write(handle, &text).await
    }

    async fn save_universe(&mut self, slug: &str, state: &CognitiveState) -> Result<SaveOutcome, RedstringError> {
        let universe = self
            .registry
            .get(slug)
            .ok_or_else(|| RedstringError::InvalidInput(format!("no universe {slug}")))?
            .clone();

        let opts = ExportOptions { title: universe.name.clone(), ..Default::default() };
        let document = export_state_offloaded(state.clone(), opts).await?;

        let mut outcome = SaveOutcome::default();

        if universe.git_repo.enabled {
            match self.save_git_with_retry(slug, &document).await {
                Ok(()) => outcome.succeeded.push(Slot::Git),
                Err(e) => {
                    if universe.source_of_truth == SourceOfTruth::Git && is_conflict_or_network(&e) {
                        warn!(slug, error = %e, "git conflict on save, reloading from git");
                        self.status.emit(
                            StatusEventType::Warning,
                            format!("{slug}: Git conflict, reloading from Git; unsaved local work may be lost"),
                        );
                        match self.load_universe_data(slug).await {
                            Ok((reloaded, _)) => self.active_state = Some(reloaded),
                            Err(reload_err) => error!(slug, error = %reload_err, "reload after git conflict failed"),
                        }
                    }
                    outcome.failed.push(SlotFailure { slot: Slot::Git, reason: e.to_string() });
                }
            }
        }

        if universe.local_file.enabled {
            match self.local_handles.get(slug) {
                Some(handle) => {
                    let text = serde_json::to_string_pretty(&document)?;
                    match self.local_adapter.write(handle, &text).await {
                        Ok(()) => outcome.succeeded.push(Slot::Local),
                        Err(e) => outcome.failed.push(SlotFailure { slot: Slot::Local, reason: e.to_string() }),
                    }
                }
                None => outcome.failed.push(SlotFailure {
                    slot: Slot::Local,
                    reason: "no file handle registered".to_string(),
                }),
            }
        }

        if universe.browser_storage.enabled {
            match self.browser_adapter.write(&universe.browser_storage.key, &document).await {
                Ok(()) => outcome.succeeded.push(Slot::Browser),
                Err(e) => outcome.failed.push(SlotFailure { slot: Slot::Browser, reason: e.to_string() }),
            }
        }

        if let Some(universe) = self.registry.get_mut(slug) {
            universe.metadata.last_sync = Some(now_iso8601());
            universe.metadata.sync_status = if outcome.is_success() { SyncStatus::Idle } else { SyncStatus::Error };
        }

        if outcome.is_success() {
            self.status.emit(StatusEventType::Success, format!("{slug}: saved to {} slot(s)", outcome.succeeded.len()));
        } else {
            self.status.emit(StatusEventType::Error, format!("{slug}: save failed on every enabled slot"));
        }

        Ok(outcome)
    }

    async fn save_git_with_retry(&self, slug: &str, document: &Value) -> Result<(), RedstringError> {
        let git_slot = self.git_slots.get(slug).ok_or_else(|| RedstringError::SlotUnavailable {
            slot: Slot::Git,
            reason: "no sync engine or provider registered".to_string(),
        })?;
        match git_slot.save(document).await {
            Ok(()) => Ok(()),
            Err(e) if is_conflict_or_network(&e) => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                git_slot.force_save(document).await
            }
            Err(e) => Err(e),
        }
    }

    /// `switchActiveUniverse`: saves the outgoing active universe (unless
    /// suppressed), swaps the pointer, then loads the new one. If the load
    /// fails, the swap has already occurred (spec.md §4.3, §9 open
    /// question (c): this crate keeps the swap and surfaces the error).
    pub async fn switch_active_universe(&mut self, slug: &str, save_current: bool) -> Result<CognitiveState, RedstringError> {
        if !self.registry.contains_key(slug) {
            return Err(RedstringError::InvalidInput(format!("no universe {slug}")));
        }
        if save_current {
            if let Some(current_slug) = self.active_slug.clone() {
                if let Some(state) = self.active_state.clone() {
                    let _ = self.save_universe(&current_slug, &state).await;
                }
            }
        }
        self.active_slug = Some(slug.to_string());
        let (state, warnings) = self.load_universe_data(slug).await?;
        for w in warnings {
            self.status.emit(StatusEventType::Warning, w);
        }
        self.active_state = Some(state.clone());
        if let Some(universe) = self.registry.get_mut(slug) {
            universe.metadata.last_opened = Some(now_iso8601());
        }
        Ok(state)
    }

    /// `reloadActiveUniverse`: re-runs the same failover chain
    /// `loadUniverseData` already implements and republishes the result.
    pub async fn reload_active_universe(&mut self) -> Result<CognitiveState, RedstringError> {
        let slug = self
            .active_slug
            .clone()
            .ok_or_else(|| RedstringError::InvalidInput("no active universe".to_string()))?;
        let (state, warnings) = self.load_universe_data(&slug).await?;
        for w in warnings {
            self.status.emit(StatusEventType::Warning, w);
        }
        self.active_state = Some(state.clone());
        Ok(state)
    }

    /// Health watchdog tick: inspect every registered engine and escalate
    /// after repeated unhealthy observations without ever restarting one
    /// (spec.md §4.3 "Health watchdog").
    pub fn watchdog_tick(&mut self) {
        health::watchdog_tick(&self.git_slots, &mut self.unhealthy_counts, &self.status);
    }

    /// Probe a set of candidate slugs against a Git provider for existing
    /// universe documents. The narrow `GitProvider` contract has no
    /// directory-listing primitive, so this accepts the candidates to try
    /// rather than walking the repository tree itself; the embedder is
    /// expected to supply candidates from its own listing of the repo
    /// (spec.md §4.3 `discoverUniversesInRepository`, simplified).
    pub async fn discover_universes_in_repository(
        &self,
        provider: &dyn crate::adapters::GitProvider,
        candidate_slugs: &[String],
    ) -> Vec<discovery::DiscoveredUniverse> {
        discovery::probe_candidates(provider, candidate_slugs).await
    }

    /// Register a discovered universe as a new registry entry pointed at
    /// the repository it was found in, and make it active
    /// (spec.md §4.3 `linkToDiscoveredUniverse`).
    pub async fn link_to_discovered_universe(
        &mut self,
        discovered: discovery::DiscoveredUniverse,
        provider: Arc<dyn crate::adapters::GitProvider>,
    ) -> Result<String, RedstringError> {
        let slug = self.fresh_slug(&discovered.slug);
        let now = now_iso8601();
        let (folder, file) = (discovered.path.universe_folder.clone(), discovered.path.universe_file.clone());
        let universe = Universe {
            slug: slug.clone(),
            name: discovered.name.clone(),
            source_of_truth: SourceOfTruth::Git,
            local_file: LocalFileConfig::default(),
            git_repo: GitRepoConfig {
                enabled: true,
                linked_repo: None,
                schema_path: "schema".to_string(),
                universe_folder: folder,
                universe_file: file,
                priority: crate::model::GitPriority::Primary,
            },
            browser_storage: BrowserStorageConfig::for_slug(&slug, true),
            device_config: self.device_profile,
            metadata: UniverseMetadata::new_at(&now),
        };
        self.registry.insert(slug.clone(), universe);
        self.normalize_slug(&slug);
        self.register_git_direct(&slug, provider);

        let (state, warnings) = self.load_universe_data(&slug).await?;
        for w in warnings {
            self.status.emit(StatusEventType::Warning, w);
        }
        self.active_slug = Some(slug.clone());
        self.active_state = Some(state);
        Ok(slug)
    }
}

/// Ensure at least one slot is enabled (browser as last resort) and that
/// `source_of_truth` names an enabled slot, demoting it with a warning
/// otherwise (spec.md §3 invariants).
fn normalize_universe(universe: &mut Universe) -> Vec<String> {
    let mut warnings = Vec::new();

    if !universe.has_enabled_slot() {
        universe.browser_storage.enabled = true;
        warnings.push(format!("{}: no slot was enabled, enabling browser storage as a last resort", universe.slug));
    }

    if !universe.source_of_truth_is_enabled() {
        let fallback = if universe.local_file.enabled {
            SourceOfTruth::Local
        } else if universe.git_repo.enabled {
            SourceOfTruth::Git
        } else {
            SourceOfTruth::Browser
        };
        warnings.push(format!(
            "{}: source of truth {:?} is not enabled, demoting to {:?}",
            universe.slug, universe.source_of_truth, fallback
        ));
        universe.source_of_truth = fallback;
    }

    warnings
}

static GLOBAL_MANAGER: OnceLock<Mutex<Option<UniverseManager>>> = OnceLock::new();

/// Process-wide singleton slot for embedders that want one Manager shared
/// across their whole process, mirroring the teacher's `global_pool()`/
/// `db_lock_map()` pattern. Call [`install_global`] once at startup; most
/// code should still prefer holding its own `UniverseManager` and passing
/// it explicitly, which is what every test in this crate does.
pub fn install_global(manager: UniverseManager) {
    let cell = GLOBAL_MANAGER.get_or_init(|| Mutex::new(None));
    *cell.lock().unwrap() = Some(manager);
}

pub fn with_global<R>(f: impl FnOnce(&mut UniverseManager) -> R) -> Option<R> {
    let cell = GLOBAL_MANAGER.get_or_init(|| Mutex::new(None));
    cell.lock().unwrap().as_mut().map(f)
}
