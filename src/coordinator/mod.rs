//! Save Coordinator: priority-tiered debouncing of local and Git writes,
//! drag suppression, queue coalescing, and Git rate limiting in front of
//! the Manager's `saveActiveUniverse` (spec.md §4.4).
//!
//! Grounded in the teacher's single-serialized-writer shape (`DbBroker`)
//! but the debounce/coalesce machinery itself has no teacher counterpart
//! — the teacher commits synchronously per request. The restartable-timer
//! pattern here (a per-priority generation counter that invalidates a
//! scheduled fire when a newer change supersedes it) is the standard
//! `tokio::spawn` + `tokio::time::sleep` debounce idiom.

pub mod fingerprint;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::manager::UniverseManager;
use crate::model::CognitiveState;
use crate::status::{StatusBus, StatusEventType};
use crate::time::now_iso8601;

/// Save priority tiers, each with its own local/Git debounce delay
/// (spec.md §4.4 "Priority table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Immediate,
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Immediate, Priority::High, Priority::Normal, Priority::Low];

    /// Literal defaults from spec.md §4.4's priority table. Embedders that
    /// want the stock timing can call these directly; [`CoordinatorConfig`]
    /// is the override point for anything tuned away from the table.
    pub fn local_delay(&self) -> Duration {
        match self {
            Priority::Immediate => Duration::ZERO,
            Priority::High => Duration::from_secs(2),
            Priority::Normal => Duration::from_secs(5),
            Priority::Low => Duration::from_secs(10),
        }
    }

    /// `finalize` collapses the Git delay to 0 regardless of priority
    /// (spec.md §4.4 priority table: "or 0 when immediateSave/finalize/
    /// end-phase").
    pub fn git_delay(&self, finalize: bool) -> Duration {
        if finalize {
            return Duration::ZERO;
        }
        match self {
            Priority::Immediate => Duration::from_secs(1),
            Priority::High => Duration::from_secs(5),
            Priority::Normal => Duration::from_secs(15),
            Priority::Low => Duration::from_secs(60),
        }
    }
}

/// Coordinator tuning, overridable by the embedder (spec.md §4.4 ambient
/// config): per-priority local/Git delays plus the Git rate-limit floor.
/// `Default` matches the literal table in spec.md §4.4 exactly — the same
/// builder-with-defaults shape the teacher uses for its workspace config.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub local_delay: HashMap<Priority, Duration>,
    pub git_delay: HashMap<Priority, Duration>,
    /// `minGitInterval` defaults to 5s; pass `Duration::ZERO` for a sync
    /// engine that already batches its own commits (spec.md §4.4 rule 4).
    pub min_git_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let local_delay = Priority::ALL.into_iter().map(|p| (p, p.local_delay())).collect();
        let git_delay = Priority::ALL.into_iter().map(|p| (p, p.git_delay(false))).collect();
        Self { local_delay, git_delay, min_git_interval: Duration::from_secs(5) }
    }
}

impl CoordinatorConfig {
    fn local_delay_for(&self, priority: Priority) -> Duration {
        self.local_delay.get(&priority).copied().unwrap_or_else(|| priority.local_delay())
    }

    fn git_delay_for(&self, priority: Priority, finalize: bool) -> Duration {
        if finalize {
            return Duration::ZERO;
        }
        self.git_delay.get(&priority).copied().unwrap_or_else(|| priority.git_delay(false))
    }
}

/// What kind of UI mutation produced a change, used to look up its
/// priority tier (spec.md §4.4 "Triggered by" column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    PrototypeChange,
    InstanceOrEdgeChange,
    NodePlacement,
    PositionUpdate,
    Viewport,
    UiState,
}

impl ChangeKind {
    pub fn priority(&self) -> Priority {
        match self {
            ChangeKind::PrototypeChange => Priority::Immediate,
            ChangeKind::InstanceOrEdgeChange | ChangeKind::NodePlacement => Priority::High,
            ChangeKind::PositionUpdate => Priority::Normal,
            ChangeKind::Viewport | ChangeKind::UiState => Priority::Low,
        }
    }
}

/// Context the UI attaches to a state-change notification
/// (spec.md §4.4 rules 2 and 6).
#[derive(Debug, Clone, Copy)]
pub struct ChangeContext {
    pub kind: ChangeKind,
    pub dragging: bool,
    pub finalize: bool,
}

impl ChangeContext {
    pub fn new(kind: ChangeKind) -> Self {
        Self { kind, dragging: false, finalize: false }
    }

    pub fn dragging(mut self) -> Self {
        self.dragging = true;
        self
    }

    pub fn finalize(mut self) -> Self {
        self.finalize = true;
        self
    }
}

/// One coalesced pending write for a priority tier.
#[derive(Clone)]
struct PendingEntry {
    state: CognitiveState,
    finalize: bool,
    coalesced_count: u32,
    first_queued_at: Instant,
}

/// Snapshot returned by [`SaveCoordinator::get_status`]
/// (spec.md §4.4 "Observable events").
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    pub is_enabled: bool,
    pub is_saving: bool,
    pub is_dragging: bool,
    pub pending_by_priority: HashMap<&'static str, (u32, Duration)>,
    pub active_timers: usize,
    pub last_git_commit_time: Option<DateTime<Utc>>,
}

/// Defensive cap on total queued priorities' worth of bookkeeping
/// (spec.md §4.4 rule 3). With only 4 priorities this can never actually
/// be hit by priority count alone; it guards a future where a single
/// priority tracks more than one coalesced key.
const MAX_QUEUE_ENTRIES: usize = 50;

/// A burst of `node_position`/`rapid_update` events closer together than
/// this counts as a single drag session (spec.md §4.4 rule 2).
const DRAG_BURST_WINDOW: Duration = Duration::from_millis(100);

struct Inner {
    enabled: bool,
    pending: HashMap<Priority, PendingEntry>,
    dragging: bool,
    last_position_event_at: Option<Instant>,
    last_fingerprint: Option<u32>,
    last_git_commit_time: Option<DateTime<Utc>>,
    last_git_commit_instant: Option<Instant>,
    generation: HashMap<Priority, u64>,
    active_timers: usize,
    is_saving: bool,
    config: CoordinatorConfig,
}

impl Inner {
    fn new(config: CoordinatorConfig) -> Self {
        Self {
            enabled: true,
            pending: HashMap::new(),
            dragging: false,
            last_position_event_at: None,
            last_fingerprint: None,
            last_git_commit_time: None,
            last_git_commit_instant: None,
            generation: HashMap::new(),
            active_timers: 0,
            is_saving: false,
            config,
        }
    }

    fn next_generation(&mut self, priority: Priority) -> u64 {
        let slot = self.generation.entry(priority).or_insert(0);
        *slot += 1;
        *slot
    }
}

/// Priority-tiered debouncer sitting in front of
/// [`UniverseManager::save_active_universe`]. Cheaply cloneable; every
/// clone shares the same pending queue and timers.
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<StdMutex<Inner>>,
    manager: Arc<AsyncMutex<UniverseManager>>,
    status: StatusBus,
}

impl SaveCoordinator {
    pub fn new(manager: Arc<AsyncMutex<UniverseManager>>, status: StatusBus) -> Self {
        Self::with_config(manager, status, CoordinatorConfig::default())
    }

    /// `minGitInterval` defaults to 0 when the sync engine itself batches
    /// commits and 5s otherwise (spec.md §4.4 rule 4); callers that know
    /// their engine batches should pass `Duration::ZERO`.
    pub fn with_min_git_interval(manager: Arc<AsyncMutex<UniverseManager>>, status: StatusBus, min_git_interval: Duration) -> Self {
        Self::with_config(manager, status, CoordinatorConfig { min_git_interval, ..CoordinatorConfig::default() })
    }

    /// Full override point for the priority delay table and Git rate
    /// limit, for an embedder that wants timing other than spec.md §4.4's
    /// literal defaults.
    pub fn with_config(manager: Arc<AsyncMutex<UniverseManager>>, status: StatusBus, config: CoordinatorConfig) -> Self {
        Self { inner: Arc::new(StdMutex::new(Inner::new(config))), manager, status }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.enabled = enabled;
        if !enabled {
            inner.pending.clear();
            for priority in Priority::ALL {
                inner.next_generation(priority);
            }
        }
    }

    pub fn get_status(&self) -> CoordinatorStatus {
        let inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let pending_by_priority = inner
            .pending
            .iter()
            .map(|(priority, entry)| (priority_name(*priority), (entry.coalesced_count, now.saturating_duration_since(entry.first_queued_at))))
            .collect();
        CoordinatorStatus {
            is_enabled: inner.enabled,
            is_saving: inner.is_saving,
            is_dragging: inner.dragging,
            pending_by_priority,
            active_timers: inner.active_timers,
            last_git_commit_time: inner.last_git_commit_time,
        }
    }

    /// `onStateChange`: classify, fingerprint, and either (a) absorb into
    /// a silent drag session, (b) flush immediately because a drag just
    /// ended, or (c) coalesce into the priority's pending entry and
    /// (re)schedule its timers (spec.md §4.4).
    pub async fn on_state_change(&self, state: CognitiveState, ctx: ChangeContext) {
        let fp = fingerprint::fingerprint(&state);

        let was_dragging;
        let is_dragging_now;
        let priority = ctx.kind.priority();
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.enabled {
                return;
            }
            if inner.last_fingerprint == Some(fp) && !ctx.finalize {
                return;
            }

            let now = Instant::now();
            let burst = ctx.kind == ChangeKind::PositionUpdate
                && inner
                    .last_position_event_at
                    .map(|t| now.saturating_duration_since(t) < DRAG_BURST_WINDOW)
                    .unwrap_or(false);
            if ctx.kind == ChangeKind::PositionUpdate {
                inner.last_position_event_at = Some(now);
            }

            was_dragging = inner.dragging;
            is_dragging_now = ctx.dragging || burst;
            inner.dragging = is_dragging_now && !ctx.finalize;

            let entry = inner.pending.entry(priority).or_insert(PendingEntry {
                state: state.clone(),
                finalize: ctx.finalize,
                coalesced_count: 0,
                first_queued_at: now,
            });
            entry.state = state.clone();
            entry.finalize = entry.finalize || ctx.finalize;
            entry.coalesced_count += 1;
            inner.last_fingerprint = Some(fp);

            if inner.pending.len() > MAX_QUEUE_ENTRIES {
                evict_oldest(&mut inner.pending);
            }
        }

        if is_dragging_now && !ctx.finalize {
            // Dragging: queued above, timers deliberately not (re)scheduled.
            return;
        }

        if was_dragging && !is_dragging_now {
            // First non-drag event after a drag: flush now and commit Git
            // immediately regardless of gitDelay (spec.md §4.4 rule 2).
            self.flush_priority_local(priority).await;
            self.flush_priority_git(priority).await;
            return;
        }

        self.schedule(priority, ctx.finalize);
    }

    fn schedule(&self, priority: Priority, finalize: bool) {
        let (gen, local_delay, git_delay) = {
            let mut inner = self.inner.lock().unwrap();
            inner.active_timers += 1;
            let gen = inner.next_generation(priority);
            (gen, inner.config.local_delay_for(priority), inner.config.git_delay_for(priority, finalize))
        };

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(local_delay).await;
            this.fire_local(priority, gen).await;
        });

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(git_delay).await;
            this.fire_git(priority, gen).await;
        });
    }

    fn is_current_generation(&self, priority: Priority, gen: u64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.generation.get(&priority).copied() == Some(gen)
    }

    async fn fire_local(&self, priority: Priority, gen: u64) {
        if !self.is_current_generation(priority, gen) {
            debug!(priority = priority_name(priority), gen, "local timer fire superseded, skipping");
            return;
        }
        debug!(priority = priority_name(priority), gen, "local timer fired");
        {
            let mut inner = self.inner.lock().unwrap();
            inner.active_timers = inner.active_timers.saturating_sub(1);
        }
        self.flush_priority_local(priority).await;
    }

    async fn fire_git(&self, priority: Priority, gen: u64) {
        if !self.is_current_generation(priority, gen) {
            debug!(priority = priority_name(priority), gen, "git timer fire superseded, skipping");
            return;
        }
        debug!(priority = priority_name(priority), gen, "git timer fired");
        {
            let mut inner = self.inner.lock().unwrap();
            inner.active_timers = inner.active_timers.saturating_sub(1);
        }
        if let Some(remaining) = self.git_rate_limit_remaining() {
            debug!(priority = priority_name(priority), delay_ms = remaining.as_millis() as u64, "git rate limited, delaying commit");
            tokio::time::sleep(remaining).await;
            if !self.is_current_generation(priority, gen) {
                debug!(priority = priority_name(priority), gen, "git timer fire superseded after rate-limit delay, skipping");
                return;
            }
        }
        self.flush_priority_git(priority).await;
    }

    /// `None` if a commit may proceed now; `Some(remaining)` if the
    /// minimum Git interval hasn't elapsed yet (spec.md §4.4 rule 4).
    fn git_rate_limit_remaining(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        let last = inner.last_git_commit_instant?;
        let elapsed = Instant::now().saturating_duration_since(last);
        let min_git_interval = inner.config.min_git_interval;
        if elapsed >= min_git_interval {
            None
        } else {
            Some(min_git_interval - elapsed)
        }
    }

    async fn flush_priority_local(&self, priority: Priority) {
        let state = {
            let inner = self.inner.lock().unwrap();
            inner.pending.get(&priority).map(|e| e.state.clone())
        };
        let Some(state) = state else { return };

        let mut manager = self.manager.lock().await;
        let result = manager.save_local_only(state).await;
        drop(manager);
        match result {
            Ok(()) => {
                debug!(priority = priority_name(priority), "local write complete");
                self.status.emit(StatusEventType::Info, format!("{}: local write complete", priority_name(priority)));
            }
            Err(e) => {
                warn!(priority = priority_name(priority), error = %e, "local write failed");
                self.status.emit(StatusEventType::Warning, format!("{}: local write failed: {e}", priority_name(priority)));
            }
        }
    }

    async fn flush_priority_git(&self, priority: Priority) {
        let state = {
            let inner = self.inner.lock().unwrap();
            inner.pending.get(&priority).map(|e| e.state.clone())
        };
        let Some(state) = state else { return };

        let engine_status = {
            let manager = self.manager.lock().await;
            manager.active_engine_status()
        };
        if !self.engine_ready(priority, engine_status) {
            return;
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.is_saving = true;
        }

        let mut manager = self.manager.lock().await;
        let outcome = manager.save_active_universe(Some(state)).await;
        drop(manager);

        let mut inner = self.inner.lock().unwrap();
        inner.is_saving = false;
        match outcome {
            Ok(result) if result.is_success() => {
                inner.last_git_commit_time = Some(Utc::now());
                inner.last_git_commit_instant = Some(Instant::now());
                inner.pending.remove(&priority);
                drop(inner);
                debug!(priority = priority_name(priority), "git commit succeeded");
                self.status.emit(StatusEventType::Success, format!("{}: Git commit at {}", priority_name(priority), now_iso8601()));
            }
            Ok(_) => {
                inner.pending.remove(&priority);
                drop(inner);
                warn!(priority = priority_name(priority), "save had no successful slot");
                self.status.emit(StatusEventType::Warning, format!("{}: save had no successful slot", priority_name(priority)));
            }
            Err(e) => {
                drop(inner);
                error!(priority = priority_name(priority), error = %e, "save failed");
                self.status.emit(StatusEventType::Error, format!("{}: save failed: {e}", priority_name(priority)));
            }
        }
    }

    /// Rule 5: an unhealthy engine that has never committed is a lazy-boot
    /// case — its pending entry is dropped silently rather than retried
    /// forever, since there is nothing yet to preserve. One that has
    /// committed before gets a single retry in 10s instead of failing the
    /// flush outright. `None` (direct-provider mode, or no Git slot
    /// registered yet for the active universe) always proceeds: there is
    /// no engine health to gate on, and `save_active_universe` already
    /// reports the concrete per-slot failure on its own.
    fn engine_ready(&self, priority: Priority, status: Option<crate::adapters::EngineStatus>) -> bool {
        let Some(status) = status else {
            return true;
        };
        if status.healthy {
            return true;
        }
        if status.last_commit_time.is_none() {
            let mut inner = self.inner.lock().unwrap();
            inner.pending.remove(&priority);
            return false;
        }
        self.schedule_engine_retry(priority);
        false
    }

    /// Re-attempt a Git flush in 10s for a priority whose engine was
    /// unhealthy but has committed before (spec.md §4.4 rule 5). A
    /// superseding change before then bumps the generation and this retry
    /// becomes a no-op, same as any other scheduled timer.
    fn schedule_engine_retry(&self, priority: Priority) {
        let gen = {
            let inner = self.inner.lock().unwrap();
            inner.generation.get(&priority).copied().unwrap_or(0)
        };
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            if !this.is_current_generation(priority, gen) {
                return;
            }
            this.flush_priority_git(priority).await;
        });
    }

    /// `forceSave`: clears all timers, writes local immediately, calls
    /// `forceCommit` on Git, updates the fingerprint, and clears the queue
    /// (spec.md §4.4 rule 6).
    pub async fn force_save(&self, state: CognitiveState) -> Result<(), crate::error::RedstringError> {
        let fp = fingerprint::fingerprint(&state);
        {
            let mut inner = self.inner.lock().unwrap();
            for priority in Priority::ALL {
                inner.next_generation(priority);
            }
            inner.pending.clear();
            inner.active_timers = 0;
            inner.last_fingerprint = Some(fp);
            inner.is_saving = true;
        }

        let mut manager = self.manager.lock().await;
        manager.save_local_only(state.clone()).await?;
        let outcome = manager.save_active_universe(Some(state)).await?;
        drop(manager);

        let mut inner = self.inner.lock().unwrap();
        inner.is_saving = false;
        if outcome.is_success() {
            inner.last_git_commit_time = Some(Utc::now());
            inner.last_git_commit_instant = Some(Instant::now());
        }
        drop(inner);
        self.status.emit(StatusEventType::Success, "force save completed");
        Ok(())
    }
}

fn priority_name(priority: Priority) -> &'static str {
    match priority {
        Priority::Immediate => "immediate",
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
    }
}

fn evict_oldest(pending: &mut HashMap<Priority, PendingEntry>) {
    if let Some((&oldest, _)) = pending.iter().min_by_key(|(_, e)| e.first_queued_at) {
        pending.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::browser_kv::NativeBrowserKvAdapter;
    use crate::adapters::local_file::NativeLocalFileAdapter;
    use crate::adapters::{EngineStatus, SyncEngine};
    use crate::manager::UniverseManager;
    use crate::model::{GitRepoConfig, Prototype};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    async fn test_coordinator() -> (SaveCoordinator, tempfile::TempDir) {
        crate::init_test_tracing();
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(NativeLocalFileAdapter::new(dir.path().join("local")));
        let browser = Arc::new(NativeBrowserKvAdapter::new(dir.path().join("browser"), 10_000_000));
        let status = StatusBus::new();
        let manager = UniverseManager::startup(StdHashMap::new(), None, StdHashMap::new(), local, browser, status.clone());
        let manager = Arc::new(AsyncMutex::new(manager));
        (SaveCoordinator::new(manager, status), dir)
    }

    /// A Git-only universe with `engine` already registered and active, for
    /// exercising rule 5's readiness gate in isolation from the Local/
    /// Browser slots.
    async fn test_coordinator_with_git_engine(engine: Arc<dyn SyncEngine>) -> (SaveCoordinator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(NativeLocalFileAdapter::new(dir.path().join("local")));
        let browser = Arc::new(NativeBrowserKvAdapter::new(dir.path().join("browser"), 10_000_000));
        let status = StatusBus::new();
        let mut manager = UniverseManager::startup(StdHashMap::new(), None, StdHashMap::new(), local, browser, status.clone());
        let slug = manager.create_git_only_universe("Engine Universe", GitRepoConfig::disabled());
        manager.update_universe(&slug, |u| u.browser_storage.enabled = false).unwrap();
        assert!(manager.set_git_sync_engine(&slug, engine));
        manager.switch_active_universe(&slug, false).await.unwrap();
        let manager = Arc::new(AsyncMutex::new(manager));
        (SaveCoordinator::new(manager, status), dir)
    }

    fn state_with(name: &str) -> CognitiveState {
        let mut state = CognitiveState::default();
        state.node_prototypes.insert("p1".to_string(), Prototype::new(name, "#fff"));
        state
    }

    #[tokio::test(start_paused = true)]
    async fn identical_fingerprint_is_a_no_op() {
        let (coordinator, _dir) = test_coordinator().await;
        coordinator.on_state_change(state_with("same"), ChangeContext::new(ChangeKind::Viewport)).await;
        let status_before = coordinator.get_status();
        coordinator.on_state_change(state_with("same"), ChangeContext::new(ChangeKind::Viewport)).await;
        let status_after = coordinator.get_status();
        assert_eq!(status_before.pending_by_priority.len(), status_after.pending_by_priority.len());
    }

    #[tokio::test(start_paused = true)]
    async fn drag_burst_does_not_schedule_timers_until_drag_ends() {
        let (coordinator, _dir) = test_coordinator().await;
        for i in 0..10 {
            let mut state = state_with("dragging");
            state.viewport.x = i as f64;
            coordinator
                .on_state_change(state, ChangeContext::new(ChangeKind::PositionUpdate).dragging())
                .await;
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        let status = coordinator.get_status();
        assert_eq!(status.active_timers, 0);
        assert!(status.is_dragging);
    }

    #[tokio::test(start_paused = true)]
    async fn drag_end_flushes_and_commits_git_immediately() {
        let (coordinator, _dir) = test_coordinator().await;
        for i in 0..5 {
            let mut state = state_with("dragging");
            state.viewport.x = i as f64;
            coordinator
                .on_state_change(state, ChangeContext::new(ChangeKind::PositionUpdate).dragging())
                .await;
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        let mut final_state = state_with("placed");
        final_state.viewport.x = 99.0;
        coordinator
            .on_state_change(final_state, ChangeContext::new(ChangeKind::NodePlacement).finalize())
            .await;

        let status = coordinator.get_status();
        assert!(status.last_git_commit_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_priority_commits_within_one_second() {
        let (coordinator, _dir) = test_coordinator().await;
        coordinator
            .on_state_change(state_with("prototype changed"), ChangeContext::new(ChangeKind::PrototypeChange))
            .await;
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        let status = coordinator.get_status();
        assert!(status.last_git_commit_time.is_some());
    }

    struct NeverUsedEngine {
        commits: AtomicU32,
    }

    #[async_trait]
    impl SyncEngine for NeverUsedEngine {
        async fn update_state(&self, _document: &Value) -> Result<(), crate::error::RedstringError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn force_commit(&self, _document: &Value) -> Result<(), crate::error::RedstringError> {
            Ok(())
        }
        async fn load_from_git(&self) -> Result<Option<Value>, crate::error::RedstringError> {
            Ok(None)
        }
        fn is_healthy(&self) -> bool {
            false
        }
        fn get_status(&self) -> EngineStatus {
            EngineStatus { healthy: false, last_commit_time: None, consecutive_errors: 3, pending_commits: 0 }
        }
        fn stop(&self) {}
        fn last_commit_time(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn consecutive_errors(&self) -> u32 {
            3
        }
        fn pending_commits(&self) -> u32 {
            0
        }
    }

    /// Rule 5, lazy-boot case: an engine that has never committed and is
    /// unhealthy gets its pending entry dropped silently rather than
    /// retried forever.
    #[tokio::test(start_paused = true)]
    async fn unhealthy_never_used_engine_drops_pending_entry_silently() {
        let engine = Arc::new(NeverUsedEngine { commits: AtomicU32::new(0) });
        let (coordinator, _dir) = test_coordinator_with_git_engine(engine.clone()).await;

        coordinator.on_state_change(state_with("never used"), ChangeContext::new(ChangeKind::PrototypeChange)).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        let status = coordinator.get_status();
        assert!(status.pending_by_priority.get("immediate").is_none());
        assert_eq!(engine.commits.load(Ordering::SeqCst), 0);
    }

    struct FlippingEngine {
        healthy: AtomicBool,
        commits: AtomicU32,
    }

    #[async_trait]
    impl SyncEngine for FlippingEngine {
        async fn update_state(&self, _document: &Value) -> Result<(), crate::error::RedstringError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn force_commit(&self, _document: &Value) -> Result<(), crate::error::RedstringError> {
            Ok(())
        }
        async fn load_from_git(&self) -> Result<Option<Value>, crate::error::RedstringError> {
            Ok(None)
        }
        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
        fn get_status(&self) -> EngineStatus {
            EngineStatus { healthy: self.is_healthy(), last_commit_time: Some(Utc::now()), consecutive_errors: 0, pending_commits: 0 }
        }
        fn stop(&self) {}
        fn last_commit_time(&self) -> Option<DateTime<Utc>> {
            Some(Utc::now())
        }
        fn consecutive_errors(&self) -> u32 {
            0
        }
        fn pending_commits(&self) -> u32 {
            0
        }
    }

    /// Rule 5, retry case: an engine that has committed before but is
    /// currently unhealthy keeps its pending entry and gets a single retry
    /// 10s later, which succeeds once the engine recovers.
    #[tokio::test(start_paused = true)]
    async fn unhealthy_previously_used_engine_retries_after_ten_seconds() {
        let engine = Arc::new(FlippingEngine { healthy: AtomicBool::new(false), commits: AtomicU32::new(0) });
        let (coordinator, _dir) = test_coordinator_with_git_engine(engine.clone()).await;

        coordinator.on_state_change(state_with("retry me"), ChangeContext::new(ChangeKind::PrototypeChange)).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(engine.commits.load(Ordering::SeqCst), 0, "unhealthy engine must not commit");
        assert!(!coordinator.get_status().pending_by_priority.is_empty(), "the pending entry survives for a retry");

        engine.healthy.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(engine.commits.load(Ordering::SeqCst), 1);
    }
}
