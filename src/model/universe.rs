//! Universe registry entry: the unit a device, a Git repo, and a browser
//! profile all agree to call the same cognitive space (spec.md §3).

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::device::DeviceProfile;

/// Which slot wins on conflict and is tried first on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceOfTruth {
    Local,
    Git,
    Browser,
}

impl SourceOfTruth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOfTruth::Local => "local",
            SourceOfTruth::Git => "git",
            SourceOfTruth::Browser => "browser",
        }
    }
}

/// Priority of a Git slot relative to other enabled slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GitPriority {
    Primary,
    Secondary,
}

/// Role a browser-KV slot plays when other slots are also enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BrowserRole {
    Fallback,
    Cache,
}

/// `"user/repo"` or the decomposed form; both are accepted on input and
/// normalized internally to the struct form so callers never match on a
/// string shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkedRepo {
    Combined(String),
    Parts { user: String, repo: String },
}

impl LinkedRepo {
    pub fn user_repo(&self) -> (String, String) {
        match self {
            LinkedRepo::Combined(s) => {
                let mut parts = s.splitn(2, '/');
                let user = parts.next().unwrap_or_default().to_string();
                let repo = parts.next().unwrap_or_default().to_string();
                (user, repo)
            }
            LinkedRepo::Parts { user, repo } => (user.clone(), repo.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileConfig {
    pub enabled: bool,
    pub path: Option<String>,
    #[serde(default)]
    pub had_file_handle: bool,
    pub last_file_path: Option<String>,
    pub unavailable_reason: Option<String>,
}

impl Default for LocalFileConfig {
    fn default() -> Self {
        Self { enabled: false, path: None, had_file_handle: false, last_file_path: None, unavailable_reason: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepoConfig {
    pub enabled: bool,
    pub linked_repo: Option<LinkedRepo>,
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
    pub universe_folder: String,
    pub universe_file: String,
    #[serde(default = "default_git_priority")]
    pub priority: GitPriority,
}

fn default_schema_path() -> String {
    "schema".to_string()
}

fn default_git_priority() -> GitPriority {
    GitPriority::Secondary
}

impl GitRepoConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            linked_repo: None,
            schema_path: default_schema_path(),
            universe_folder: String::new(),
            universe_file: String::new(),
            priority: default_git_priority(),
        }
    }

    /// Derive the default folder/file names for a universe's slug, per
    /// spec.md §3: `universes/<slug>` and `<slug>.redstring`.
    pub fn defaults_for_slug(slug: &str) -> (String, String) {
        (format!("universes/{}", slug), format!("{}.redstring", slug))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserStorageConfig {
    pub enabled: bool,
    pub key: String,
    #[serde(default = "default_browser_role")]
    pub role: BrowserRole,
}

fn default_browser_role() -> BrowserRole {
    BrowserRole::Fallback
}

impl BrowserStorageConfig {
    pub fn for_slug(slug: &str, enabled: bool) -> Self {
        Self { enabled, key: format!("universe_{}", slug), role: default_browser_role() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseMetadata {
    pub created: String,
    pub last_modified: String,
    pub last_opened: Option<String>,
    pub last_sync: Option<String>,
    pub sync_status: SyncStatus,
    pub file_size: Option<u64>,
    pub node_count: Option<u64>,
}

impl UniverseMetadata {
    pub fn new_at(now: &str) -> Self {
        Self {
            created: now.to_string(),
            last_modified: now.to_string(),
            last_opened: None,
            last_sync: None,
            sync_status: SyncStatus::Idle,
            file_size: None,
            node_count: None,
        }
    }
}

/// A registry entry: one cognitive space with up to three storage slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Universe {
    pub slug: String,
    pub name: String,
    pub source_of_truth: SourceOfTruth,
    pub local_file: LocalFileConfig,
    pub git_repo: GitRepoConfig,
    pub browser_storage: BrowserStorageConfig,
    pub device_config: DeviceProfile,
    pub metadata: UniverseMetadata,
}

fn slug_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_-]+").unwrap())
}

fn collapse_dashes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-{2,}").unwrap())
}

/// Generate a stable slug from a display name: lowercase, replace
/// non-`[a-z0-9_-]` runs with a single `-`, collapse repeats, truncate to
/// 50 chars, trim trailing `-`. Uniquification against existing slugs is
/// the caller's responsibility (spec.md §3) since it requires the full
/// registry.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = slug_pattern().replace_all(&lowered, "-");
    let collapsed = collapse_dashes().replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-');
    let truncated: String = trimmed.chars().take(50).collect();
    let truncated = truncated.trim_end_matches('-');
    if truncated.is_empty() {
        "universe".to_string()
    } else {
        truncated.to_string()
    }
}

/// Make `base` unique (case-insensitively) against `existing`, appending
/// `-2`, `-3`, ... as needed. `existing` must not contain `base` itself
/// when generating a brand-new slug for a not-yet-registered universe.
pub fn uniquify_slug(base: &str, existing: &HashSet<String>) -> String {
    let lowered_existing: HashSet<String> = existing.iter().map(|s| s.to_lowercase()).collect();
    if !lowered_existing.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !lowered_existing.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

impl Universe {
    /// True if at least one slot is enabled (spec.md §3 invariant).
    pub fn has_enabled_slot(&self) -> bool {
        self.local_file.enabled || self.git_repo.enabled || self.browser_storage.enabled
    }

    /// True if `source_of_truth` names a slot that is actually enabled.
    pub fn source_of_truth_is_enabled(&self) -> bool {
        match self.source_of_truth {
            SourceOfTruth::Local => self.local_file.enabled,
            SourceOfTruth::Git => self.git_repo.enabled,
            SourceOfTruth::Browser => self.browser_storage.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_replaces_invalid_chars() {
        assert_eq!(slugify("My Cognitive Space!"), "my-cognitive-space");
    }

    #[test]
    fn slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("  Weird   Name???  "), "weird-name");
    }

    #[test]
    fn slugify_truncates_to_50() {
        let long = "a".repeat(80);
        assert_eq!(slugify(&long).len(), 50);
    }

    #[test]
    fn slugify_empty_falls_back() {
        assert_eq!(slugify("!!!"), "universe");
    }

    #[test]
    fn uniquify_appends_suffix_case_insensitively() {
        let mut existing = HashSet::new();
        existing.insert("Universe".to_string());
        let slug = uniquify_slug("universe", &existing);
        assert_eq!(slug, "universe-2");
    }

    #[test]
    fn uniquify_skips_taken_suffixes() {
        let mut existing = HashSet::new();
        existing.insert("universe".to_string());
        existing.insert("universe-2".to_string());
        assert_eq!(uniquify_slug("universe", &existing), "universe-3");
    }

    #[test]
    fn git_repo_defaults_match_slug() {
        let (folder, file) = GitRepoConfig::defaults_for_slug("my-space");
        assert_eq!(folder, "universes/my-space");
        assert_eq!(file, "my-space.redstring");
    }
}
