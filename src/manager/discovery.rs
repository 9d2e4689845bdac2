//! Repository discovery: probing a Git provider for existing universe
//! documents so a user can link an already-populated repository instead of
//! starting an empty one (spec.md §4.3 `discoverUniversesInRepository`).
//!
//! The `GitProvider` contract this crate defines has no directory-listing
//! primitive (spec.md §6 "Provider contract" only has `read_file_raw` and
//! `write_file_raw`), so true repository-tree discovery is out of reach
//! here. Instead this probes a caller-supplied list of candidate slugs,
//! one `read_file_raw` per candidate path, and reports which ones resolve
//! to a parseable universe document. The embedder, which already has a
//! richer Git API (tree listing, GitHub's contents endpoint, ...) is
//! expected to supply the candidate list.

use serde_json::Value;

use crate::adapters::GitProvider;
use crate::adapters::git_repo::GitPath;
use crate::model::GitRepoConfig;

/// One universe document found while probing a repository.
#[derive(Debug, Clone)]
pub struct DiscoveredUniverse {
    pub slug: String,
    pub name: String,
    pub path: GitPath,
    pub document: Value,
}

/// Probe every candidate slug's default path (`universes/<slug>/<slug>.redstring`)
/// and keep the ones that parse as JSON with a `metadata.title` or fall back
/// to the slug itself as the display name.
pub async fn probe_candidates(provider: &dyn GitProvider, candidate_slugs: &[String]) -> Vec<DiscoveredUniverse> {
    let mut found = Vec::new();
    for slug in candidate_slugs {
        let (folder, file) = GitRepoConfig::defaults_for_slug(slug);
        let path = GitPath { universe_folder: folder, universe_file: file };
        let text = match provider.read_file_raw(&path.full_path()).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => continue,
        };
        let document: Value = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(_) => continue,
        };
        let name = document
            .pointer("/metadata/title")
            .and_then(Value::as_str)
            .unwrap_or(slug)
            .to_string();
        found.push(DiscoveredUniverse { slug: slug.clone(), name, path, document });
    }
    found
}
