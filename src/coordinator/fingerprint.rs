//! Change fingerprinting: a cheap 32-bit hash over the content that
//! matters for save suppression, so an unchanged state never re-triggers
//! a write (spec.md §4.4 rule 1).
//!
//! Reuses the same canonical per-entity projections the codec already
//! builds for export (`export_prototype_space`, `export_spatial_graphs`,
//! `export_relationships`) rather than re-deriving a second notion of
//! "content that matters" — the two have to agree on what counts as
//! meaningful change, so they're grounded in the same code.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde_json::{Map, Value, json};

use crate::codec::export::{export_prototype_space, export_relationships, export_spatial_graphs};
use crate::model::CognitiveState;

/// Round to `places` decimal digits so jitter below that precision never
/// changes the fingerprint (spec.md §4.4 rule 1, §8 law 5).
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Build the JSON projection the hash is taken over: prototypes, graphs,
/// and edges verbatim, plus the viewport rounded to 2 decimal places
/// (4 for zoom). `canvasSize` is excluded entirely — it reflects the
/// embedder's window, not the cognitive space's content.
fn canonical_projection(state: &CognitiveState) -> Value {
    let mut out = Map::new();
    out.insert("prototypes".to_string(), Value::Object(export_prototype_space(state)));
    out.insert("graphs".to_string(), Value::Object(export_spatial_graphs(state)));
    out.insert("edges".to_string(), Value::Object(export_relationships(state)));
    out.insert(
        "viewport".to_string(),
        json!({
            "x": round_to(state.viewport.x, 2),
            "y": round_to(state.viewport.y, 2),
            "zoom": round_to(state.viewport.zoom, 4),
        }),
    );
    Value::Object(out)
}

/// Deterministic 32-bit fingerprint of `state`'s content-relevant fields.
/// `serde_json::Value`'s default (non-`preserve_order`) map representation
/// is a `BTreeMap`, so the projection serializes with sorted keys
/// regardless of insertion order — the hash is stable across runs and
/// across prototype/graph/edge insertion order.
pub fn fingerprint(state: &CognitiveState) -> u32 {
    let projection = canonical_projection(state);
    let bytes = serde_json::to_vec(&projection).unwrap_or_default();
    let mut hasher = FxHasher::default();
    bytes.hash(&mut hasher);
    (hasher.finish() & 0xFFFF_FFFF) as u32
}
