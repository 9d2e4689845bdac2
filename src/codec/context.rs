//! Static JSON-LD `@context` vocabulary table, with a substitution point
//! for a user-domain variant (spec.md §4.1, §9 "JSON-LD context").
//!
//! Conformance here is the literal shape plus this substitution point —
//! the crate never evaluates JSON-LD semantics (no normalization, no
//! SPARQL; spec.md §1 Non-goals).

use serde_json::{Map, Value, json};

/// The default short-name → IRI bindings every `redstring-v2.0.0-semantic`
/// document carries unless a user-domain generator replaces them.
pub fn default_context_table() -> Vec<(&'static str, &'static str)> {
    vec![
        ("redstring", "https://redstring.io/vocab#"),
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("owl", "http://www.w3.org/2002/07/owl#"),
        ("xsd", "http://www.w3.org/2001/XMLSchema#"),
        ("prototype", "https://redstring.io/id/prototype/"),
        ("instance", "https://redstring.io/id/instance/"),
        ("graph", "https://redstring.io/id/graph/"),
        ("node", "https://redstring.io/id/node/"),
        ("type", "https://redstring.io/id/type/"),
    ]
}

/// A hook an embedder can use to substitute a user-domain context (e.g.
/// rebasing the `prototype:`/`instance:` IRIs under the user's own domain)
/// at export time, per spec.md §9. Receives the optional domain string
/// passed to `export_state` and returns the full `@context` object.
pub type ContextGenerator = dyn Fn(Option<&str>) -> Value + Send + Sync;

/// Build the default context table as a JSON-LD `@context` object.
pub fn default_context() -> Value {
    let mut map = Map::new();
    for (k, v) in default_context_table() {
        map.insert(k.to_string(), json!(v));
    }
    Value::Object(map)
}

/// Resolve the `@context` value for export: the injected generator if one
/// is supplied, else the static default table.
pub fn build_context(user_domain: Option<&str>, generator: Option<&ContextGenerator>) -> Value {
    match generator {
        Some(gen_fn) => gen_fn(user_domain),
        None => default_context(),
    }
}

/// Strip a known `prefix:` token from a JSON-LD id string, e.g.
/// `"prototype:abc123"` → `"abc123"`. Used by the importer when reading
/// bare RDF `Statement` entries (spec.md §4.1 import rule 4).
pub fn strip_id_prefix(value: &str) -> &str {
    match value.split_once(':') {
        Some((prefix, rest))
            if matches!(prefix, "prototype" | "instance" | "graph" | "node" | "type") =>
        {
            rest
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_redstring_and_rdf_bindings() {
        let ctx = default_context();
        assert_eq!(ctx["redstring"], "https://redstring.io/vocab#");
        assert_eq!(ctx["rdf"], "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
    }

    #[test]
    fn generator_overrides_default() {
        let gen_fn: &ContextGenerator = &|domain| json!({ "redstring": format!("https://{}/vocab#", domain.unwrap_or("example.com")) });
        let ctx = build_context(Some("acme.org"), Some(gen_fn));
        assert_eq!(ctx["redstring"], "https://acme.org/vocab#");
    }

    #[test]
    fn strip_id_prefix_removes_known_prefixes_only() {
        assert_eq!(strip_id_prefix("node:i1"), "i1");
        assert_eq!(strip_id_prefix("type:p1"), "p1");
        assert_eq!(strip_id_prefix("unrelated:thing"), "unrelated:thing");
        assert_eq!(strip_id_prefix("plain"), "plain");
    }
}
