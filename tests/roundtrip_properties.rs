//! Cross-cutting codec properties from spec.md §8: empty collections
//! materialize (law 1), legacy/v2 agreement generalizes beyond a single
//! instance (law 2), a directional edge collapses to one RDF statement
//! (law 3), and viewport jitter below rounding precision never perturbs
//! the content fingerprint across a full export/import cycle (law 5).

use redstring_core::codec::{ExportOptions, export_state, import_document};
use redstring_core::coordinator::fingerprint::fingerprint;
use redstring_core::model::{CognitiveState, Directionality, Edge, Graph, Instance, Prototype, Viewport};

fn populated_state() -> CognitiveState {
    let mut state = CognitiveState::default();

    let mut g1 = Graph::new("Graph One");
    g1.instances.insert("i1".to_string(), Instance::new("i1", "p1"));
    g1.instances.insert("i2".to_string(), Instance::new("i2", "p2"));
    state.graphs.insert("g1".to_string(), g1);

    let mut g2 = Graph::new("Graph Two");
    g2.instances.insert("i3".to_string(), Instance::new("i3", "p1"));
    state.graphs.insert("g2".to_string(), g2);

    state.node_prototypes.insert("p1".to_string(), Prototype::new("Alpha", "#111111"));
    state.node_prototypes.insert("p2".to_string(), Prototype::new("Beta", "#222222"));
    state.node_prototypes.insert("pRel".to_string(), Prototype::new("RelatesTo", "#333333"));

    let mut directed = Edge::new("i1", "i2");
    directed.type_node_id = Some("pRel".to_string());
    directed.directionality = Directionality { arrows_toward: ["i2".to_string()].into_iter().collect() };
    state.edges.insert("e1".to_string(), directed);

    state
}

/// Law 3: a directional edge (non-empty `arrowsToward`) emits exactly one
/// RDF statement, the forward one, unlike the two a non-directional edge
/// produces.
#[test]
fn directional_edge_emits_a_single_forward_rdf_statement() {
    let state = populated_state();
    let opts = ExportOptions { title: "directional".into(), ..Default::default() };
    let doc = export_state(&state, &opts).unwrap();

    let statements = doc["relationships"]["edges"]["e1"]["rdfStatements"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["subject"]["@id"], "prototype:p1");
    assert_eq!(statements[0]["object"]["@id"], "prototype:p2");
}

/// Law 1: a multi-graph, multi-prototype, multi-edge state survives a full
/// export/import cycle with every instance, prototype, and edge endpoint
/// intact.
#[test]
fn full_round_trip_preserves_every_entity() {
    let state = populated_state();
    let opts = ExportOptions { title: "full".into(), ..Default::default() };
    let doc = export_state(&state, &opts).unwrap();
    let imported = import_document(&doc);

    assert!(imported.errors.is_empty());
    assert_eq!(imported.state.graphs.len(), 2);
    assert_eq!(imported.state.graphs["g1"].instances.len(), 2);
    assert_eq!(imported.state.graphs["g2"].instances["i3"].prototype_id, "p1");
    assert_eq!(imported.state.node_prototypes.len(), 3);
    assert_eq!(imported.state.node_prototypes["p2"].name, "Beta");
    let edge = &imported.state.edges["e1"];
    assert_eq!(edge.source_id, "i1");
    assert_eq!(edge.destination_id, "i2");
    assert_eq!(edge.directionality.arrows_toward.len(), 1);
}

/// Law 2, generalized: a v2 document's `legacy` mirror and an independently
/// built flat v1 document describing the same multi-entity state agree on
/// every prototype, graph, and edge after import, not just a single
/// instance.
#[test]
fn cross_version_agreement_holds_for_a_larger_document() {
    let state = populated_state();
    let opts = ExportOptions { title: "cross-version".into(), ..Default::default() };
    let v2_doc = export_state(&state, &opts).unwrap();

    let v1_doc = serde_json::json!({
        "graphs": v2_doc["legacy"]["graphs"],
        "nodePrototypes": v2_doc["legacy"]["nodePrototypes"],
        "edges": v2_doc["legacy"]["edges"],
    });

    let mut legacy_bridge = serde_json::Map::new();
    legacy_bridge.insert("legacy".to_string(), v2_doc["legacy"].clone());
    let legacy_doc = serde_json::Value::Object(legacy_bridge);

    let from_v1 = import_document(&v1_doc);
    let from_legacy = import_document(&legacy_doc);

    assert_eq!(from_v1.state.graphs.len(), from_legacy.state.graphs.len());
    assert_eq!(from_v1.state.node_prototypes.len(), from_legacy.state.node_prototypes.len());
    for (proto_id, proto) in &from_v1.state.node_prototypes {
        assert_eq!(proto.name, from_legacy.state.node_prototypes[proto_id].name);
    }
    assert_eq!(from_v1.state.edges["e1"].destination_id, from_legacy.state.edges["e1"].destination_id);
}

/// Law 5: viewport jitter too small to survive the fingerprint's rounding
/// precision still round-trips through a full export/import cycle without
/// changing the fingerprint computed over the reconstructed state.
#[test]
fn viewport_jitter_survives_a_round_trip_without_perturbing_the_fingerprint() {
    let mut a = populated_state();
    a.viewport = Viewport { x: 10.0011, y: -4.0002, zoom: 1.00003 };
    let mut b = populated_state();
    b.viewport = Viewport { x: 10.0019, y: -3.9998, zoom: 1.00004 };

    let opts = ExportOptions { title: "jitter".into(), ..Default::default() };
    let doc_a = export_state(&a, &opts).unwrap();
    let doc_b = export_state(&b, &opts).unwrap();
    let reimported_a = import_document(&doc_a).state;
    let reimported_b = import_document(&doc_b).state;

    assert_eq!(fingerprint(&reimported_a), fingerprint(&reimported_b));
}

/// Law 1: an entirely empty state still exports and reimports cleanly,
/// with every collection present and empty rather than absent.
#[test]
fn fully_empty_state_round_trips_to_an_empty_but_well_formed_state() {
    let state = CognitiveState::default();
    let opts = ExportOptions { title: "empty".into(), ..Default::default() };
    let doc = export_state(&state, &opts).unwrap();
    let imported = import_document(&doc);

    assert!(imported.errors.is_empty());
    assert!(imported.state.graphs.is_empty());
    assert!(imported.state.node_prototypes.is_empty());
    assert!(imported.state.edges.is_empty());
    assert_eq!(imported.state.right_panel_tabs.len(), 1);
}
