//! `exportState`: pure state → versioned JSON-LD document (spec.md §4.1).

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};

use crate::codec::context::{ContextGenerator, build_context};
use crate::error::RedstringError;
use crate::model::{CognitiveState, Edge, Graph, Prototype};
use crate::time::now_iso8601;

/// Current writer format string. Readers must also accept
/// `redstring-v1.0.0` and the `legacy` mixed shape (spec.md §6).
pub const FORMAT_V2: &str = "redstring-v2.0.0-semantic";

/// Metadata inputs that don't live on `CognitiveState` itself — title,
/// description, and domain are embedder-supplied; `created_at` should be
/// threaded through from the universe's existing metadata so repeated
/// exports don't reset the creation timestamp.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions<'a> {
    pub title: String,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub created_at: Option<String>,
    pub context_generator: Option<&'a ContextGenerator>,
}

/// Export `state` into a self-describing `redstring-v2.0.0-semantic`
/// document. Pure — no I/O, no clock dependency beyond the `modified`
/// timestamp (spec.md §4.1 rule 5).
pub fn export_state(state: &CognitiveState, opts: &ExportOptions) -> Result<Value, RedstringError> {
    let now = now_iso8601();
    let created = opts.created_at.clone().unwrap_or_else(|| now.clone());

    let context = build_context(opts.domain.as_deref(), opts.context_generator);

    let prototype_space = export_prototype_space(state);
    let spatial_graphs = export_spatial_graphs(state);
    let relationships = export_relationships(state);
    let legacy = export_legacy_mirror(state);

    let doc = json!({
        "@context": context,
        "@type": "CognitiveSpace",
        "format": FORMAT_V2,
        "metadata": {
            "created": created,
            "modified": now,
            "title": opts.title,
            "description": opts.description,
            "domain": opts.domain,
            "userURIs": Value::Null,
            "semanticWebCompliant": true,
            "rdfSchemaVersion": "1.0.0",
            "owlVersion": "2",
        },
        "prototypeSpace": { "prototypes": prototype_space },
        "spatialGraphs": { "graphs": spatial_graphs },
        "relationships": { "edges": relationships },
        "globalSpatialContext": {
            "viewport": {
                "x": state.viewport.x,
                "y": state.viewport.y,
                "zoom": state.viewport.zoom,
            },
            "canvasSize": {
                "width": state.canvas_size.width,
                "height": state.canvas_size.height,
            },
        },
        "userInterface": export_ui_state(state),
        "legacy": legacy,
    });

    Ok(doc)
}

fn export_ui_state(state: &CognitiveState) -> Value {
    json!({
        "redstring:openGraphIds": state.open_graph_ids,
        "redstring:activeGraphId": state.active_graph_id,
        "redstring:activeDefinitionNodeId": state.active_definition_node_id,
        "redstring:expandedGraphIds": sorted_vec(&state.expanded_graph_ids),
        "redstring:savedNodeIds": sorted_vec(&state.saved_node_ids),
        "redstring:savedGraphIds": sorted_vec(&state.saved_graph_ids),
        "redstring:rightPanelTabs": state.right_panel_tabs,
        "redstring:showConnectionNames": state.show_connection_names,
    })
}

fn sorted_vec(set: &HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.iter().cloned().collect();
    v.sort();
    v
}

/// Rule 1: each graph exports its instances as a mapping keyed by instance
/// id; each instance carries `@type: Instance`, an `rdf:type` link to its
/// prototype, spatial/visual sub-objects, a `containedIn` link to the
/// graph, and the raw `prototypeId`.
pub(crate) fn export_spatial_graphs(state: &CognitiveState) -> Map<String, Value> {
    let mut out = Map::new();
    for (graph_id, graph) in &state.graphs {
        out.insert(graph_id.clone(), export_graph(graph_id, graph));
    }
    out
}

fn export_graph(graph_id: &str, graph: &Graph) -> Value {
    let mut instances = Map::new();
    for (instance_id, instance) in &graph.instances {
        instances.insert(
            instance_id.clone(),
            json!({
                "@type": "Instance",
                "rdf:type": { "@id": format!("prototype:{}", instance.prototype_id) },
                "redstring:spatialContext": {
                    "redstring:xCoordinate": instance.x,
                    "redstring:yCoordinate": instance.y,
                    "redstring:scale": instance.scale,
                },
                "redstring:visualState": {
                    "redstring:expanded": instance.expanded,
                    "redstring:visible": instance.visible,
                },
                "containedIn": { "@id": format!("graph:{}", graph_id) },
                "prototypeId": instance.prototype_id,
                "name": instance.name,
                "description": instance.description,
            }),
        );
    }

    json!({
        "@type": "Graph",
        "redstring:name": graph.name,
        "redstring:description": graph.description,
        "redstring:instances": instances,
        "redstring:edgeIds": graph.edge_ids,
        "redstring:definingNodeIds": graph.defining_node_ids,
    })
}

/// Rule 2 + rule 3: each prototype exports with type list
/// `[Prototype, Class, Thing]`, semantic/spatial/visual/cognitive
/// sub-objects, and a `subClassOf` closed over abstraction chains.
pub(crate) fn export_prototype_space(state: &CognitiveState) -> Map<String, Value> {
    let chain_subclass_additions = compute_chain_derived_subclass_of(state);

    let mut out = Map::new();
    for (proto_id, proto) in &state.node_prototypes {
        out.insert(
            proto_id.clone(),
            export_prototype(proto_id, proto, chain_subclass_additions.get(proto_id)),
        );
    }
    out
}

/// For each prototype's `abstractionChains[dimension]`, for `i=1..len-1`,
/// the prototype at `chain[i]` gets `chain[i-1]` appended to its
/// `subClassOf`. Returns, per prototype id, the ordered (deduplicated by
/// source) list of ids to append — computed globally across all
/// prototypes' chains, since a chain can name any prototype, not just
/// itself (spec.md §4.1 rule 3).
fn compute_chain_derived_subclass_of(state: &CognitiveState) -> HashMap<String, Vec<String>> {
    let mut additions: HashMap<String, Vec<String>> = HashMap::new();
    for proto in state.node_prototypes.values() {
        for chain in proto.abstraction_chains.values() {
            for i in 1..chain.len() {
                let parent = &chain[i - 1];
                let child = &chain[i];
                let entry = additions.entry(child.clone()).or_default();
                if !entry.contains(parent) {
                    entry.push(parent.clone());
                }
            }
        }
    }
    additions
}

fn export_prototype(proto_id: &str, proto: &Prototype, chain_additions: Option<&Vec<String>>) -> Value {
    let mut subclass_of: Vec<Value> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    if let Some(type_node_id) = &proto.type_node_id {
        let id = format!("prototype:{}", type_node_id);
        if seen_ids.insert(id.clone()) {
            subclass_of.push(json!({ "@id": id }));
        }
    }
    if let Some(additions) = chain_additions {
        for parent_id in additions {
            let id = format!("prototype:{}", parent_id);
            if seen_ids.insert(id.clone()) {
                subclass_of.push(json!({ "@id": id }));
            }
        }
    }

    let _ = proto_id;
    json!({
        "@type": ["Prototype", "Class", "Thing"],
        "rdfs:label": proto.name,
        "rdfs:comment": proto.description,
        "rdfs:seeAlso": proto.citations,
        "rdfs:isDefinedBy": proto.definition_graph_ids,
        "owl:sameAs": proto.external_links,
        "owl:equivalentClass": proto.equivalent_classes,
        "subClassOf": subclass_of,
        "redstring:spatial": {
            "x": proto.x,
            "y": proto.y,
            "scale": proto.scale,
        },
        "redstring:media": {
            "color": proto.color,
            "imageSrc": proto.image_src,
            "thumbnailSrc": proto.thumbnail_src,
            "imageAspectRatio": proto.image_aspect_ratio,
        },
        "redstring:semantic": {
            "bio": proto.bio,
            "conjugation": proto.conjugation,
            "typeNodeId": proto.type_node_id,
            "citations": proto.citations,
            "definitionGraphIds": proto.definition_graph_ids,
        },
        "redstring:cognitive": {
            "personalMeaning": proto.personal_meaning,
            "cognitiveAssociations": proto.cognitive_associations,
        },
        "abstractionChains": proto.abstraction_chains,
    })
}

/// Rule 4: each edge is exported in native form *and* RDF-statement form.
pub(crate) fn export_relationships(state: &CognitiveState) -> Map<String, Value> {
    let mut out = Map::new();
    for (edge_id, edge) in &state.edges {
        out.insert(edge_id.clone(), export_edge(state, edge));
    }
    out
}

fn export_edge(state: &CognitiveState, edge: &Edge) -> Value {
    let mut arrows: Vec<String> = edge.directionality.arrows_toward.iter().cloned().collect();
    arrows.sort();

    let rdf_statements = build_rdf_statements(state, edge);

    json!({
        "@type": "Relationship",
        "sourceId": edge.source_id,
        "destinationId": edge.destination_id,
        "name": edge.name,
        "description": edge.description,
        "typeNodeId": edge.type_node_id,
        "definitionNodeIds": edge.definition_node_ids,
        "directionality": { "arrowsToward": arrows },
        "rdfStatements": rdf_statements,
    })
}

/// Resolve `sourcePrototypeId`/`destinationPrototypeId` by looking up each
/// endpoint instance across all graphs, and `predicatePrototypeId` from the
/// first `definitionNodeIds` entry (preferring its `prototypeId`, else its
/// `typeNodeId`), falling back to the edge's own `typeNodeId`. If all three
/// resolve, emit one forward `Statement`; if `arrowsToward` is empty,
/// also emit a reverse `Statement` (spec.md §4.1 rule 4, §8 law 3).
fn build_rdf_statements(state: &CognitiveState, edge: &Edge) -> Vec<Value> {
    let source_proto = state.find_instance_prototype(&edge.source_id);
    let dest_proto = state.find_instance_prototype(&edge.destination_id);
    let predicate_proto = resolve_predicate_prototype_id(state, edge);

    let (Some(source_proto), Some(dest_proto), Some(predicate_proto)) =
        (source_proto, dest_proto, predicate_proto)
    else {
        return Vec::new();
    };

    let forward = json!({
        "@type": "Statement",
        "subject": { "@id": format!("prototype:{}", source_proto) },
        "predicate": { "@id": format!("type:{}", predicate_proto) },
        "object": { "@id": format!("prototype:{}", dest_proto) },
    });

    if edge.directionality.arrows_toward.is_empty() {
        let reverse = json!({
            "@type": "Statement",
            "subject": { "@id": format!("prototype:{}", dest_proto) },
            "predicate": { "@id": format!("type:{}", predicate_proto) },
            "object": { "@id": format!("prototype:{}", source_proto) },
        });
        vec![forward, reverse]
    } else {
        vec![forward]
    }
}

fn resolve_predicate_prototype_id(state: &CognitiveState, edge: &Edge) -> Option<String> {
    if let Some(first) = edge.definition_node_ids.first() {
        if let Some(proto_id) = state.find_instance_prototype(first) {
            return Some(proto_id.to_string());
        }
        if let Some(proto) = state.node_prototypes.get(first) {
            if let Some(type_node_id) = &proto.type_node_id {
                return Some(type_node_id.clone());
            }
        }
    }
    edge.type_node_id.clone()
}

/// A flat mirror of graphs/prototypes/edges in v1 shape, so readers of
/// older writers can still parse this document (spec.md §4.1).
fn export_legacy_mirror(state: &CognitiveState) -> Value {
    let graphs = serde_json::to_value(&state.graphs).unwrap_or(Value::Null);
    let prototypes = serde_json::to_value(&state.node_prototypes).unwrap_or(Value::Null);
    let edges = serde_json::to_value(&state.edges).unwrap_or(Value::Null);
    json!({ "graphs": graphs, "nodePrototypes": prototypes, "edges": edges })
}
