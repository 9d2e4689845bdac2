//! `importDocument`: versioned JSON-LD document → state, never throwing
//! (spec.md §4.1).

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::codec::context::strip_id_prefix;
use crate::model::{
    CanvasSize, CognitiveState, Directionality, Edge, Graph, Instance, Prototype, RightPanelTab,
    Viewport,
};

/// Result of importing a document: the best-effort reconstructed state plus
/// a list of warnings for anything that had to fall back to a safe default.
/// Never an `Err` — a top-level parse failure still yields this shape with
/// an empty state and a non-empty `errors` list (spec.md §4.1 "Error
/// conditions").
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub state: CognitiveState,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    V2,
    LegacyBridge,
    V1,
}

fn detect_shape(doc: &Value) -> Shape {
    if doc.get("prototypeSpace").is_some() && doc.get("spatialGraphs").is_some() {
        Shape::V2
    } else if doc.get("legacy").is_some() {
        Shape::LegacyBridge
    } else {
        Shape::V1
    }
}

pub fn import_document(doc: &Value) -> ImportResult {
    let mut errors = Vec::new();

    if !doc.is_object() {
        errors.push("top-level document is not a JSON object".to_string());
        return ImportResult { state: CognitiveState::default(), errors };
    }

    let shape = detect_shape(doc);
    let (graphs_src, prototypes_src, edges_src, ui_src) = match shape {
        Shape::V2 => (
            doc.pointer("/spatialGraphs/graphs"),
            doc.pointer("/prototypeSpace/prototypes"),
            doc.pointer("/relationships/edges"),
            doc.get("userInterface"),
        ),
        Shape::LegacyBridge => {
            let legacy = doc.get("legacy");
            (
                legacy.and_then(|l| l.get("graphs")),
                legacy.and_then(|l| l.get("nodePrototypes")),
                legacy.and_then(|l| l.get("edges")),
                doc.get("userInterface"),
            )
        }
        Shape::V1 => (doc.get("graphs"), doc.get("nodePrototypes"), doc.get("edges"), Some(doc)),
    };

    let namespaced = shape == Shape::V2;

    let graphs = reconstruct_graphs(graphs_src, namespaced, &mut errors);
    let node_prototypes = reconstruct_prototypes(prototypes_src, namespaced, &mut errors);
    let edges = reconstruct_edges(edges_src, &mut errors);

    let mut state = CognitiveState {
        graphs,
        node_prototypes,
        edges,
        ..CognitiveState::default()
    };
    reconstruct_ui_state(&mut state, ui_src, namespaced);
    state.normalize_right_panel_tabs();

    if namespaced {
        if let Some(ctx) = doc.pointer("/globalSpatialContext") {
            reconstruct_spatial_context(&mut state, ctx);
        }
    } else if let Some(ctx) = doc.get("globalSpatialContext") {
        reconstruct_spatial_context(&mut state, ctx);
    }

    ImportResult { state, errors }
}

fn reconstruct_spatial_context(state: &mut CognitiveState, ctx: &Value) {
    if let Some(v) = ctx.get("viewport") {
        state.viewport = Viewport {
            x: v.get("x").and_then(Value::as_f64).unwrap_or(0.0),
            y: v.get("y").and_then(Value::as_f64).unwrap_or(0.0),
            zoom: v.get("zoom").and_then(Value::as_f64).unwrap_or(1.0),
        };
    }
    if let Some(v) = ctx.get("canvasSize") {
        state.canvas_size = CanvasSize {
            width: v.get("width").and_then(Value::as_f64).unwrap_or(0.0),
            height: v.get("height").and_then(Value::as_f64).unwrap_or(0.0),
        };
    }
}

fn as_str(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn as_string_vec(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn strip_legacy_description_prefix(desc: Option<String>) -> Option<String> {
    const PREFIX: &str = "RedString prototype: ";
    desc.map(|d| d.strip_prefix(PREFIX).map(str::to_string).unwrap_or(d))
}

/// Rule 2: instances are read from either `redstring:instances` (v2) or
/// `instances` (legacy), materialized as a mapping; coordinates default to
/// 0/0/1.0 and `visible` defaults true.
fn reconstruct_graphs(
    src: Option<&Value>,
    namespaced: bool,
    errors: &mut Vec<String>,
) -> HashMap<String, Graph> {
    let mut out = HashMap::new();
    let Some(obj) = src.and_then(Value::as_object) else {
        return out;
    };

    for (graph_id, graph_val) in obj {
        let name = if namespaced {
            graph_val.get("redstring:name").and_then(as_str)
        } else {
            graph_val.get("name").and_then(as_str)
        };
        let name = name.unwrap_or_else(|| {
            errors.push(format!("graph {graph_id}: missing name, using placeholder"));
            "Untitled Graph".to_string()
        });

        let description = if namespaced {
            graph_val.get("redstring:description").and_then(as_str)
        } else {
            graph_val.get("description").and_then(as_str)
        };

        let instances_src = if namespaced {
            graph_val.get("redstring:instances")
        } else {
            graph_val.get("instances")
        };
        let instances = reconstruct_instances(instances_src, namespaced, graph_id, errors);

        let edge_ids = if namespaced {
            as_string_vec(graph_val.get("redstring:edgeIds"))
        } else {
            as_string_vec(graph_val.get("edgeIds"))
        };
        let defining_node_ids = if namespaced {
            as_string_vec(graph_val.get("redstring:definingNodeIds"))
        } else {
            as_string_vec(graph_val.get("definingNodeIds"))
        };

        out.insert(
            graph_id.clone(),
            Graph { name, description, instances, edge_ids, defining_node_ids },
        );
    }
    out
}

fn reconstruct_instances(
    src: Option<&Value>,
    namespaced: bool,
    graph_id: &str,
    errors: &mut Vec<String>,
) -> HashMap<String, Instance> {
    let mut out = HashMap::new();
    let Some(obj) = src.and_then(Value::as_object) else {
        return out;
    };

    for (instance_id, val) in obj {
        let prototype_id = val.get("prototypeId").and_then(as_str).unwrap_or_else(|| {
            errors.push(format!(
                "graph {graph_id} instance {instance_id}: missing prototypeId, using placeholder"
            ));
            "unknown".to_string()
        });

        let (x, y, scale, expanded, visible) = if namespaced {
            let spatial = val.get("redstring:spatialContext");
            let visual = val.get("redstring:visualState");
            (
                spatial.and_then(|s| s.get("redstring:xCoordinate")).and_then(Value::as_f64).unwrap_or(0.0),
                spatial.and_then(|s| s.get("redstring:yCoordinate")).and_then(Value::as_f64).unwrap_or(0.0),
                spatial.and_then(|s| s.get("redstring:scale")).and_then(Value::as_f64).unwrap_or(1.0),
                visual.and_then(|v| v.get("redstring:expanded")).and_then(Value::as_bool).unwrap_or(false),
                visual.and_then(|v| v.get("redstring:visible")).and_then(Value::as_bool).unwrap_or(true),
            )
        } else {
            (
                val.get("x").and_then(Value::as_f64).unwrap_or(0.0),
                val.get("y").and_then(Value::as_f64).unwrap_or(0.0),
                val.get("scale").and_then(Value::as_f64).unwrap_or(1.0),
                val.get("expanded").and_then(Value::as_bool).unwrap_or(false),
                val.get("visible").and_then(Value::as_bool).unwrap_or(true),
            )
        };

        out.insert(
            instance_id.clone(),
            Instance {
                id: instance_id.clone(),
                prototype_id,
                name: val.get("name").and_then(as_str),
                description: val.get("description").and_then(as_str),
                x,
                y,
                scale,
                expanded,
                visible,
            },
        );
    }
    out
}

/// Rule 3: if `@type` includes `Prototype`, lift fields from the semantic
/// sub-objects; else treat as legacy and flatten `spatial`/`media`/
/// `semantic`/`cognitive` sub-objects (or read already-flat fields, which is
/// what this crate's own `legacy` mirror produces).
fn reconstruct_prototypes(
    src: Option<&Value>,
    namespaced: bool,
    errors: &mut Vec<String>,
) -> HashMap<String, Prototype> {
    let mut out = HashMap::new();
    let Some(obj) = src.and_then(Value::as_object) else {
        return out;
    };

    for (proto_id, val) in obj {
        let is_v2_shaped = val
            .get("@type")
            .and_then(Value::as_array)
            .map(|types| types.iter().any(|t| t.as_str() == Some("Prototype")))
            .unwrap_or(false);

        let proto = if is_v2_shaped {
            reconstruct_prototype_v2(val)
        } else {
            reconstruct_prototype_flat(val, namespaced)
        };

        let proto = match proto {
            Some(p) => p,
            None => {
                errors.push(format!("prototype {proto_id}: missing name/color, using placeholder"));
                Prototype::new("Untitled", "#888888")
            }
        };

        out.insert(proto_id.clone(), proto);
    }
    out
}

fn reconstruct_prototype_v2(val: &Value) -> Option<Prototype> {
    let name = val.get("rdfs:label").and_then(as_str)?;
    let spatial = val.get("redstring:spatial");
    let media = val.get("redstring:media");
    let semantic = val.get("redstring:semantic");
    let cognitive = val.get("redstring:cognitive");

    let color = media.and_then(|m| m.get("color")).and_then(as_str).unwrap_or_else(|| "#888888".to_string());

    Some(Prototype {
        name,
        description: strip_legacy_description_prefix(val.get("rdfs:comment").and_then(as_str)),
        color,
        x: spatial.and_then(|s| s.get("x")).and_then(Value::as_f64).unwrap_or(0.0),
        y: spatial.and_then(|s| s.get("y")).and_then(Value::as_f64).unwrap_or(0.0),
        scale: spatial.and_then(|s| s.get("scale")).and_then(Value::as_f64).unwrap_or(1.0),
        image_src: media.and_then(|m| m.get("imageSrc")).and_then(as_str),
        thumbnail_src: media.and_then(|m| m.get("thumbnailSrc")).and_then(as_str),
        image_aspect_ratio: media.and_then(|m| m.get("imageAspectRatio")).and_then(Value::as_f64),
        bio: semantic.and_then(|s| s.get("bio")).and_then(as_str),
        conjugation: semantic.and_then(|s| s.get("conjugation")).and_then(as_str),
        type_node_id: semantic.and_then(|s| s.get("typeNodeId")).and_then(as_str),
        external_links: as_string_vec(val.get("owl:sameAs")),
        equivalent_classes: as_string_vec(val.get("owl:equivalentClass")),
        citations: as_string_vec(semantic.and_then(|s| s.get("citations"))),
        definition_graph_ids: as_string_vec(semantic.and_then(|s| s.get("definitionGraphIds"))),
        abstraction_chains: reconstruct_abstraction_chains(val.get("abstractionChains")),
        personal_meaning: cognitive.and_then(|c| c.get("personalMeaning")).and_then(as_str),
        cognitive_associations: as_string_vec(cognitive.and_then(|c| c.get("cognitiveAssociations"))),
    })
}

fn reconstruct_prototype_flat(val: &Value, namespaced: bool) -> Option<Prototype> {
    let prefix = if namespaced { "redstring:" } else { "" };
    let get = |key: &str| -> Option<&Value> {
        val.get(format!("{prefix}{key}")).or_else(|| val.get(key))
    };

    let name = get("name").and_then(as_str)?;
    let color = get("color").and_then(as_str).unwrap_or_else(|| "#888888".to_string());

    let spatial = val.get("spatial");
    let media = val.get("media");
    let semantic = val.get("semantic");
    let cognitive = val.get("cognitive");

    let lookup_f64 = |key: &str, sub: Option<&Value>| -> Option<f64> {
        get(key).and_then(Value::as_f64).or_else(|| sub.and_then(|s| s.get(key)).and_then(Value::as_f64))
    };
    let lookup_str = |key: &str, sub: Option<&Value>| -> Option<String> {
        get(key).and_then(as_str).or_else(|| sub.and_then(|s| s.get(key)).and_then(as_str))
    };
    let lookup_vec = |key: &str, sub: Option<&Value>| -> Vec<String> {
        let direct = get(key);
        if direct.is_some() {
            as_string_vec(direct)
        } else {
            as_string_vec(sub.and_then(|s| s.get(key)))
        }
    };

    Some(Prototype {
        name,
        description: strip_legacy_description_prefix(get("description").and_then(as_str)),
        color,
        x: lookup_f64("x", spatial).unwrap_or(0.0),
        y: lookup_f64("y", spatial).unwrap_or(0.0),
        scale: lookup_f64("scale", spatial).unwrap_or(1.0),
        image_src: lookup_str("imageSrc", media),
        thumbnail_src: lookup_str("thumbnailSrc", media),
        image_aspect_ratio: lookup_f64("imageAspectRatio", media),
        bio: lookup_str("bio", semantic),
        conjugation: lookup_str("conjugation", semantic),
        type_node_id: lookup_str("typeNodeId", semantic),
        external_links: lookup_vec("externalLinks", semantic),
        equivalent_classes: lookup_vec("equivalentClasses", semantic),
        citations: lookup_vec("citations", semantic),
        definition_graph_ids: lookup_vec("definitionGraphIds", semantic),
        abstraction_chains: reconstruct_abstraction_chains(get("abstractionChains")),
        personal_meaning: lookup_str("personalMeaning", cognitive),
        cognitive_associations: lookup_vec("cognitiveAssociations", cognitive),
    })
}

fn reconstruct_abstraction_chains(v: Option<&Value>) -> HashMap<String, Vec<String>> {
    let Some(obj) = v.and_then(Value::as_object) else {
        return HashMap::new();
    };
    obj.iter()
        .map(|(k, v)| (k.clone(), as_string_vec(Some(v))))
        .collect()
}

/// Rule 4: native form wins if both native fields and `rdfStatements` are
/// present; otherwise a bare `Statement` is derived by stripping id
/// prefixes; otherwise fields are taken verbatim. `directionality.
/// arrowsToward` is always normalized to a set.
fn reconstruct_edges(src: Option<&Value>, errors: &mut Vec<String>) -> HashMap<String, Edge> {
    let mut out = HashMap::new();
    let Some(obj) = src.and_then(Value::as_object) else {
        return out;
    };

    for (edge_id, val) in obj {
        let has_native = val.get("sourceId").is_some() || val.get("destinationId").is_some();
        let has_rdf_statements = val.get("rdfStatements").is_some();
        let is_bare_statement = val.get("@type").and_then(Value::as_str) == Some("Statement");

        let edge = if has_native && has_rdf_statements {
            reconstruct_edge_native(edge_id, val, errors)
        } else if is_bare_statement {
            reconstruct_edge_from_statement(val)
        } else {
            reconstruct_edge_native(edge_id, val, errors)
        };

        out.insert(edge_id.clone(), edge);
    }
    out
}

fn reconstruct_edge_native(edge_id: &str, val: &Value, errors: &mut Vec<String>) -> Edge {
    let source_id = val.get("sourceId").and_then(as_str).unwrap_or_else(|| {
        errors.push(format!("edge {edge_id}: missing sourceId, using placeholder"));
        "unknown".to_string()
    });
    let destination_id = val.get("destinationId").and_then(as_str).unwrap_or_else(|| {
        errors.push(format!("edge {edge_id}: missing destinationId, using placeholder"));
        "unknown".to_string()
    });

    Edge {
        source_id,
        destination_id,
        name: val.get("name").and_then(as_str),
        description: val.get("description").and_then(as_str),
        type_node_id: val.get("typeNodeId").and_then(as_str),
        definition_node_ids: as_string_vec(val.get("definitionNodeIds")),
        directionality: reconstruct_directionality(val.get("directionality")),
    }
}

fn reconstruct_edge_from_statement(val: &Value) -> Edge {
    let subject = val.pointer("/subject/@id").and_then(Value::as_str).unwrap_or("unknown");
    let object = val.pointer("/object/@id").and_then(Value::as_str).unwrap_or("unknown");
    let predicate = val.pointer("/predicate/@id").and_then(Value::as_str);

    let mut edge = Edge::new(strip_id_prefix(subject), strip_id_prefix(object));
    edge.type_node_id = predicate.map(strip_id_prefix).map(str::to_string);
    edge
}

fn reconstruct_directionality(v: Option<&Value>) -> Directionality {
    let arrows_toward: HashSet<String> = v
        .and_then(|d| d.get("arrowsToward"))
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    Directionality { arrows_toward }
}

/// Rule 5: namespaced or plain keys; tab normalization happens once after
/// the whole document is reconstructed.
fn reconstruct_ui_state(state: &mut CognitiveState, src: Option<&Value>, namespaced: bool) {
    let Some(ui) = src else { return };
    let prefix = if namespaced { "redstring:" } else { "" };
    let get = |key: &str| -> Option<&Value> { ui.get(format!("{prefix}{key}")).or_else(|| ui.get(key)) };

    state.open_graph_ids = as_string_vec(get("openGraphIds"));
    state.active_graph_id = get("activeGraphId").and_then(as_str);
    state.active_definition_node_id = get("activeDefinitionNodeId").and_then(as_str);
    state.expanded_graph_ids = as_string_vec(get("expandedGraphIds")).into_iter().collect();
    state.saved_node_ids = as_string_vec(get("savedNodeIds")).into_iter().collect();
    state.saved_graph_ids = as_string_vec(get("savedGraphIds")).into_iter().collect();
    state.show_connection_names = get("showConnectionNames").and_then(Value::as_bool).unwrap_or(false);

    if let Some(tabs) = get("rightPanelTabs").and_then(Value::as_array) {
        state.right_panel_tabs = tabs
            .iter()
            .filter_map(|t| serde_json::from_value::<RightPanelTab>(t.clone()).ok())
            .collect();
    }
}
