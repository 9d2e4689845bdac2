//! Cognitive state: the graphs, prototypes, edges, and UI state that make
//! up a universe's payload (spec.md §3).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A positioned occurrence of a prototype inside a graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub prototype_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Instance {
    pub fn new(id: impl Into<String>, prototype_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prototype_id: prototype_id.into(),
            name: None,
            description: None,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            expanded: false,
            visible: true,
        }
    }
}

/// A named collection of instances plus their edge/definition ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub instances: HashMap<String, Instance>,
    #[serde(default)]
    pub edge_ids: Vec<String>,
    #[serde(default)]
    pub defining_node_ids: Vec<String>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instances: HashMap::new(),
            edge_ids: Vec::new(),
            defining_node_ids: Vec::new(),
        }
    }
}

/// A reusable class of node: identity, appearance, and semantic links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prototype {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub image_src: Option<String>,
    pub thumbnail_src: Option<String>,
    pub image_aspect_ratio: Option<f64>,
    pub bio: Option<String>,
    pub conjugation: Option<String>,
    pub type_node_id: Option<String>,
    #[serde(default)]
    pub external_links: Vec<String>,
    #[serde(default)]
    pub equivalent_classes: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub definition_graph_ids: Vec<String>,
    /// Ordered chains of prototype ids along a named dimension; adjacent
    /// pairs define a `subClassOf` relation on export (spec.md §4.1 rule 3).
    #[serde(default)]
    pub abstraction_chains: HashMap<String, Vec<String>>,
    pub personal_meaning: Option<String>,
    #[serde(default)]
    pub cognitive_associations: Vec<String>,
}

impl Prototype {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: color.into(),
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            image_src: None,
            thumbnail_src: None,
            image_aspect_ratio: None,
            bio: None,
            conjugation: None,
            type_node_id: None,
            external_links: Vec::new(),
            equivalent_classes: Vec::new(),
            citations: Vec::new(),
            definition_graph_ids: Vec::new(),
            abstraction_chains: HashMap::new(),
            personal_meaning: None,
            cognitive_associations: Vec::new(),
        }
    }
}

/// Which instances an edge's arrowheads point toward. Always materialized
/// as a set regardless of whether the source document carried a set or a
/// list (spec.md §3, §4.1 rule 4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directionality {
    pub arrows_toward: HashSet<String>,
}

/// A directed or non-directional link between two instances, typed by a
/// prototype.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source_id: String,
    pub destination_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub type_node_id: Option<String>,
    #[serde(default)]
    pub definition_node_ids: Vec<String>,
    #[serde(default)]
    pub directionality: Directionality,
}

impl Edge {
    pub fn new(source_id: impl Into<String>, destination_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            name: None,
            description: None,
            type_node_id: None,
            definition_node_ids: Vec::new(),
            directionality: Directionality::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RightPanelTabType {
    Home,
    Node,
    Graph,
    Search,
    Settings,
}

/// A tab in the right panel. Unknown extra keys beyond `type`/`isActive`
/// are preserved pass-through (spec.md §3), since the UI may attach
/// tab-specific payloads this crate doesn't need to understand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RightPanelTab {
    #[serde(rename = "type")]
    pub tab_type: RightPanelTabType,
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RightPanelTab {
    pub fn home(active: bool) -> Self {
        Self { tab_type: RightPanelTabType::Home, is_active: active, extra: Map::new() }
    }
}

/// Pan/zoom of the canvas. Part of `globalSpatialContext` on export; the
/// Save Coordinator's fingerprint rounds this to 2 decimals (x/y) and 4
/// decimals (zoom) so sub-pixel jitter doesn't defeat no-op detection
/// (spec.md §4.4 rule 1, §8 law 5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self { width: 0.0, height: 0.0 }
    }
}

/// The full in-memory payload of a universe: every graph, prototype, edge,
/// and the transient UI state that travels with them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveState {
    #[serde(default)]
    pub graphs: HashMap<String, Graph>,
    #[serde(default)]
    pub node_prototypes: HashMap<String, Prototype>,
    #[serde(default)]
    pub edges: HashMap<String, Edge>,
    #[serde(default)]
    pub open_graph_ids: Vec<String>,
    pub active_graph_id: Option<String>,
    pub active_definition_node_id: Option<String>,
    #[serde(default)]
    pub expanded_graph_ids: HashSet<String>,
    #[serde(default)]
    pub saved_node_ids: HashSet<String>,
    #[serde(default)]
    pub saved_graph_ids: HashSet<String>,
    #[serde(default)]
    pub right_panel_tabs: Vec<RightPanelTab>,
    #[serde(default)]
    pub show_connection_names: bool,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub canvas_size: CanvasSize,
}

impl Default for CognitiveState {
    fn default() -> Self {
        Self {
            graphs: HashMap::new(),
            node_prototypes: HashMap::new(),
            edges: HashMap::new(),
            open_graph_ids: Vec::new(),
            active_graph_id: None,
            active_definition_node_id: None,
            expanded_graph_ids: HashSet::new(),
            saved_node_ids: HashSet::new(),
            saved_graph_ids: HashSet::new(),
            right_panel_tabs: Vec::new(),
            show_connection_names: false,
            viewport: Viewport::default(),
            canvas_size: CanvasSize::default(),
        }
    }
}

impl CognitiveState {
    /// Ensure `rightPanelTabs` has at least one tab and exactly one
    /// `isActive` flag set, per spec.md §4.1 rule 5 / §8 law 1. If none are
    /// active, the `home` tab (or the first tab) is activated; if the list
    /// is empty, a single active `home` tab is installed.
    pub fn normalize_right_panel_tabs(&mut self) {
        if self.right_panel_tabs.is_empty() {
            self.right_panel_tabs.push(RightPanelTab::home(true));
            return;
        }
        if self.right_panel_tabs.iter().any(|t| t.is_active) {
            return;
        }
        if let Some(home) = self
            .right_panel_tabs
            .iter_mut()
            .find(|t| t.tab_type == RightPanelTabType::Home)
        {
            home.is_active = true;
        } else if let Some(first) = self.right_panel_tabs.first_mut() {
            first.is_active = true;
        }
    }

    /// Look up the prototype id an instance belongs to, searching all
    /// graphs for the given instance id. Used by the codec to resolve edge
    /// endpoints into prototype ids (spec.md §4.1 rule 4).
    pub fn find_instance_prototype(&self, instance_id: &str) -> Option<&str> {
        for graph in self.graphs.values() {
            if let Some(instance) = graph.instances.get(instance_id) {
                return Some(instance.prototype_id.as_str());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_installs_home_tab_when_empty() {
        let mut s = CognitiveState::default();
        s.normalize_right_panel_tabs();
        assert_eq!(s.right_panel_tabs.len(), 1);
        assert!(s.right_panel_tabs[0].is_active);
        assert_eq!(s.right_panel_tabs[0].tab_type, RightPanelTabType::Home);
    }

    #[test]
    fn normalize_leaves_existing_active_tab_alone() {
        let mut s = CognitiveState::default();
        s.right_panel_tabs.push(RightPanelTab { tab_type: RightPanelTabType::Node, is_active: true, extra: Map::new() });
        s.right_panel_tabs.push(RightPanelTab::home(false));
        s.normalize_right_panel_tabs();
        assert!(s.right_panel_tabs[0].is_active);
        assert!(!s.right_panel_tabs[1].is_active);
    }

    #[test]
    fn normalize_activates_home_over_first_when_none_active() {
        let mut s = CognitiveState::default();
        s.right_panel_tabs.push(RightPanelTab { tab_type: RightPanelTabType::Node, is_active: false, extra: Map::new() });
        s.right_panel_tabs.push(RightPanelTab::home(false));
        s.normalize_right_panel_tabs();
        assert!(!s.right_panel_tabs[0].is_active);
        assert!(s.right_panel_tabs[1].is_active);
    }

    #[test]
    fn find_instance_prototype_searches_all_graphs() {
        let mut s = CognitiveState::default();
        let mut g = Graph::new("g1");
        g.instances.insert("i1".into(), Instance::new("i1", "p1"));
        s.graphs.insert("g1".into(), g);
        assert_eq!(s.find_instance_prototype("i1"), Some("p1"));
        assert_eq!(s.find_instance_prototype("missing"), None);
    }
}
