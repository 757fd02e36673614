//! Bulk graph loading from persisted node/link records.
//!
//! Records are keyed by external numeric ids. Links referencing unknown
//! ids, self-loops, and duplicate node ids are discarded with a warning;
//! nodes landing within 0.02 units of an existing node are merged onto it,
//! keeping the larger radius and the first non-empty name.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{NavError, Result};
use crate::geometry::Point;

use super::{NodeId, PathFinder, RouteGraph};

/// Distance under which two persisted nodes are considered the same node.
const MERGE_DISTANCE: f64 = 0.02;

/// Persisted graph document.
#[derive(Debug, Default, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub node: Vec<NodeRecord>,
    #[serde(default)]
    pub link: Vec<LinkRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_radius")]
    pub radius: f64,
}

#[derive(Debug, Deserialize)]
pub struct LinkRecord {
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub one_way: bool,
}

fn default_radius() -> f64 {
    1.0
}

impl RouteGraph {
    /// Load a graph from a TOML file of node/link records.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::GraphLoad(format!("failed to read {:?}: {}", path, e)))?;
        let file: GraphFile =
            toml::from_str(&content).map_err(|e| NavError::GraphLoad(e.to_string()))?;
        Ok(Self::from_records(&file))
    }

    /// Build a graph from in-memory records.
    pub fn from_records(file: &GraphFile) -> Self {
        let mut graph = RouteGraph::new();
        let mut by_id: HashMap<i64, NodeId> = HashMap::new();

        for rec in &file.node {
            if by_id.contains_key(&rec.id) {
                warn!("duplicate node id {}, skipping", rec.id);
                continue;
            }
            let candidate = Point::new(rec.x, rec.y, rec.z);
            let id = match graph.closest_node(&candidate) {
                Some((existing, dist)) if dist <= MERGE_DISTANCE => existing,
                _ => graph.add_node(candidate),
            };
            by_id.insert(rec.id, id);

            if let Some(node) = graph.nodes.get_mut(id) {
                if node.name.is_none() && !rec.name.is_empty() {
                    node.name = Some(rec.name.clone());
                }
                if node.radius < rec.radius {
                    node.radius = rec.radius;
                }
            }
        }

        for rec in &file.link {
            if rec.start == rec.end {
                warn!("self-loop link {} -> {}, skipping", rec.start, rec.end);
                continue;
            }
            let (Some(&from), Some(&to)) = (by_id.get(&rec.start), by_id.get(&rec.end)) else {
                warn!(
                    "link {} -> {} references unknown node, skipping",
                    rec.start, rec.end
                );
                continue;
            };
            if from == to {
                // Distinct ids merged onto one node still make a self-loop.
                continue;
            }
            if rec.one_way {
                let _ = graph.add_arc(from, to, 1.0);
            } else {
                graph.add_two_way(from, to, 1.0);
            }
        }

        debug!(
            "loaded {} nodes, {} arcs",
            graph.node_count(),
            graph.arc_count()
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, x: f64, name: &str) -> NodeRecord {
        NodeRecord {
            id,
            x,
            y: 0.0,
            z: 0.0,
            name: name.to_string(),
            radius: 1.0,
        }
    }

    #[test]
    fn loads_nodes_and_bidirectional_links() {
        let file = GraphFile {
            node: vec![record(1, 0.0, "a"), record(2, 10.0, "b")],
            link: vec![LinkRecord {
                start: 1,
                end: 2,
                one_way: false,
            }],
        };
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.arc_count(), 2);
    }

    #[test]
    fn discards_self_loops_and_unknown_endpoints() {
        let file = GraphFile {
            node: vec![record(1, 0.0, "a"), record(2, 10.0, "b")],
            link: vec![
                LinkRecord {
                    start: 1,
                    end: 1,
                    one_way: false,
                },
                LinkRecord {
                    start: 1,
                    end: 99,
                    one_way: false,
                },
            ],
        };
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.arc_count(), 0);
    }

    #[test]
    fn merges_nodes_within_tolerance() {
        let file = GraphFile {
            node: vec![
                record(1, 0.0, ""),
                NodeRecord {
                    id: 2,
                    x: 0.01,
                    y: 0.0,
                    z: 0.0,
                    name: "merged".to_string(),
                    radius: 3.0,
                },
            ],
            link: vec![],
        };
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.node_count(), 1);
        let node = g.node_position(0).unwrap();
        assert_eq!(node.name.as_deref(), Some("merged"));
        assert_eq!(node.radius, 3.0);
    }

    #[test]
    fn link_between_merged_nodes_is_dropped() {
        let file = GraphFile {
            node: vec![record(1, 0.0, "a"), record(2, 0.005, "a2")],
            link: vec![LinkRecord {
                start: 1,
                end: 2,
                one_way: false,
            }],
        };
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.arc_count(), 0);
    }

    #[test]
    fn one_way_link_creates_single_arc() {
        let file = GraphFile {
            node: vec![record(1, 0.0, "a"), record(2, 10.0, "b")],
            link: vec![LinkRecord {
                start: 1,
                end: 2,
                one_way: true,
            }],
        };
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.arc_count(), 1);
    }

    #[test]
    fn parses_toml_document() {
        let doc = r#"
            [[node]]
            id = 1
            x = 0.0
            y = 0.0
            z = 0.0
            name = "start"

            [[node]]
            id = 2
            x = 10.0
            y = 0.0
            z = 0.0

            [[link]]
            start = 1
            end = 2
        "#;
        let file: GraphFile = toml::from_str(doc).unwrap();
        let g = RouteGraph::from_records(&file);
        assert_eq!(g.node_count(), 2);
        assert!(g.node_by_name("start").is_some());
    }
}
