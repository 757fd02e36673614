//! Sparse route graph and the `PathFinder` collaborator interface.
//!
//! The navigation core only depends on the [`PathFinder`] trait; the
//! in-crate [`RouteGraph`] is the default implementation, backed by the A*
//! search in [`search`].

mod loader;
mod search;

pub use loader::{GraphFile, LinkRecord, NodeRecord};

use crate::geometry::{Point, project_on_segment};

pub type NodeId = usize;
pub type ArcId = usize;

/// Graph lookup and search primitives the route generator relies on.
pub trait PathFinder {
    /// Nearest node to `p` with its full 3D distance, if any node exists.
    fn closest_node(&self, p: &Point) -> Option<(NodeId, f64)>;
    /// Nearest arc to `p` with the distance to its clamped projection.
    fn closest_arc(&self, p: &Point) -> Option<(ArcId, f64)>;
    fn node_position(&self, id: NodeId) -> Option<&Point>;
    /// Start and end node of an arc.
    fn arc_endpoints(&self, id: ArcId) -> Option<(NodeId, NodeId)>;
    fn node_by_name(&self, name: &str) -> Option<NodeId>;
    fn node_count(&self) -> usize;
    fn arc_count(&self) -> usize;
    /// Run a path search; the resulting node sequence is readable through
    /// [`PathFinder::path_by_coordinates`] until the next search.
    fn search_path(&mut self, from: NodeId, to: NodeId) -> bool;
    /// Node coordinates of the last successful search, in travel order.
    fn path_by_coordinates(&self) -> Vec<Point>;
    fn add_node(&mut self, position: Point) -> NodeId;
    fn add_arc(&mut self, from: NodeId, to: NodeId, weight: f64) -> Option<ArcId>;
}

/// A directed traversable edge between two nodes.
#[derive(Clone, Debug)]
pub struct GraphArc {
    pub from: NodeId,
    pub to: NodeId,
    /// Traversal cost multiplier applied on top of geometric length.
    pub weight: f64,
}

/// In-memory route graph with adjacency lists for search.
#[derive(Debug, Default)]
pub struct RouteGraph {
    nodes: Vec<Point>,
    arcs: Vec<GraphArc>,
    /// Outgoing `(neighbor, cost)` per node, kept in sync with `arcs`.
    adjacency: Vec<Vec<(NodeId, f64)>>,
    /// Node sequence of the last successful search.
    last_path: Vec<NodeId>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bidirectional pair of arcs between two nodes.
    pub fn add_two_way(&mut self, a: NodeId, b: NodeId, weight: f64) {
        let _ = self.add_arc(a, b, weight);
        let _ = self.add_arc(b, a, weight);
    }

    /// Seed the graph from a raw waypoint list, chaining arcs in order.
    pub fn load_path(&mut self, points: &[Point]) {
        let mut prev: Option<NodeId> = None;
        for p in points {
            let id = self.add_node(p.clone());
            if let Some(prev_id) = prev {
                let _ = self.add_arc(prev_id, id, 1.0);
            }
            prev = Some(id);
        }
    }

    pub(crate) fn nodes(&self) -> &[Point] {
        &self.nodes
    }

    pub(crate) fn arc(&self, id: ArcId) -> Option<&GraphArc> {
        self.arcs.get(id)
    }

    pub(crate) fn neighbors(&self, id: NodeId) -> &[(NodeId, f64)] {
        &self.adjacency[id]
    }

    pub(crate) fn set_last_path(&mut self, path: Vec<NodeId>) {
        self.last_path = path;
    }
}

impl PathFinder for RouteGraph {
    fn closest_node(&self, p: &Point) -> Option<(NodeId, f64)> {
        let mut best: Option<(NodeId, f64)> = None;
        for (id, node) in self.nodes.iter().enumerate() {
            let d = p.distance_full(node);
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((id, d)),
            }
        }
        best
    }

    fn closest_arc(&self, p: &Point) -> Option<(ArcId, f64)> {
        let mut best: Option<(ArcId, f64)> = None;
        for (id, arc) in self.arcs.iter().enumerate() {
            let a = &self.nodes[arc.from];
            let b = &self.nodes[arc.to];
            // Degenerate arcs never make it into the graph, but a zero
            // length segment is still harmless to skip here.
            let Ok(proj) = project_on_segment(p, a, b) else {
                continue;
            };
            let d = p.distance_full(&proj);
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((id, d)),
            }
        }
        best
    }

    fn node_position(&self, id: NodeId) -> Option<&Point> {
        self.nodes.get(id)
    }

    fn arc_endpoints(&self, id: ArcId) -> Option<(NodeId, NodeId)> {
        self.arcs.get(id).map(|a| (a.from, a.to))
    }

    fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.as_deref() == Some(name))
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    fn search_path(&mut self, from: NodeId, to: NodeId) -> bool {
        match search::astar(self, from, to) {
            Some(path) => {
                self.last_path = path;
                true
            }
            None => {
                self.last_path.clear();
                false
            }
        }
    }

    fn path_by_coordinates(&self) -> Vec<Point> {
        self.last_path
            .iter()
            .filter_map(|&id| self.nodes.get(id).cloned())
            .collect()
    }

    fn add_node(&mut self, position: Point) -> NodeId {
        self.nodes.push(position);
        self.adjacency.push(Vec::new());
        self.nodes.len() - 1
    }

    fn add_arc(&mut self, from: NodeId, to: NodeId, weight: f64) -> Option<ArcId> {
        if from == to || from >= self.nodes.len() || to >= self.nodes.len() {
            return None;
        }
        let cost = self.nodes[from].distance_full(&self.nodes[to]) * weight;
        self.adjacency[from].push((to, cost));
        self.arcs.push(GraphArc { from, to, weight });
        Some(self.arcs.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> RouteGraph {
        let mut g = RouteGraph::new();
        let a = g.add_node(Point::named(0.0, 0.0, 0.0, "a"));
        let b = g.add_node(Point::named(10.0, 0.0, 0.0, "b"));
        let c = g.add_node(Point::named(20.0, 0.0, 0.0, "c"));
        g.add_two_way(a, b, 1.0);
        g.add_two_way(b, c, 1.0);
        g
    }

    #[test]
    fn closest_node_picks_nearest() {
        let g = line_graph();
        let (id, dist) = g.closest_node(&Point::new(9.0, 1.0, 0.0)).unwrap();
        assert_eq!(g.node_position(id).unwrap().x, 10.0);
        assert!((dist - (1.0f64 + 1.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn closest_arc_uses_projection_distance() {
        let g = line_graph();
        // Point above the middle of the a-b arc: arc distance 2, node distance > 2.
        let p = Point::new(5.0, 2.0, 0.0);
        let (_, arc_dist) = g.closest_arc(&p).unwrap();
        assert!((arc_dist - 2.0).abs() < 1e-9);
        let (_, node_dist) = g.closest_node(&p).unwrap();
        assert!(arc_dist < node_dist);
    }

    #[test]
    fn empty_graph_has_no_closest_entities() {
        let g = RouteGraph::new();
        assert!(g.closest_node(&Point::new(0.0, 0.0, 0.0)).is_none());
        assert!(g.closest_arc(&Point::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn self_loop_arcs_are_rejected() {
        let mut g = RouteGraph::new();
        let a = g.add_node(Point::new(0.0, 0.0, 0.0));
        assert!(g.add_arc(a, a, 1.0).is_none());
        assert_eq!(g.arc_count(), 0);
    }

    #[test]
    fn node_lookup_by_name() {
        let g = line_graph();
        assert!(g.node_by_name("b").is_some());
        assert!(g.node_by_name("nope").is_none());
    }

    #[test]
    fn search_produces_ordered_coordinates() {
        let mut g = line_graph();
        let a = g.node_by_name("a").unwrap();
        let c = g.node_by_name("c").unwrap();
        assert!(g.search_path(a, c));
        let coords = g.path_by_coordinates();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0].x, 0.0);
        assert_eq!(coords[2].x, 20.0);
    }

    #[test]
    fn load_path_chains_arcs() {
        let mut g = RouteGraph::new();
        g.load_path(&[
            Point::new(0.0, 0.0, 0.0),
            Point::new(5.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
        ]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.arc_count(), 2);
    }
}
