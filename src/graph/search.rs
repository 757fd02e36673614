//! A* search over the route graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::{NodeId, RouteGraph};

/// Node in the A* open set, ordered by f-score for a min-heap.
#[derive(Clone)]
struct OpenNode {
    id: NodeId,
    f_score: f64,
}

impl Eq for OpenNode {}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f_score = higher priority)
        other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the cheapest node sequence from `start` to `goal`.
///
/// Heuristic is straight-line distance, which is admissible because arc
/// costs are geometric length times a weight >= 1.
pub(super) fn astar(graph: &RouteGraph, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
    let nodes = graph.nodes();
    if start >= nodes.len() || goal >= nodes.len() {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let heuristic = |id: NodeId| nodes[id].distance_full(&nodes[goal]);

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();
    let mut g_score: HashMap<NodeId, f64> = HashMap::new();

    g_score.insert(start, 0.0);
    open.push(OpenNode {
        id: start,
        f_score: heuristic(start),
    });

    while let Some(current) = open.pop() {
        if current.id == goal {
            return Some(reconstruct(&came_from, start, goal));
        }

        let current_g = *g_score.get(&current.id).unwrap_or(&f64::INFINITY);

        for &(neighbor, cost) in graph.neighbors(current.id) {
            let tentative = current_g + cost;
            if tentative < *g_score.get(&neighbor).unwrap_or(&f64::INFINITY) {
                came_from.insert(neighbor, current.id);
                g_score.insert(neighbor, tentative);
                open.push(OpenNode {
                    id: neighbor,
                    f_score: tentative + heuristic(neighbor),
                });
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<NodeId, NodeId>, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
