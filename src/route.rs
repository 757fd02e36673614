//! Route generation: snap arbitrary start/end points onto the route
//! graph, run the path search, and resample the result into a bounded
//! waypoint sequence.

use std::sync::Mutex;

use tracing::debug;

use crate::actuator::HeightMap;
use crate::config::NavConfig;
use crate::error::NavFailure;
use crate::geometry::{Point, project_on_segment};
use crate::graph::PathFinder;

/// Consecutive points closer than this collapse into one during splitting.
const DEDUP_DISTANCE: f64 = 0.1;

/// A generated route plus an advisory condition that did not prevent
/// producing a usable route (direct shortcut, best-effort fallback).
pub struct RoutePlan {
    pub points: Vec<Point>,
    pub advisory: Option<NavFailure>,
}

/// Turns (start, destination) pairs into split waypoint sequences.
///
/// Owns the path-search backend behind a mutex so the front-end API and
/// the movement loop (drift re-routing) can share one generator.
pub struct RouteGenerator {
    graph: Mutex<Box<dyn PathFinder + Send>>,
    heights: Box<dyn HeightMap + Sync>,
    max_spacing: f64,
    default_offset: f64,
}

impl RouteGenerator {
    pub fn new(
        graph: Box<dyn PathFinder + Send>,
        heights: Box<dyn HeightMap + Sync>,
        config: &NavConfig,
    ) -> Self {
        Self {
            graph: Mutex::new(graph),
            heights,
            max_spacing: config.max_waypoint_spacing,
            default_offset: config.lazy_distance / 2.0,
        }
    }

    /// Look up a named graph node as a destination point.
    pub fn node_named(&self, name: &str) -> Option<Point> {
        let graph = self.lock_graph();
        let id = graph.node_by_name(name)?;
        graph.node_position(id).cloned()
    }

    /// Generate a split route from `start` to `destination`.
    ///
    /// `start_offset` / `end_offset` bound how far each endpoint may sit
    /// from its graph anchor; `None` means half the drift distance.
    pub fn generate(
        &self,
        start: &Point,
        destination: &Point,
        start_offset: Option<f64>,
        end_offset: Option<f64>,
    ) -> Result<RoutePlan, NavFailure> {
        let off1 = start_offset.unwrap_or(self.default_offset);
        let off2 = end_offset.unwrap_or(self.default_offset);
        if start.distance_planar(destination) < start.radius + destination.radius + 1.0 {
            return Err(NavFailure::DestinationTooClose);
        }
        let proj_radius = start.radius * 2.0;
        let (raw, advisory) =
            self.arc_split_route(start, destination, off1, off2, proj_radius)?;

        // A route collapsed to the bare destination is only usable when
        // the destination sits within the combined offset budget. Climb
        // counts, so the full 3D distance is the one measured.
        if raw.len() == 1 && start.distance_full(destination) > off1 + off2 {
            return Err(NavFailure::DestinationPointTooFar);
        }

        let points = self.split_path(raw);
        debug!(
            waypoints = points.len(),
            ?advisory,
            "route generated from {start} to {destination}"
        );
        Ok(RoutePlan { points, advisory })
    }

    /// Snap both endpoints onto the graph, search, and assemble the raw
    /// (unsplit) sequence ending at `destination`.
    fn arc_split_route(
        &self,
        start: &Point,
        destination: &Point,
        off1: f64,
        off2: f64,
        proj_radius: f64,
    ) -> Result<(Vec<Point>, Option<NavFailure>), NavFailure> {
        let mut graph = self.lock_graph();
        if graph.arc_count() == 0 {
            return Err(NavFailure::GraphEmpty);
        }

        let (node1, ndist1) = graph.closest_node(start).ok_or(NavFailure::GraphEmpty)?;
        let (node2, ndist2) = graph
            .closest_node(destination)
            .ok_or(NavFailure::GraphEmpty)?;
        let (arc1, adist1) = graph.closest_arc(start).ok_or(NavFailure::GraphEmpty)?;
        let (arc2, adist2) = graph
            .closest_arc(destination)
            .ok_or(NavFailure::GraphEmpty)?;

        let eff1 = adist1.min(ndist1);
        let eff2 = adist2.min(ndist2);

        // Detouring through the graph only pays off when at least one
        // anchor is closer than the straight line, measured in 3D.
        let direct = start.distance_full(destination);
        if eff1 > direct && eff2 > direct {
            debug!(%start, %destination, "direct route selected");
            return Ok((vec![destination.clone()], Some(NavFailure::DirectRoute)));
        }

        // The arc wins an endpoint only when strictly closer than the node.
        let mut anchor1 = node1;
        let mut start_proj = None;
        if adist1 < ndist1 {
            let (a, b) = graph.arc_endpoints(arc1).ok_or(NavFailure::GraphEmpty)?;
            if let (Some(pa), Some(pb)) = (
                graph.node_position(a).cloned(),
                graph.node_position(b).cloned(),
            ) && let Ok(proj) = project_on_segment(start, &pa, &pb)
            {
                start_proj = Some((proj.with_radius(proj_radius), pa, pb));
                anchor1 = a;
            }
        }
        let mut anchor2 = node2;
        let mut end_proj = None;
        if adist2 < ndist2 {
            let (a, b) = graph.arc_endpoints(arc2).ok_or(NavFailure::GraphEmpty)?;
            if let (Some(pa), Some(pb)) = (
                graph.node_position(a).cloned(),
                graph.node_position(b).cloned(),
            ) && let Ok(proj) = project_on_segment(destination, &pa, &pb)
            {
                end_proj = Some((proj.with_radius(proj_radius), pa, pb));
                anchor2 = a;
            }
        }

        // Offset validation against the effective anchor distance.
        let start_gap = match &start_proj {
            Some((proj, _, _)) => start.distance_planar(proj),
            None => graph
                .node_position(anchor1)
                .map(|p| start.distance_planar(p))
                .ok_or(NavFailure::GraphEmpty)?,
        };
        if start_gap > off1 {
            debug!(start_gap, off1, "start point too far from graph");
            return Err(NavFailure::StartPointTooFar);
        }
        let end_gap = match &end_proj {
            Some((proj, _, _)) => destination.distance_planar(proj),
            None => graph
                .node_position(anchor2)
                .map(|p| destination.distance_planar(p))
                .ok_or(NavFailure::GraphEmpty)?,
        };
        if end_gap > off2 {
            debug!(end_gap, off2, "destination too far from graph");
            return Err(NavFailure::DestinationPointTooFar);
        }

        if !graph.search_path(anchor1, anchor2) {
            // Best-effort movement: head straight for the destination and
            // surface the failed search as an advisory.
            debug!(?anchor1, ?anchor2, "path search failed, going direct");
            return Ok((vec![destination.clone()], Some(NavFailure::PathNotFound)));
        }
        let mut npath = graph.path_by_coordinates();

        // When an endpoint was anchored by arc projection, the projection
        // already represents the transition over that arc; drop the
        // redundant boundary node if the search kept both of its endpoints.
        if let Some((_, pa, pb)) = &start_proj
            && npath.len() > 2
            && Self::matches_arc(&npath[0], &npath[1], pa, pb)
        {
            npath.remove(0);
        }
        if let Some((_, pa, pb)) = &end_proj
            && npath.len() > 2
            && Self::matches_arc(&npath[npath.len() - 1], &npath[npath.len() - 2], pa, pb)
        {
            npath.pop();
        }

        let mut out = Vec::with_capacity(npath.len() + 3);
        if let Some((proj, _, _)) = start_proj {
            out.push(proj);
        }
        out.append(&mut npath);
        if let Some((proj, _, _)) = end_proj {
            out.push(proj);
        }
        out.push(destination.clone());
        Ok((out, None))
    }

    fn matches_arc(p1: &Point, p2: &Point, pa: &Point, pb: &Point) -> bool {
        (p1.key() == pa.key() && p2.key() == pb.key())
            || (p1.key() == pb.key() && p2.key() == pa.key())
    }

    /// Collapse near-duplicates, bound segment lengths, and stamp each
    /// point's distance to its successor.
    pub fn split_path(&self, path: Vec<Point>) -> Vec<Point> {
        let mut iter = path.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut out = vec![first];

        for next in iter {
            let nd = out[out.len() - 1].distance_planar(&next);
            if nd < DEDUP_DISTANCE {
                continue;
            }
            // Resample long legs evenly; a short remainder inside the far
            // point's radius is allowed to stay a single segment.
            if nd > self.max_spacing && nd - self.max_spacing > next.radius {
                let cur = out[out.len() - 1].clone();
                let pieces = (nd / self.max_spacing).ceil() as usize;
                for i in 1..pieces {
                    let t = i as f64 / pieces as f64;
                    let nx = round2(cur.x + (next.x - cur.x) * t);
                    let ny = round2(cur.y + (next.y - cur.y) * t);
                    out.push(Point::new(nx, ny, self.heights.height_at(nx, ny)));
                }
            }
            out.push(next);
        }

        for i in 0..out.len() {
            out[i].seg_dist = if i + 1 < out.len() {
                out[i].distance_planar(&out[i + 1])
            } else {
                0.0
            };
        }
        out
    }

    fn lock_graph(&self) -> std::sync::MutexGuard<'_, Box<dyn PathFinder + Send>> {
        match self.graph.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::FlatTerrain;
    use crate::graph::RouteGraph;

    fn generator(graph: RouteGraph) -> RouteGenerator {
        let config = NavConfig::default();
        RouteGenerator::new(Box::new(graph), Box::new(FlatTerrain), &config)
    }

    fn line_graph() -> RouteGraph {
        let mut g = RouteGraph::default();
        let a = g.add_node(Point::new(0.0, 0.0, 0.0));
        let b = g.add_node(Point::new(10.0, 0.0, 0.0));
        g.add_two_way(a, b, 1.0);
        g
    }

    #[test]
    fn empty_graph_fails() {
        let routes = generator(RouteGraph::default());
        let err = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(50.0, 0.0, 0.0),
                None,
                None,
            )
            .err();
        assert_eq!(err, Some(NavFailure::GraphEmpty));
    }

    #[test]
    fn too_close_destination_fails() {
        let routes = generator(line_graph());
        let err = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(0.5, 0.0, 0.0),
                None,
                None,
            )
            .err();
        assert_eq!(err, Some(NavFailure::DestinationTooClose));
    }

    #[test]
    fn two_node_route_ends_at_destination() {
        let routes = generator(line_graph());
        let plan = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(10.0, 0.0, 0.0),
                Some(20.0),
                Some(20.0),
            )
            .ok()
            .unwrap();
        let last = plan.points.last().unwrap();
        assert!((last.x - 10.0).abs() < 1e-9 && last.y.abs() < 1e-9);
        let total: f64 = plan.points.iter().map(|p| p.seg_dist).sum();
        assert!(total <= 12.0, "detour too long: {total}");
    }

    #[test]
    fn start_too_far_fails() {
        let routes = generator(line_graph());
        let err = routes
            .generate(
                &Point::new(0.0, 200.0, 0.0),
                &Point::new(10.0, 0.0, 0.0),
                Some(5.0),
                Some(5.0),
            )
            .err();
        assert_eq!(err, Some(NavFailure::StartPointTooFar));
    }

    #[test]
    fn straight_line_beats_distant_graph() {
        // Graph sits far away from both endpoints; direct travel wins.
        let mut g = RouteGraph::default();
        let a = g.add_node(Point::new(500.0, 500.0, 0.0));
        let b = g.add_node(Point::new(510.0, 500.0, 0.0));
        g.add_two_way(a, b, 1.0);
        let routes = generator(g);
        let plan = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(8.0, 0.0, 0.0),
                Some(1000.0),
                Some(1000.0),
            )
            .ok()
            .unwrap();
        assert_eq!(plan.advisory, Some(NavFailure::DirectRoute));
        assert_eq!(plan.points.len(), 1);
        assert!((plan.points[0].x - 8.0).abs() < 1e-9);
    }

    #[test]
    fn climb_does_not_force_the_direct_shortcut() {
        // In plan view the destination sits 4 units away, but 40 units
        // up; the anchors at distance 10 still beat the true straight
        // line, so the graph is used.
        let mut g = RouteGraph::default();
        let a = g.add_node(Point::new(0.0, 10.0, 0.0));
        let b = g.add_node(Point::new(20.0, 10.0, 0.0));
        g.add_two_way(a, b, 1.0);
        let routes = generator(g);
        let plan = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(4.0, 0.0, 40.0),
                None,
                None,
            )
            .ok()
            .unwrap();
        assert_eq!(plan.advisory, None);
    }

    #[test]
    fn vertical_drop_counts_against_offset_budget() {
        // Nearly underneath in plan view, 80 units below, graph far
        // away on both ends: the single-point shortcut is taken but
        // the 3D distance blows the offset budget.
        let mut g = RouteGraph::default();
        let a = g.add_node(Point::new(0.0, 200.0, 0.0));
        let b = g.add_node(Point::new(20.0, 200.0, 0.0));
        g.add_two_way(a, b, 1.0);
        let routes = generator(g);
        let err = routes
            .generate(
                &Point::new(0.0, 0.0, 0.0),
                &Point::new(4.0, 0.0, 80.0),
                Some(10.0),
                Some(10.0),
            )
            .err();
        assert_eq!(err, Some(NavFailure::DestinationPointTooFar));
    }

    #[test]
    fn split_dedups_and_bounds_spacing() {
        let routes = generator(line_graph());
        let path = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(0.05, 0.0, 0.0),
            Point::new(90.0, 0.0, 0.0),
        ];
        let split = routes.split_path(path);
        for pair in split.windows(2) {
            let d = pair[0].distance_planar(&pair[1]);
            assert!(d >= DEDUP_DISTANCE, "duplicate survived: {d}");
            assert!(
                d <= 20.0 + pair[1].radius + 1e-9,
                "segment too long: {d}"
            );
        }
    }

    #[test]
    fn seg_dist_telescopes() {
        let routes = generator(line_graph());
        let path = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(33.0, 7.0, 0.0),
            Point::new(61.0, -4.0, 0.0),
        ];
        let split = routes.split_path(path);
        let stamped: f64 = split.iter().map(|p| p.seg_dist).sum();
        let walked: f64 = split
            .windows(2)
            .map(|pair| pair[0].distance_planar(&pair[1]))
            .sum();
        assert!((stamped - walked).abs() < 1e-6);
    }
}
