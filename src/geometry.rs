//! Point type and planar geometry helpers.
//!
//! Distances come in two flavors: planar (ignoring the vertical axis, used
//! for arrival checks and path lengths) and full 3D (used for drift and
//! offset validation).

use std::fmt;

/// Coordinate quantum for [`PointKey`] (world units).
const KEY_QUANTUM: f64 = 0.01;

/// A point in the 3D world.
///
/// `radius` is the arrival/collision tolerance around the point. `seg_dist`
/// is the planar distance to the *next* point in a sequence and is only
/// meaningful after [`crate::route::RouteGenerator::split_path`] has
/// stamped it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Optional name (graph nodes and named destinations carry one).
    pub name: Option<String>,
    /// Arrival/collision tolerance.
    pub radius: f64,
    /// Planar distance to the successor in a split sequence.
    pub seg_dist: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            name: None,
            radius: 1.0,
            seg_dist: 0.0,
        }
    }

    pub fn named(x: f64, y: f64, z: f64, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(x, y, z)
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Planar distance to `other`, ignoring z.
    pub fn distance_planar(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Full 3D distance to `other`.
    pub fn distance_full(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Quantized identity key for use in maps (see [`PointKey`]).
    pub fn key(&self) -> PointKey {
        PointKey::of(self)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:.2};{:.2};{:.2}}}", self.x, self.y, self.z)?;
        if let Some(name) = &self.name {
            write!(f, " name: {}", name)?;
        }
        Ok(())
    }
}

/// Fixed-point quantized point identity.
///
/// Points are floating-point, so exact coordinate equality is too fragile
/// for map keys. Coordinates are quantized at 0.01 world units instead,
/// matching the precision split points are generated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointKey {
    qx: i64,
    qy: i64,
    qz: i64,
}

impl PointKey {
    pub fn of(p: &Point) -> Self {
        Self {
            qx: (p.x / KEY_QUANTUM).round() as i64,
            qy: (p.y / KEY_QUANTUM).round() as i64,
            qz: (p.z / KEY_QUANTUM).round() as i64,
        }
    }
}

/// Segment projection failure: the segment endpoints coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot project onto a degenerate segment")]
pub struct DegenerateSegment;

/// Orthogonal projection of `pt` onto the segment `p1`–`p2`, clamped.
///
/// Returns `p1` or `p2` when the projection falls outside the segment.
pub fn project_on_segment(pt: &Point, p1: &Point, p2: &Point) -> Result<Point, DegenerateSegment> {
    let vx = p2.x - p1.x;
    let vy = p2.y - p1.y;
    let vz = p2.z - p1.z;
    let norm_sq = vx * vx + vy * vy + vz * vz;
    if norm_sq == 0.0 {
        return Err(DegenerateSegment);
    }

    let wx = pt.x - p1.x;
    let wy = pt.y - p1.y;
    let wz = pt.z - p1.z;
    let t = (vx * wx + vy * wy + vz * wz) / norm_sq;

    if t <= 0.0 {
        return Ok(p1.clone());
    }
    if t >= 1.0 {
        return Ok(p2.clone());
    }
    Ok(Point::new(p1.x + t * vx, p1.y + t * vy, p1.z + t * vz))
}

/// Turn-sharpness metric (degrees) for the corner at `cur`, measured in
/// the plane between the edge from `next` back to `cur` and the chord
/// from `next` back to `prev`. A straight continuation scores 0, a square
/// corner 45, approaching 90 as the path folds back on itself.
pub fn turn_angle_deg(prev: &Point, cur: &Point, next: &Point) -> f64 {
    let cross = (cur.x - next.x) * (prev.y - next.y) - (prev.x - next.x) * (cur.y - next.y);
    let dot = (cur.x - next.x) * (prev.x - next.x) + (cur.y - next.y) * (prev.y - next.y);
    if dot == 0.0 {
        return 90.0;
    }
    (cross / dot).atan().to_degrees().abs()
}

/// Planar bearing from `from` to `to`, degrees in (-180, 180].
pub fn azimuth_deg(from: &Point, to: &Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Normalize a degree angle into (-180, 180].
pub fn normalize_deg(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_ignores_z() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(3.0, 4.0, 100.0);
        assert!((a.distance_planar(&b) - 5.0).abs() < 1e-9);
        assert!(a.distance_full(&b) > 100.0);
    }

    #[test]
    fn projection_inside_segment() {
        let p1 = Point::new(0.0, 0.0, 0.0);
        let p2 = Point::new(10.0, 0.0, 0.0);
        let pt = Point::new(4.0, 3.0, 0.0);
        let proj = project_on_segment(&pt, &p1, &p2).unwrap();
        assert!((proj.x - 4.0).abs() < 1e-9);
        assert!(proj.y.abs() < 1e-9);
    }

    #[test]
    fn projection_clamps_to_endpoints() {
        let p1 = Point::new(0.0, 0.0, 0.0);
        let p2 = Point::new(10.0, 0.0, 0.0);
        let before = Point::new(-5.0, 2.0, 0.0);
        let after = Point::new(15.0, 2.0, 0.0);
        assert_eq!(project_on_segment(&before, &p1, &p2).unwrap().x, 0.0);
        assert_eq!(project_on_segment(&after, &p1, &p2).unwrap().x, 10.0);
    }

    #[test]
    fn projection_rejects_degenerate_segment() {
        let p = Point::new(1.0, 2.0, 3.0);
        assert_eq!(
            project_on_segment(&Point::new(0.0, 0.0, 0.0), &p, &p),
            Err(DegenerateSegment)
        );
    }

    #[test]
    fn straight_line_has_zero_turn() {
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(5.0, 0.0, 0.0);
        let c = Point::new(10.0, 0.0, 0.0);
        assert!(turn_angle_deg(&a, &b, &c) < 1e-9);
    }

    #[test]
    fn right_angle_corner_measures_forty_five() {
        // The metric is the angle at `next` between the edge back to `cur`
        // and the chord back to `prev`: 45 degrees for a square corner.
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(5.0, 0.0, 0.0);
        let c = Point::new(5.0, 5.0, 0.0);
        assert!((turn_angle_deg(&a, &b, &c) - 45.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_wraps_into_half_open_range() {
        assert_eq!(normalize_deg(190.0), -170.0);
        assert_eq!(normalize_deg(-190.0), 170.0);
        assert_eq!(normalize_deg(180.0), 180.0);
        assert_eq!(normalize_deg(360.0), 0.0);
    }

    #[test]
    fn point_keys_quantize_nearby_coordinates() {
        let a = Point::new(1.0001, 2.0, 3.0);
        let b = Point::new(0.9999, 2.0, 3.0);
        assert_eq!(a.key(), b.key());
        let far = Point::new(1.1, 2.0, 3.0);
        assert_ne!(a.key(), far.key());
    }
}
