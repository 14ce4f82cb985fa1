// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use glam::Vec2;

use crate::geometry::ConvexPolygon;

/// Penetration reported when two shapes do not overlap.
pub const NO_COLLISION: f32 = -1.0;

/// Result of the narrow phase for one pair of shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionData {
    /// Unit separation axis, pointing from the first shape toward the second.
    pub axis: Vec2,
    /// Distance along `axis` that separates the shapes. [`NO_COLLISION`] when
    /// they do not overlap.
    pub minimum_translation: f32,
    /// Whether `axis` is an edge normal of the second shape.
    pub axis_from_b: bool,
    /// Midpoint of the clipped contact segment.
    pub contact_point: Vec2,
}

impl CollisionData {
    pub const NONE: CollisionData = CollisionData {
        axis: Vec2::ZERO,
        minimum_translation: NO_COLLISION,
        axis_from_b: false,
        contact_point: Vec2::ZERO,
    };

    pub fn is_colliding(&self) -> bool {
        self.minimum_translation >= 0.0
    }

    /// The same contact seen from the second shape.
    pub fn reversed(&self) -> CollisionData {
        CollisionData {
            axis: -self.axis,
            axis_from_b: !self.axis_from_b,
            ..*self
        }
    }

    /// Displacement of the second shape that would separate the pair.
    pub fn translation(&self) -> Vec2 {
        self.axis * self.minimum_translation
    }
}

/// Feature of a polygon used for clipping: the edge `start -> end` and the
/// vertex furthest along the separation axis.
#[derive(Debug, Clone, Copy)]
struct Edge {
    max: Vec2,
    start: Vec2,
    end: Vec2,
}

impl Edge {
    fn direction(&self) -> Vec2 {
        (self.end - self.start).normalize_or_zero()
    }
}

/// Separating axis test between two convex polygons, followed by reference /
/// incident edge clipping for the contact point.
pub fn collide(a: &ConvexPolygon, b: &ConvexPolygon) -> CollisionData {
    let Some((axis_a, overlap_a)) = min_overlap_axis(a, b) else {
        return CollisionData::NONE;
    };
    let Some((axis_b, overlap_b)) = min_overlap_axis(b, a) else {
        return CollisionData::NONE;
    };

    let (mut axis, minimum_translation, axis_from_b) = if overlap_b < overlap_a {
        (axis_b, overlap_b, true)
    } else {
        (axis_a, overlap_a, false)
    };

    let (span_a, span_b) = (a.project(axis), b.project(axis));
    let contact_point = if nests(span_a, span_b) || nests(span_b, span_a) {
        // Point the way b escapes, which is how the overlap was measured
        if escape_sign(span_a, span_b) < 0.0 {
            axis = -axis;
        }
        if nests(span_a, span_b) {
            nested_contact_point(a, b, axis)
        } else {
            nested_contact_point(b, a, -axis)
        }
    } else {
        // Point from a toward b
        if axis.dot(b.center() - a.center()) < 0.0 {
            axis = -axis;
        }
        match contact_point(a, b, axis) {
            Some(point) => point,
            None => {
                log::debug!("clipping left no contact points, treating overlap as no collision");
                return CollisionData::NONE;
            }
        }
    };

    CollisionData {
        axis,
        minimum_translation,
        axis_from_b,
        contact_point,
    }
}

/// Smallest overlap over the edge normals of `owner`, or `None` as soon as
/// one of them separates the shapes.
fn min_overlap_axis(owner: &ConvexPolygon, other: &ConvexPolygon) -> Option<(Vec2, f32)> {
    let mut best: Option<(Vec2, f32)> = None;

    for axis in owner.edge_normals() {
        if axis == Vec2::ZERO {
            continue; // zero length edge
        }

        let overlap = interval_overlap(owner.project(axis), other.project(axis));
        if overlap <= 0.0 {
            return None;
        }
        if best.is_none_or(|(_, smallest)| overlap < smallest) {
            best = Some((axis, overlap));
        }
    }

    best
}

/// Overlap of two projections. When one interval contains the other, the
/// smaller gap between their ends is added, since that is how far the inner
/// shape has to travel to get out.
fn interval_overlap((min_a, max_a): (f32, f32), (min_b, max_b): (f32, f32)) -> f32 {
    let overlap = max_a.min(max_b) - min_a.max(min_b);
    if overlap <= 0.0 {
        return overlap;
    }

    if nests((min_a, max_a), (min_b, max_b)) || nests((min_b, max_b), (min_a, max_a)) {
        overlap + (min_a - min_b).abs().min((max_a - max_b).abs())
    } else {
        overlap
    }
}

/// Whether `inner` lies within `outer`, ends included.
fn nests((min_outer, max_outer): (f32, f32), (min_inner, max_inner): (f32, f32)) -> bool {
    min_outer <= min_inner && max_outer >= max_inner
}

/// `1.0` when moving `b` forward along the axis is the shorter way out of
/// `a`, `-1.0` when backing it off is.
fn escape_sign((min_a, max_a): (f32, f32), (min_b, max_b): (f32, f32)) -> f32 {
    if max_a - min_b <= max_b - min_a { 1.0 } else { -1.0 }
}

/// Contact for a shape nested inside `outer` along `exit`: the part of the
/// inner shape's leading edge that faces the wall it would leave through.
fn nested_contact_point(outer: &ConvexPolygon, inner: &ConvexPolygon, exit: Vec2) -> Vec2 {
    let wall = best_edge(outer, exit);
    let leading = best_edge(inner, exit);
    let tangent = wall.direction();

    let clipped = clip(leading.start, leading.end, tangent, tangent.dot(wall.start));
    let points = match clipped.as_slice() {
        [p, q] => clip(*p, *q, -tangent, -tangent.dot(wall.end)),
        _ => Vec::new(),
    };

    if points.is_empty() {
        return leading.max; // leading edge runs past the wall's ends
    }
    let sum: Vec2 = points.iter().copied().sum();
    sum / points.len() as f32
}

fn contact_point(a: &ConvexPolygon, b: &ConvexPolygon, axis: Vec2) -> Option<Vec2> {
    let edge_a = best_edge(a, axis);
    let edge_b = best_edge(b, -axis);

    // The edge most perpendicular to the axis is the reference
    let (reference, incident, facing) =
        if edge_a.direction().dot(axis).abs() <= edge_b.direction().dot(axis).abs() {
            (edge_a, edge_b, axis)
        } else {
            (edge_b, edge_a, -axis)
        };

    let tangent = reference.direction();

    let lower = tangent.dot(reference.start);
    let clipped = clip(incident.start, incident.end, tangent, lower);
    if clipped.len() < 2 {
        return None;
    }

    let upper = tangent.dot(reference.end);
    let clipped = clip(clipped[0], clipped[1], -tangent, -upper);
    if clipped.len() < 2 {
        return None;
    }

    let mut normal = tangent.perp();
    if normal.dot(facing) < 0.0 {
        normal = -normal;
    }

    // Drop points in front of the reference face
    let face = normal.dot(reference.max);
    let points: Vec<Vec2> = clipped
        .into_iter()
        .filter(|p| face - normal.dot(*p) >= 0.0)
        .collect();

    if points.is_empty() {
        return None;
    }
    let sum: Vec2 = points.iter().copied().sum();
    Some(sum / points.len() as f32)
}

/// The vertex furthest along `direction` and whichever of its two edges is
/// more perpendicular to `direction`.
fn best_edge(polygon: &ConvexPolygon, direction: Vec2) -> Edge {
    let vertices = polygon.vertices();
    let n = vertices.len();
    let index = polygon.support_index(direction);

    let max = vertices[index];
    let next = vertices[(index + 1) % n];
    let prev = vertices[(index + n - 1) % n];

    let left = (max - next).normalize_or_zero();
    let right = (max - prev).normalize_or_zero();

    if right.dot(direction) <= left.dot(direction) {
        Edge {
            max,
            start: prev,
            end: max,
        }
    } else {
        Edge {
            max,
            start: max,
            end: next,
        }
    }
}

/// Keeps the part of segment `v1 -> v2` where `normal . p >= offset`.
fn clip(v1: Vec2, v2: Vec2, normal: Vec2, offset: f32) -> Vec<Vec2> {
    let mut points = Vec::with_capacity(2);
    let d1 = normal.dot(v1) - offset;
    let d2 = normal.dot(v2) - offset;

    if d1 >= 0.0 {
        points.push(v1);
    }
    if d2 >= 0.0 {
        points.push(v2);
    }

    // Endpoints on opposite sides, add the crossing
    if d1 * d2 < 0.0 {
        let u = d1 / (d1 - d2);
        points.push(v1 + (v2 - v1) * u);
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_approx_eq::assert_approx_eq;

    fn unit_square(center: Vec2) -> ConvexPolygon {
        ConvexPolygon::rectangle(center, Vec2::splat(0.5))
    }

    #[test]
    fn disjoint_squares_do_not_collide() {
        let a = unit_square(Vec2::ZERO);
        let b = unit_square(Vec2::new(3.0, 0.0));
        let data = collide(&a, &b);
        assert!(data.minimum_translation < 0.0);
        assert!(!data.is_colliding());
        assert_eq!(data, CollisionData::NONE);
    }

    #[test]
    fn diamond_beyond_corner_does_not_collide() {
        let a = unit_square(Vec2::ZERO);
        let b = ConvexPolygon::regular(Vec2::new(1.2, 1.2), 0.5, 4);
        assert!(!collide(&a, &b).is_colliding());
    }

    #[test]
    fn overlapping_unit_squares() {
        let a = unit_square(Vec2::ZERO);
        let b = unit_square(Vec2::new(0.5, 0.0));
        let data = collide(&a, &b);

        assert!(data.is_colliding());
        assert_relative_eq!(data.minimum_translation, 0.5);
        assert_relative_eq!(data.axis.x, 1.0);
        assert_relative_eq!(data.axis.y, 0.0);
        assert!(!data.axis_from_b);
        assert_relative_eq!(data.contact_point.x, 0.0);
        assert_relative_eq!(data.contact_point.y, 0.0);
    }

    #[test]
    fn axis_points_from_first_to_second() {
        let a = unit_square(Vec2::new(0.5, 0.0));
        let b = unit_square(Vec2::ZERO);
        let data = collide(&a, &b);
        assert_relative_eq!(data.axis.x, -1.0);
        assert_relative_eq!(data.minimum_translation, 0.5);

        let flipped = collide(&b, &a);
        assert_eq!(flipped.axis, -data.axis);
        assert_relative_eq!(flipped.minimum_translation, data.minimum_translation);
    }

    #[test]
    fn vertical_overlap_uses_y_axis() {
        let a = unit_square(Vec2::ZERO);
        let b = unit_square(Vec2::new(0.1, -0.8));
        let data = collide(&a, &b);
        assert_approx_eq!(data.minimum_translation, 0.2, 1e-6);
        assert_approx_eq!(data.axis.y, -1.0, 1e-6);
        // contact lies on the shared strip
        assert!(data.contact_point.y <= -0.3 + 1e-5 && data.contact_point.y >= -0.5 - 1e-5);
    }

    #[test]
    fn contained_box_reports_contact_inside_shared_region() {
        let outer = ConvexPolygon::rectangle(Vec2::ZERO, Vec2::splat(2.0));
        let inner = ConvexPolygon::rectangle(Vec2::new(1.0, 0.5), Vec2::splat(0.5));
        let data = collide(&outer, &inner);

        assert!(data.is_colliding());
        // Escape distance through the nearer right face
        assert_relative_eq!(data.minimum_translation, 1.5);
        assert_relative_eq!(data.axis.x, 1.0);

        let shared = inner.aabb();
        assert!(shared.contains_point(data.contact_point));
        assert!(outer.contains_point(data.contact_point));
    }

    #[test]
    fn contained_box_given_first_matches_outer_first() {
        let outer = ConvexPolygon::rectangle(Vec2::ZERO, Vec2::splat(2.0));
        let inner = ConvexPolygon::rectangle(Vec2::new(1.0, 0.5), Vec2::splat(0.5));
        let outer_first = collide(&outer, &inner);
        let inner_first = collide(&inner, &outer);

        assert!(inner_first.is_colliding());
        assert_relative_eq!(inner_first.minimum_translation, 1.5);
        // The outer box gets pushed left, so the inner one leaves to the right
        assert_relative_eq!(inner_first.axis.x, -1.0);
        assert_eq!(inner_first.axis, -outer_first.axis);

        assert_relative_eq!(inner_first.contact_point.x, 1.5, epsilon = 1e-6);
        assert_relative_eq!(inner_first.contact_point.y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(outer_first.contact_point.x, inner_first.contact_point.x, epsilon = 1e-6);
        assert_relative_eq!(outer_first.contact_point.y, inner_first.contact_point.y, epsilon = 1e-6);
    }

    #[test]
    fn contained_shapes_keep_contact_inside_in_either_order() {
        let outer = ConvexPolygon::rectangle(Vec2::ZERO, Vec2::splat(2.0));
        let inners = [
            ConvexPolygon::rectangle(Vec2::new(0.3, 0.3), Vec2::splat(0.5)),
            ConvexPolygon::rectangle(Vec2::new(-1.2, 0.9), Vec2::new(0.4, 0.2)),
            ConvexPolygon::regular(Vec2::new(0.5, -0.8), 0.6, 6),
            ConvexPolygon::regular(Vec2::new(-0.4, 0.2), 0.9, 5).rotated(0.3),
        ];

        for inner in &inners {
            let shared = inner.aabb().inflated(1.0 + 1e-4);
            for data in [collide(&outer, inner), collide(inner, &outer)] {
                assert!(data.is_colliding());
                assert!(
                    shared.contains_point(data.contact_point),
                    "contact {:?} outside {:?}",
                    data.contact_point,
                    inner.aabb()
                );
                assert!(outer.aabb().contains_point(data.contact_point));
            }
        }
    }

    #[test]
    fn rotated_box_touches_with_a_corner() {
        let floor = ConvexPolygon::rectangle(Vec2::new(0.0, -1.0), Vec2::new(5.0, 1.0));
        let diamond = ConvexPolygon::rectangle(Vec2::new(0.0, 0.6), Vec2::splat(0.5))
            .rotated(std::f32::consts::FRAC_PI_4);
        let data = collide(&floor, &diamond);

        assert!(data.is_colliding());
        assert_approx_eq!(data.axis.y, 1.0, 1e-5);
        let corner_depth = 0.5 * 2.0_f32.sqrt() - 0.6;
        assert_approx_eq!(data.minimum_translation, corner_depth, 1e-5);
        // single clipped point, the diamond's lowest corner
        assert_approx_eq!(data.contact_point.x, 0.0, 1e-5);
        assert_approx_eq!(data.contact_point.y, 0.6 - 0.5 * 2.0_f32.sqrt(), 1e-5);
    }

    #[test]
    fn triangle_against_box_prefers_smallest_overlap() {
        let ground = ConvexPolygon::rectangle(Vec2::ZERO, Vec2::new(4.0, 0.5));
        let wedge = ConvexPolygon::new(vec![
            Vec2::new(-1.0, 0.3),
            Vec2::new(1.0, 0.3),
            Vec2::new(0.0, 2.0),
        ]);
        let data = collide(&ground, &wedge);

        assert!(data.is_colliding());
        assert_approx_eq!(data.minimum_translation, 0.2, 1e-5);
        assert_approx_eq!(data.axis.y, 1.0, 1e-5);
        assert_approx_eq!(data.contact_point.x, 0.0, 1e-5);
        assert_approx_eq!(data.contact_point.y, 0.3, 1e-5);
    }

    #[test]
    fn reversed_data_flips_axis_only() {
        let a = unit_square(Vec2::ZERO);
        let b = unit_square(Vec2::new(0.5, 0.25));
        let data = collide(&a, &b);
        let other = data.reversed();
        assert_eq!(other.axis, -data.axis);
        assert_eq!(other.axis_from_b, !data.axis_from_b);
        assert_eq!(other.contact_point, data.contact_point);
        assert_eq!(other.minimum_translation, data.minimum_translation);
        assert_eq!(data.translation(), data.axis * data.minimum_translation);
    }

    #[test]
    fn clip_keeps_inside_part() {
        let points = clip(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), Vec2::X, 0.0);
        assert_eq!(points, vec![Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)]);

        let none = clip(Vec2::new(-2.0, 0.0), Vec2::new(-1.0, 0.0), Vec2::X, 0.0);
        assert!(none.is_empty());
    }

    #[test]
    fn overlap_adds_containment_gap() {
        assert_relative_eq!(interval_overlap((0.0, 2.0), (1.0, 3.0)), 1.0);
        assert_relative_eq!(interval_overlap((0.0, 10.0), (1.0, 3.0)), 2.0 + 1.0);
        assert!(interval_overlap((0.0, 1.0), (2.0, 3.0)) < 0.0);
    }
}
