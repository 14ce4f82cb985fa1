// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use glam::Vec2;

use crate::geometry::aabb::Aabb;

/// Convex polygon in world space, wound counter-clockwise.
///
/// Callers are expected to supply at least three distinct vertices; zero
/// length edges are not guarded against by the narrow phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<Vec2>,
}

/// Where a segment first crosses a polygon boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Fraction of the segment, 0 at the start and 1 at the end.
    pub t: f32,
    pub point: Vec2,
    /// Outward normal of the edge that was hit.
    pub normal: Vec2,
}

impl ConvexPolygon {
    /// Clockwise input is reversed so edge normals always point outward.
    pub fn new(mut vertices: Vec<Vec2>) -> Self {
        debug_assert!(vertices.len() >= 3, "polygon needs at least 3 vertices");
        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }
        ConvexPolygon { vertices }
    }

    pub fn from_aabb(aabb: &Aabb) -> Self {
        ConvexPolygon {
            vertices: vec![
                aabb.min,
                Vec2::new(aabb.max.x, aabb.min.y),
                aabb.max,
                Vec2::new(aabb.min.x, aabb.max.y),
            ],
        }
    }

    pub fn rectangle(center: Vec2, half_extents: Vec2) -> Self {
        Self::from_aabb(&Aabb::from_center_half_extents(center, half_extents))
    }

    pub fn regular(center: Vec2, radius: f32, sides: usize) -> Self {
        debug_assert!(sides >= 3);
        let step = std::f32::consts::TAU / sides as f32;
        let vertices = (0..sides)
            .map(|i| center + Vec2::from_angle(step * i as f32) * radius)
            .collect();
        ConvexPolygon { vertices }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Average of the vertices.
    pub fn center(&self) -> Vec2 {
        let sum: Vec2 = self.vertices.iter().copied().sum();
        sum / self.vertices.len() as f32
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        ConvexPolygon {
            vertices: self.vertices.iter().map(|v| *v + offset).collect(),
        }
    }

    /// Rotates counter-clockwise about [`center`](Self::center).
    pub fn rotated(&self, angle: f32) -> Self {
        let center = self.center();
        let rotation = Vec2::from_angle(angle);
        ConvexPolygon {
            vertices: self
                .vertices
                .iter()
                .map(|v| center + rotation.rotate(*v - center))
                .collect(),
        }
    }

    /// Edge `i` runs from vertex `i` to vertex `i + 1`.
    pub fn edge(&self, i: usize) -> (Vec2, Vec2) {
        let n = self.vertices.len();
        (self.vertices[i % n], self.vertices[(i + 1) % n])
    }

    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        (0..self.vertices.len()).map(move |i| self.edge(i))
    }

    /// Unit outward normals, one per edge.
    pub fn edge_normals(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.edges().map(|(a, b)| outward_normal(a, b))
    }

    /// Interval covered by the polygon on `axis`.
    pub fn project(&self, axis: Vec2) -> (f32, f32) {
        self.vertices
            .iter()
            .map(|v| v.dot(axis))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            })
    }

    /// Index of the vertex furthest along `direction`. The first one wins ties.
    pub fn support_index(&self, direction: Vec2) -> usize {
        let mut best = 0;
        let mut best_dot = f32::NEG_INFINITY;
        for (i, v) in self.vertices.iter().enumerate() {
            let d = v.dot(direction);
            if d > best_dot {
                best = i;
                best_dot = d;
            }
        }
        best
    }

    /// Boundary points count as inside.
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.edges()
            .all(|(a, b)| outward_normal(a, b).dot(point - a) <= 0.0)
    }

    /// Zero for points inside the polygon.
    pub fn distance_to_point(&self, point: Vec2) -> f32 {
        if self.contains_point(point) {
            return 0.0;
        }
        self.edges()
            .map(|(a, b)| closest_point_on_segment(a, b, point).distance(point))
            .fold(f32::INFINITY, f32::min)
    }

    /// First crossing of the segment `start..end` with the boundary.
    ///
    /// A segment starting inside the polygon hits at `t = 0`, with the normal
    /// facing back along the segment.
    pub fn segment_intersection(&self, start: Vec2, end: Vec2) -> Option<SegmentHit> {
        let direction = end - start;
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;
        let mut enter_normal = None;

        for (a, b) in self.edges() {
            let normal = outward_normal(a, b);
            let denom = normal.dot(direction);
            let num = normal.dot(a - start);

            if denom == 0.0 {
                if num < 0.0 {
                    return None;
                }
                continue;
            }

            let t = num / denom;
            if denom < 0.0 {
                if t > t_enter {
                    t_enter = t;
                    enter_normal = Some(normal);
                }
            } else if t < t_exit {
                t_exit = t;
            }

            if t_enter > t_exit {
                return None;
            }
        }

        let normal = enter_normal.unwrap_or_else(|| -direction.normalize_or_zero());
        Some(SegmentHit {
            t: t_enter,
            point: start + direction * t_enter,
            normal,
        })
    }
}

pub(crate) fn outward_normal(a: Vec2, b: Vec2) -> Vec2 {
    let edge = b - a;
    Vec2::new(edge.y, -edge.x).normalize_or_zero()
}

fn signed_area(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    (0..n)
        .map(|i| vertices[i].perp_dot(vertices[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn closest_point_on_segment(a: Vec2, b: Vec2, point: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> ConvexPolygon {
        ConvexPolygon::rectangle(Vec2::ZERO, Vec2::splat(0.5))
    }

    #[test]
    fn clockwise_input_is_rewound() {
        let cw = ConvexPolygon::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
        ]);
        assert!(signed_area(cw.vertices()) > 0.0);
        let center = cw.center();
        for (a, b) in cw.edges() {
            assert!(outward_normal(a, b).dot(a - center) > 0.0);
        }
    }

    #[test]
    fn square_normals_are_axis_aligned() {
        let normals: Vec<Vec2> = unit_square().edge_normals().collect();
        assert_eq!(
            normals,
            vec![
                Vec2::new(0.0, -1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(-1.0, 0.0)
            ]
        );
    }

    #[test]
    fn projection_interval() {
        let square = unit_square().translated(Vec2::new(2.0, 0.0));
        assert_eq!(square.project(Vec2::X), (1.5, 2.5));
        let (lo, hi) = square.project(Vec2::new(1.0, 1.0).normalize());
        assert_relative_eq!(hi - lo, 2.0_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn regular_polygon_bounds() {
        let hexagon = ConvexPolygon::regular(Vec2::new(1.0, 1.0), 2.0, 6);
        assert_eq!(hexagon.len(), 6);
        let aabb = hexagon.aabb();
        assert_relative_eq!(aabb.max.x, 3.0, epsilon = 1e-6);
        assert_relative_eq!(aabb.min.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(hexagon.center().x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rotated_quarter_turn() {
        let bar = ConvexPolygon::rectangle(Vec2::ZERO, Vec2::new(2.0, 0.5));
        let turned = bar.rotated(std::f32::consts::FRAC_PI_2).aabb();
        assert_relative_eq!(turned.max.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(turned.max.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn point_containment_and_distance() {
        let square = unit_square();
        assert!(square.contains_point(Vec2::ZERO));
        assert!(square.contains_point(Vec2::new(0.5, 0.5)));
        assert!(!square.contains_point(Vec2::new(0.6, 0.0)));
        assert_eq!(square.distance_to_point(Vec2::new(0.1, 0.1)), 0.0);
        assert_relative_eq!(square.distance_to_point(Vec2::new(2.5, 0.0)), 2.0);
    }

    #[test]
    fn segment_enters_through_nearest_edge() {
        let square = unit_square();
        let hit = square
            .segment_intersection(Vec2::new(-2.5, 0.0), Vec2::new(2.5, 0.0))
            .expect("segment crosses the square");
        assert_relative_eq!(hit.t, 0.4);
        assert_relative_eq!(hit.point.x, -0.5);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn segment_misses_or_stops_short() {
        let square = unit_square();
        assert!(
            square
                .segment_intersection(Vec2::new(-2.0, 1.0), Vec2::new(2.0, 1.5))
                .is_none()
        );
        assert!(
            square
                .segment_intersection(Vec2::new(-3.0, 0.0), Vec2::new(-1.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn segment_from_inside_hits_at_start() {
        let hit = unit_square()
            .segment_intersection(Vec2::ZERO, Vec2::new(3.0, 0.0))
            .unwrap();
        assert_eq!(hit.t, 0.0);
        assert_eq!(hit.point, Vec2::ZERO);
    }
}
