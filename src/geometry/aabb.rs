// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use glam::Vec2;

/// Axis-aligned bounding box. `min` is componentwise <= `max`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y,
            "inverted aabb: min {min:?} max {max:?}"
        );
        Aabb { min, max }
    }

    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        let half_extents = half_extents.abs();
        Aabb {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box around `points`. Panics on an empty slice.
    pub fn from_points(points: &[Vec2]) -> Self {
        let first = points[0];
        points.iter().fold(
            Aabb {
                min: first,
                max: first,
            },
            |acc, p| Aabb {
                min: acc.min.min(*p),
                max: acc.max.max(*p),
            },
        )
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec2 {
        self.extents() * 0.5
    }

    /// Product of the extents. Used as the tree's fitness metric.
    pub fn area(&self) -> f32 {
        let d = self.extents();
        d.x * d.y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Expands (or shrinks, for `scale < 1`) the box symmetrically about its center.
    pub fn inflated(&self, scale: f32) -> Aabb {
        Aabb::from_center_half_extents(self.center(), self.half_extents() * scale)
    }

    /// Touching boxes count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Zero when `point` is inside the box.
    pub fn distance_squared_to_point(&self, point: Vec2) -> f32 {
        let clamped = point.clamp(self.min, self.max);
        clamped.distance_squared(point)
    }

    /// Separating-axis test of the segment `start..end` against the box.
    ///
    /// Candidate axes are the box's x and y axes plus the segment normal. The
    /// comparisons are strict, so a segment that only grazes an edge or a
    /// corner does not cross the box.
    pub fn crosses_segment(&self, start: Vec2, end: Vec2) -> bool {
        let seg_min = start.min(end);
        let seg_max = start.max(end);
        if seg_max.x <= self.min.x
            || seg_min.x >= self.max.x
            || seg_max.y <= self.min.y
            || seg_min.y >= self.max.y
        {
            return false;
        }

        let direction = end - start;
        let normal = direction.perp();
        let half = self.half_extents();
        let distance = normal.dot(self.center() - start).abs();
        let radius = half.x * normal.x.abs() + half.y * normal.y.abs();
        distance < radius || normal == Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb {
        Aabb::new(Vec2::ZERO, Vec2::ONE)
    }

    #[test]
    fn area_is_product_of_extents() {
        let aabb = Aabb::new(Vec2::new(-1.0, 0.0), Vec2::new(3.0, 2.0));
        assert_relative_eq!(aabb.area(), 8.0);
        assert_eq!(aabb.extents(), Vec2::new(4.0, 2.0));
        assert_eq!(aabb.center(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn union_contains_both() {
        let a = unit_box();
        let b = Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 0.5));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u, Aabb::new(Vec2::new(0.0, -1.0), Vec2::new(3.0, 1.0)));
    }

    #[test]
    fn inflated_keeps_center() {
        let a = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 5.0));
        let fat = a.inflated(1.5);
        assert_eq!(fat.center(), a.center());
        assert_relative_eq!(fat.extents().x, 3.0);
        assert_relative_eq!(fat.extents().y, 6.0);
        assert!(fat.contains(&a));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = unit_box();
        let b = Aabb::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        let c = Aabb::new(Vec2::new(1.01, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn from_points_bounds_all() {
        let points = [
            Vec2::new(1.0, -2.0),
            Vec2::new(-3.0, 4.0),
            Vec2::new(0.5, 0.5),
        ];
        let aabb = Aabb::from_points(&points);
        assert_eq!(aabb.min, Vec2::new(-3.0, -2.0));
        assert_eq!(aabb.max, Vec2::new(1.0, 4.0));
    }

    #[test]
    fn distance_to_point() {
        let a = unit_box();
        assert_eq!(a.distance_squared_to_point(Vec2::new(0.5, 0.5)), 0.0);
        assert_relative_eq!(a.distance_squared_to_point(Vec2::new(3.0, 0.5)), 4.0);
        assert_relative_eq!(a.distance_squared_to_point(Vec2::new(2.0, 2.0)), 2.0);
    }

    #[test]
    fn segment_through_box_crosses() {
        let a = unit_box();
        assert!(a.crosses_segment(Vec2::new(-1.0, 0.5), Vec2::new(2.0, 0.5)));
        assert!(a.crosses_segment(Vec2::new(-1.0, -1.0), Vec2::new(2.0, 2.0)));
        // starts inside
        assert!(a.crosses_segment(Vec2::new(0.5, 0.5), Vec2::new(5.0, 0.5)));
    }

    #[test]
    fn segment_missing_box_does_not_cross() {
        let a = unit_box();
        // stops short
        assert!(!a.crosses_segment(Vec2::new(-3.0, 0.5), Vec2::new(-1.0, 0.5)));
        // diagonal passing beside the corner
        assert!(!a.crosses_segment(Vec2::new(0.0, 2.5), Vec2::new(2.5, 0.0)));
        // grazes the top edge
        assert!(!a.crosses_segment(Vec2::new(-1.0, 1.0), Vec2::new(2.0, 1.0)));
        // touches only the corner
        assert!(!a.crosses_segment(Vec2::new(0.0, 2.0), Vec2::new(2.0, 0.0)));
    }
}
