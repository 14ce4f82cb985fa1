pub mod aabb;
pub mod polygon;

pub use aabb::Aabb;
pub use polygon::{ConvexPolygon, SegmentHit};
