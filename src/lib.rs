// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

//! Collision subsystem for 2D arcade games.
//!
//! Objects are grouped by caller-defined categories, each backed by a
//! [`DynamicAabbTree`] broad phase. [`CollisionWorld::update`] refits the
//! trees, gathers close pairs per category pair, runs a separating-axis
//! narrow phase on convex polygons and dispatches the contacts.

pub mod config;
pub mod geometry;
pub mod handles;
pub mod physics;
pub mod utils;

pub use config::{CollisionConfig, ConfigError, PairRule};
pub use geometry::{Aabb, ConvexPolygon, SegmentHit};
pub use handles::{NodeId, ObjectId, ObjectPair};
pub use physics::{
    collision_event::{CollisionEvent, ContactPhase},
    collision_system::{CollisionObjects, CollisionWorld, RayHit, TickStats},
    dynamic_aabb_tree::{DynamicAabbTree, SiblingStrategy, TreeError},
    impulse::{PhysicalBody, resolve_impulse},
    response_table::{CollisionCategory, PairResponse, ResponseTable},
    sat::{CollisionData, collide},
};

pub mod prelude {
    pub use crate::{
        Aabb, CollisionCategory, CollisionConfig, CollisionData, CollisionEvent, CollisionObjects,
        CollisionWorld, ContactPhase, ConvexPolygon, ObjectId, PairResponse, PhysicalBody,
    };
    pub use glam::Vec2;
}
