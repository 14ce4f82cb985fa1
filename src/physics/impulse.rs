// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use glam::Vec2;

use crate::physics::sat::CollisionData;

/// Rigid body state needed to bounce two colliding objects apart.
///
/// A non-finite or non-positive `mass` (or `inertia`) makes the body immovable
/// (or unable to spin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub mass: f32,
    pub inertia: f32,
}

impl Default for PhysicalBody {
    fn default() -> Self {
        PhysicalBody {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: 1.0,
            inertia: 1.0,
        }
    }
}

impl PhysicalBody {
    pub fn new(position: Vec2, mass: f32, inertia: f32) -> Self {
        PhysicalBody {
            position,
            mass,
            inertia,
            ..Default::default()
        }
    }

    /// A body nothing can push.
    pub fn immovable(position: Vec2) -> Self {
        PhysicalBody::new(position, f32::INFINITY, f32::INFINITY)
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: f32) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn inverse_mass(&self) -> f32 {
        inverse(self.mass)
    }

    pub fn inverse_inertia(&self) -> f32 {
        inverse(self.inertia)
    }

    /// Velocity of the material point at `point`, spin included.
    pub fn velocity_at(&self, point: Vec2) -> Vec2 {
        self.velocity + (point - self.position).perp() * self.angular_velocity
    }

    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        self.velocity += impulse * self.inverse_mass();
        self.angular_velocity += (point - self.position).perp_dot(impulse) * self.inverse_inertia();
    }

    pub fn momentum(&self) -> Vec2 {
        self.velocity * self.mass
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.length_squared()
            + 0.5 * self.inertia * self.angular_velocity * self.angular_velocity
    }
}

fn inverse(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        1.0 / value
    } else {
        0.0
    }
}

/// Applies an equal and opposite impulse along `contact.axis` at the contact
/// point. `contact.axis` must point from `a` toward `b`.
///
/// Returns `false` and leaves the bodies untouched when they are already
/// separating or neither of them can move.
pub fn resolve_impulse(
    a: &mut PhysicalBody,
    b: &mut PhysicalBody,
    contact: &CollisionData,
    restitution: f32,
) -> bool {
    let inv_mass_sum = a.inverse_mass() + b.inverse_mass();
    if inv_mass_sum <= f32::EPSILON {
        return false;
    }

    let normal = contact.axis;
    let point = contact.contact_point;
    let ra = point - a.position;
    let rb = point - b.position;

    let relative = b.velocity_at(point) - a.velocity_at(point);
    let rvn = relative.dot(normal);
    if rvn > 0.0 {
        return false;
    }

    // Effective mass along the normal, lever arms included
    let ra_cross_n = ra.perp_dot(normal);
    let rb_cross_n = rb.perp_dot(normal);
    let k = inv_mass_sum
        + ra_cross_n * ra_cross_n * a.inverse_inertia()
        + rb_cross_n * rb_cross_n * b.inverse_inertia();
    if k <= f32::EPSILON {
        return false;
    }

    let j = -(1.0 + restitution) * rvn / k;
    let impulse = normal * j;
    a.apply_impulse(-impulse, point);
    b.apply_impulse(impulse, point);
    true
}
