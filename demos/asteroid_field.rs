//! Headless asteroid field: rocks drift and bounce off each other while a ship
//! fires bullets through them. Run with `RUST_LOG=debug` to see tick stats.

use std::collections::HashMap;

use arcade_collision::prelude::*;
use arcade_collision::{PairRule, TickStats};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

const FIELD_HALF: f32 = 60.0;
const TICKS: usize = 600;
const DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Layer {
    Ship,
    Rock,
    Bullet,
}

struct Entity {
    layer: Layer,
    outline: ConvexPolygon,
    shape: ConvexPolygon,
    body: PhysicalBody,
    angle: f32,
    alive: bool,
}

#[derive(Default)]
struct Field {
    entities: HashMap<ObjectId, Entity>,
    next_id: u32,
    destroyed: Vec<ObjectId>,
    hits: usize,
}

impl Field {
    fn spawn(&mut self, layer: Layer, outline: ConvexPolygon, body: PhysicalBody) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let shape = outline.translated(body.position);
        self.entities.insert(
            id,
            Entity {
                layer,
                outline,
                shape,
                body,
                angle: 0.0,
                alive: true,
            },
        );
        id
    }

    fn step(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            let body = &mut entity.body;
            body.position += body.velocity * dt;
            // Wrap around the field edges
            for axis in 0..2 {
                if body.position[axis] > FIELD_HALF {
                    body.position[axis] -= 2.0 * FIELD_HALF;
                } else if body.position[axis] < -FIELD_HALF {
                    body.position[axis] += 2.0 * FIELD_HALF;
                }
            }
            entity.angle += body.angular_velocity * dt;
            entity.shape = entity.outline.rotated(entity.angle).translated(body.position);
        }
    }
}

impl CollisionObjects for Field {
    fn shape(&self, id: ObjectId) -> &ConvexPolygon {
        &self.entities[&id].shape
    }

    fn body(&self, id: ObjectId) -> Option<PhysicalBody> {
        self.entities.get(&id).map(|entity| entity.body)
    }

    fn body_mut(&mut self, id: ObjectId) -> Option<&mut PhysicalBody> {
        self.entities.get_mut(&id).map(|entity| &mut entity.body)
    }

    fn on_collision(&mut self, id: ObjectId, event: &CollisionEvent) {
        let Some(other) = self.entities.get(&event.other).map(|entity| entity.layer) else {
            return;
        };
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };

        if entity.layer == Layer::Bullet && other == Layer::Rock && entity.alive {
            entity.alive = false;
            self.destroyed.push(id);
            self.hits += 1;
            log::info!("bullet {id} hit rock {} at {:?}", event.other, event.data.contact_point);
        }
    }
}

fn main() {
    env_logger::init();

    let config = CollisionConfig {
        restitution: 0.9,
        rules: vec![
            PairRule {
                a: Layer::Bullet,
                b: Layer::Bullet,
                response: PairResponse::Ignore,
            },
            PairRule {
                a: Layer::Bullet,
                b: Layer::Ship,
                response: PairResponse::Ignore,
            },
            PairRule {
                a: Layer::Bullet,
                b: Layer::Rock,
                response: PairResponse::Notify,
            },
        ],
        ..Default::default()
    };
    match config.to_toml_string() {
        Ok(text) => log::debug!("collision config:\n{text}"),
        Err(e) => log::warn!("could not render collision config: {e}"),
    }

    let mut rng = StdRng::seed_from_u64(2024);
    let mut field = Field::default();
    let mut collisions = CollisionWorld::new(config);

    let ship = field.spawn(
        Layer::Ship,
        ConvexPolygon::new(vec![Vec2::new(1.5, 0.0), Vec2::new(-1.0, 1.0), Vec2::new(-1.0, -1.0)]),
        PhysicalBody::new(Vec2::ZERO, 4.0, 2.0),
    );
    collisions.insert_object(ship, field.shape(ship).aabb(), Layer::Ship);

    for _ in 0..80 {
        let radius = rng.random_range(1.0..4.0);
        let sides = rng.random_range(5..9);
        let position = Vec2::new(
            rng.random_range(-FIELD_HALF..FIELD_HALF),
            rng.random_range(-FIELD_HALF..FIELD_HALF),
        );
        if position.length() < 10.0 {
            continue;
        }
        let mass = radius * radius;
        let body = PhysicalBody::new(position, mass, 0.5 * mass * radius * radius)
            .with_velocity(Vec2::new(rng.random_range(-8.0..8.0), rng.random_range(-8.0..8.0)))
            .with_angular_velocity(rng.random_range(-1.0..1.0));
        let id = field.spawn(Layer::Rock, ConvexPolygon::regular(Vec2::ZERO, radius, sides), body);
        collisions.insert_object(id, field.shape(id).aabb(), Layer::Rock);
    }

    let mut totals = TickStats::default();
    for tick in 0..TICKS {
        if tick % 10 == 0 {
            let heading = Vec2::from_angle(tick as f32 * 0.05);
            let body = PhysicalBody::new(heading * 2.0, 0.01, 0.001).with_velocity(heading * 40.0);
            let bullet = field.spawn(Layer::Bullet, ConvexPolygon::rectangle(Vec2::ZERO, Vec2::splat(0.2)), body);
            collisions.insert_object(bullet, field.shape(bullet).aabb(), Layer::Bullet);
        }

        field.step(DT);
        let stats = collisions.update(&mut field);
        totals.refitted += stats.refitted;
        totals.candidate_pairs += stats.candidate_pairs;
        totals.narrow_phase_tests += stats.narrow_phase_tests;
        totals.contacts += stats.contacts;

        for id in std::mem::take(&mut field.destroyed) {
            collisions.remove_object(id, Layer::Bullet);
            field.entities.remove(&id);
        }

        if tick % 120 == 0 {
            let near = collisions.find_nearest_objects(Layer::Rock, Vec2::ZERO, 15.0, &field);
            let ahead = collisions.find_closest_intersection(Layer::Rock, Vec2::ZERO, Vec2::X, 50.0, &field);
            log::info!(
                "tick {tick}: {} rocks within 15, first rock ahead {:?}",
                near.len(),
                ahead.map(|hit| (hit.id, hit.distance))
            );
        }
    }

    log::info!(
        "{TICKS} ticks: {} refits, {} candidate pairs, {} narrow phase tests, {} contacts, {} bullet hits",
        totals.refitted,
        totals.candidate_pairs,
        totals.narrow_phase_tests,
        totals.contacts,
        field.hits
    );
}
