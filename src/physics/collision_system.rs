// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::collections::{BTreeMap, HashSet};

use bevy_ecs::prelude::Resource;
use glam::Vec2;

use crate::{
    config::CollisionConfig,
    geometry::{Aabb, ConvexPolygon},
    handles::{ObjectId, ObjectPair},
    physics::{
        collision_event::{CollisionEvent, ContactPhase},
        dynamic_aabb_tree::DynamicAabbTree,
        impulse::{PhysicalBody, resolve_impulse},
        response_table::{CollisionCategory, PairResponse, ResponseTable},
        sat::{self, CollisionData},
    },
    utils::ScopeTimer,
};

/// The game side of the collision world: shapes, bodies and the callback for
/// contacts. Ids are the ones passed to [`CollisionWorld::insert_object`].
pub trait CollisionObjects {
    fn shape(&self, id: ObjectId) -> &ConvexPolygon;

    /// Tight box used to refit the broad phase.
    fn bounds(&self, id: ObjectId) -> Aabb {
        self.shape(id).aabb()
    }

    /// Objects without a body are only notified, never pushed.
    fn body(&self, _id: ObjectId) -> Option<PhysicalBody> {
        None
    }

    fn body_mut(&mut self, _id: ObjectId) -> Option<&mut PhysicalBody> {
        None
    }

    fn on_collision(&mut self, id: ObjectId, event: &CollisionEvent);
}

/// Counters for one [`CollisionWorld::update`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Leaves that escaped their stored box and were re-inserted.
    pub refitted: usize,
    pub candidate_pairs: usize,
    pub narrow_phase_tests: usize,
    pub contacts: usize,
}

/// First boundary crossing found by [`CollisionWorld::find_closest_intersection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub id: ObjectId,
    pub point: Vec2,
    pub normal: Vec2,
    /// Distance from the ray origin to `point`.
    pub distance: f32,
}

/// One broad phase tree per category plus the pair bookkeeping of a tick.
#[derive(Resource, Debug)]
pub struct CollisionWorld<C: CollisionCategory> {
    config: CollisionConfig<C>,
    responses: ResponseTable<C>,
    trees: BTreeMap<C, DynamicAabbTree>,
    /// Pairs already handled during the current tick.
    resolved: HashSet<ObjectPair>,
    /// Pairs in contact at the end of the previous tick.
    touching: HashSet<ObjectPair>,
}

impl<C: CollisionCategory> Default for CollisionWorld<C> {
    fn default() -> Self {
        CollisionWorld::new(CollisionConfig::default())
    }
}

impl<C: CollisionCategory> CollisionWorld<C> {
    pub fn new(config: CollisionConfig<C>) -> Self {
        let responses = config.response_table();
        CollisionWorld {
            config,
            responses,
            trees: BTreeMap::new(),
            resolved: HashSet::new(),
            touching: HashSet::new(),
        }
    }

    pub fn config(&self) -> &CollisionConfig<C> {
        &self.config
    }

    pub fn responses(&self) -> &ResponseTable<C> {
        &self.responses
    }

    /// Tracks `id` under `category`. The same id may live in several
    /// categories; panics if it is already tracked in this one.
    pub fn insert_object(&mut self, id: ObjectId, aabb: Aabb, category: C) {
        let strategy = self.config.sibling_strategy;
        let fat = aabb.inflated(self.config.inflate_scale).union(&aabb);
        self.trees
            .entry(category)
            .or_insert_with(|| DynamicAabbTree::with_strategy(strategy))
            .insert(fat, id);
    }

    /// Panics if `id` is not tracked under `category`. Contacts of `id` are
    /// remembered for as long as another category still tracks it.
    pub fn remove_object(&mut self, id: ObjectId, category: C) {
        let Some(tree) = self.trees.get_mut(&category) else {
            panic!("no objects are tracked under {category:?}");
        };
        tree.remove(id);
        if !self.trees.values().any(|tree| tree.contains(id)) {
            self.forget_contacts(id);
        }
    }

    /// Removes `id` from every category. Returns how many trees held it.
    pub fn remove_object_everywhere(&mut self, id: ObjectId) -> usize {
        let mut removed = 0;
        for tree in self.trees.values_mut() {
            if tree.contains(id) {
                tree.remove(id);
                removed += 1;
            }
        }
        self.forget_contacts(id);
        removed
    }

    fn forget_contacts(&mut self, id: ObjectId) {
        self.touching.retain(|pair| !pair.contains(id));
    }

    pub fn contains_object(&self, id: ObjectId, category: C) -> bool {
        self.trees.get(&category).is_some_and(|tree| tree.contains(id))
    }

    pub fn category_len(&self, category: C) -> usize {
        self.trees.get(&category).map_or(0, DynamicAabbTree::len)
    }

    pub fn tree(&self, category: C) -> Option<&DynamicAabbTree> {
        self.trees.get(&category)
    }

    /// Categories that have had at least one object, in processing order.
    pub fn categories(&self) -> impl Iterator<Item = C> + '_ {
        self.trees.keys().copied()
    }

    /// Drops every object and every remembered contact.
    pub fn clear(&mut self) {
        self.trees.clear();
        self.resolved.clear();
        self.touching.clear();
    }

    /// Runs one collision tick.
    ///
    /// Every leaf is refitted to `objects.bounds`, then each category pair is
    /// visited in order (A-A, A-B, ..., B-B, ...). An unordered pair of ids is
    /// resolved at most once per tick, even when both objects share several
    /// categories. Contacts are bounced according to the response table and
    /// reported to both participants.
    pub fn update<O>(&mut self, objects: &mut O) -> TickStats
    where
        O: CollisionObjects + ?Sized,
    {
        let _timer = ScopeTimer::new("collision update");
        let mut stats = TickStats::default();

        // --- 1. Refit ---
        let inflate_scale = self.config.inflate_scale;
        for tree in self.trees.values_mut() {
            for id in tree.object_ids() {
                if tree.refit(id, objects.bounds(id), inflate_scale) {
                    stats.refitted += 1;
                }
            }
        }

        // --- 2. Broad phase ---
        let categories: Vec<C> = self.trees.keys().copied().collect();
        let mut candidates = Vec::new();
        for (i, &first) in categories.iter().enumerate() {
            for &second in &categories[i..] {
                let pairs = self.trees[&first].find_close_pairs_with(&self.trees[&second]);
                candidates.extend(pairs.into_iter().map(|(a, b)| (first, second, a, b)));
            }
        }
        stats.candidate_pairs = candidates.len();

        // --- 3. Narrow phase and dispatch ---
        let previous = std::mem::take(&mut self.touching);
        for (first, second, a, b) in candidates {
            let response = self.responses.get(first, second);
            if response == PairResponse::Ignore {
                continue;
            }

            let pair = ObjectPair::new(a, b);
            if !self.resolved.insert(pair) {
                continue; // already handled under another category pair
            }

            stats.narrow_phase_tests += 1;
            let data = sat::collide(objects.shape(a), objects.shape(b));
            if !data.is_colliding() {
                continue;
            }
            stats.contacts += 1;

            if response == PairResponse::Bounce {
                self.bounce(objects, a, b, &data);
            }

            let phase = if previous.contains(&pair) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            self.touching.insert(pair);

            for (id, event) in CollisionEvent::pair(a, b, data, phase) {
                objects.on_collision(id, &event);
            }
        }

        self.resolved.clear();
        log::debug!(
            "collision tick: {} refitted, {} candidates, {} tested, {} contacts",
            stats.refitted,
            stats.candidate_pairs,
            stats.narrow_phase_tests,
            stats.contacts
        );
        stats
    }

    /// Writes the bounced bodies back only when both objects have one.
    fn bounce<O>(&self, objects: &mut O, a: ObjectId, b: ObjectId, data: &CollisionData)
    where
        O: CollisionObjects + ?Sized,
    {
        let (Some(mut body_a), Some(mut body_b)) = (objects.body(a), objects.body(b)) else {
            return;
        };

        if !resolve_impulse(&mut body_a, &mut body_b, data, self.config.restitution) {
            return;
        }

        if let Some(body) = objects.body_mut(a) {
            *body = body_a;
        }
        if let Some(body) = objects.body_mut(b) {
            *body = body_b;
        }
    }

    /// Objects of `category` whose stored boxes come within `radius` of
    /// `center`, nearest box first.
    pub fn find_nearest_object_ids(&self, category: C, center: Vec2, radius: f32) -> Vec<ObjectId> {
        let Some(tree) = self.trees.get(&category) else {
            return Vec::new();
        };

        let probe = Aabb::from_center_half_extents(center, Vec2::splat(radius));
        let radius_squared = radius * radius;
        let mut found: Vec<(ObjectId, f32)> = Vec::new();
        tree.query(&probe, |id| {
            if let Some(rect) = tree.object_rect(id) {
                let distance_squared = rect.distance_squared_to_point(center);
                if distance_squared <= radius_squared {
                    found.push((id, distance_squared));
                }
            }
        });

        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found.into_iter().map(|(id, _)| id).collect()
    }

    /// Like [`find_nearest_object_ids`](Self::find_nearest_object_ids) but
    /// measured against the exact shapes. Returns `(id, distance)` pairs,
    /// nearest first.
    pub fn find_nearest_objects<O>(
        &self,
        category: C,
        center: Vec2,
        radius: f32,
        objects: &O,
    ) -> Vec<(ObjectId, f32)>
    where
        O: CollisionObjects + ?Sized,
    {
        let mut found: Vec<(ObjectId, f32)> = self
            .find_nearest_object_ids(category, center, radius)
            .into_iter()
            .map(|id| (id, objects.shape(id).distance_to_point(center)))
            .filter(|(_, distance)| *distance <= radius)
            .collect();

        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }

    /// Closest object of `category` hit by the segment starting at `origin`
    /// and running `length` along `direction`.
    pub fn find_closest_intersection<O>(
        &self,
        category: C,
        origin: Vec2,
        direction: Vec2,
        length: f32,
        objects: &O,
    ) -> Option<RayHit>
    where
        O: CollisionObjects + ?Sized,
    {
        let tree = self.trees.get(&category)?;
        let end = origin + direction.normalize_or_zero() * length;

        tree.ray_cast(origin, direction, length)
            .into_iter()
            .filter_map(|id| {
                objects
                    .shape(id)
                    .segment_intersection(origin, end)
                    .map(|hit| RayHit {
                        id,
                        point: hit.point,
                        normal: hit.normal,
                        distance: hit.t * length,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)))
    }
}
