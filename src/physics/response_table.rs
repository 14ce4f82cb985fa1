use std::{collections::HashMap, fmt::Debug, hash::Hash};

use serde::{Deserialize, Serialize};

/// Marker for caller-defined collision categories, usually a small enum.
///
/// Category pairs are processed in the type's `Ord` order.
pub trait CollisionCategory: Copy + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

impl<T> CollisionCategory for T where T: Copy + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

/// What happens when two objects of a category pair touch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairResponse {
    /// Exchange impulses, then notify both objects.
    #[default]
    Bounce,
    /// Notify both objects only.
    Notify,
    /// Skip the pair before the narrow phase.
    Ignore,
}

/// Response lookup for unordered category pairs.
#[derive(Debug, Clone)]
pub struct ResponseTable<C: CollisionCategory> {
    entries: HashMap<(C, C), PairResponse>,
    fallback: PairResponse,
}

impl<C: CollisionCategory> Default for ResponseTable<C> {
    fn default() -> Self {
        ResponseTable::new(PairResponse::default())
    }
}

impl<C: CollisionCategory> ResponseTable<C> {
    pub fn new(fallback: PairResponse) -> Self {
        ResponseTable {
            entries: HashMap::new(),
            fallback,
        }
    }

    /// Later calls for the same pair overwrite earlier ones.
    pub fn set(&mut self, a: C, b: C, response: PairResponse) {
        self.entries.insert(key(a, b), response);
    }

    pub fn get(&self, a: C, b: C) -> PairResponse {
        self.entries.get(&key(a, b)).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> PairResponse {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key<C: Ord>(a: C, b: C) -> (C, C) {
    if a <= b { (a, b) } else { (b, a) }
}
