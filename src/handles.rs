// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::fmt;

use slotmap::new_key_type;

/// Opaque id of a game object, chosen by the owner of the object.
/// The collision subsystem never interprets it.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for ObjectId {
    fn from(value: u32) -> Self {
        ObjectId(value)
    }
}

new_key_type! {
    /// Handle of a node in a [`DynamicAabbTree`](crate::DynamicAabbTree) arena.
    /// Stale handles are rejected after the slot is reused.
    pub struct NodeId;
}

/// Unordered pair of object ids, stored smallest first.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectPair(pub ObjectId, pub ObjectId);

impl ObjectPair {
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        if a <= b {
            ObjectPair(a, b)
        } else {
            ObjectPair(b, a)
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0 == id || self.1 == id
    }
}
