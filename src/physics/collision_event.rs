use crate::{handles::ObjectId, physics::sat::CollisionData};

/// Notification handed to each participant of a contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub other: ObjectId,
    /// Oriented from the receiving object toward `other`.
    pub data: CollisionData,
    pub phase: ContactPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    /// First tick of the contact.
    Enter,
    /// The pair was already touching on the previous tick.
    Stay,
}

impl CollisionEvent {
    /// The pair of events for a contact between `a` and `b`, `data` being
    /// oriented from `a` toward `b`.
    pub fn pair(a: ObjectId, b: ObjectId, data: CollisionData, phase: ContactPhase) -> [(ObjectId, CollisionEvent); 2] {
        [
            (
                a,
                CollisionEvent {
                    other: b,
                    data,
                    phase,
                },
            ),
            (
                b,
                CollisionEvent {
                    other: a,
                    data: data.reversed(), // Invert for the other participant
                    phase,
                },
            ),
        ]
    }
}
