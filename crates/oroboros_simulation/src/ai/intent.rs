//! AI output. Decisions are recorded here and applied by someone else.

use oroboros_shared::{EntityId, SkillId, Vec3};

/// One decision for one entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intent {
    /// Walk towards `target_pos`.
    Move {
        /// Entity that moves.
        entity: EntityId,
        /// Next waypoint.
        target_pos: Vec3,
        /// Yaw facing the waypoint, in degrees.
        target_yaw: f32,
        /// Unit direction on the ground plane.
        direction: Vec3,
        /// Units per second.
        speed: f32,
    },
    /// Turn in place.
    Rotate {
        /// Entity that turns.
        entity: EntityId,
        /// New yaw in degrees.
        yaw: f32,
    },
    /// Use a skill on a target.
    Attack {
        /// Attacker.
        entity: EntityId,
        /// Victim.
        target: EntityId,
        /// Skill to cast.
        skill: SkillId,
    },
}

impl Intent {
    /// Entity the intent belongs to.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        match self {
            Self::Move { entity, .. } | Self::Rotate { entity, .. } | Self::Attack { entity, .. } => *entity,
        }
    }
}

/// Ordered intents produced in one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntentBatch {
    intents: Vec<Intent>,
}

impl IntentBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { intents: Vec::new() }
    }

    /// Appends an intent.
    pub fn push(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// Number of intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Returns true if nothing was decided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Intents in decision order.
    #[must_use]
    pub fn as_slice(&self) -> &[Intent] {
        &self.intents
    }

    /// Iterates in decision order.
    pub fn iter(&self) -> std::slice::Iter<'_, Intent> {
        self.intents.iter()
    }

    /// Empties the batch, keeping its allocation.
    pub fn clear(&mut self) {
        self.intents.clear();
    }

    /// Takes the intents out, leaving the batch empty.
    pub fn take(&mut self) -> Vec<Intent> {
        std::mem::take(&mut self.intents)
    }
}

impl IntoIterator for IntentBatch {
    type Item = Intent;
    type IntoIter = std::vec::IntoIter<Intent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.into_iter()
    }
}

impl<'a> IntoIterator for &'a IntentBatch {
    type Item = &'a Intent;
    type IntoIter = std::slice::Iter<'a, Intent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.iter()
    }
}
