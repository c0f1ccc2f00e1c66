//! Identifiers shared across owners.
//!
//! Owners never hold references to each other's data. They hold these ids
//! and resolve them through the owning region when needed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Region-unique entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a mailbox that can receive timer callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

/// Client session identifier, echoed by heartbeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Skill identifier carried by attack intents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SkillId(pub u32);

/// Type of entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    /// Player character.
    #[default]
    Player = 1,
    /// Hostile NPC.
    Monster = 2,
    /// Friendly NPC.
    Npc = 3,
}

impl EntityKind {
    /// Returns true when `other` is a valid attack target for `self`.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Monster, Self::Player) | (Self::Player, Self::Monster)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostility_is_symmetric() {
        assert!(EntityKind::Monster.is_hostile_to(EntityKind::Player));
        assert!(EntityKind::Player.is_hostile_to(EntityKind::Monster));
        assert!(!EntityKind::Monster.is_hostile_to(EntityKind::Monster));
        assert!(!EntityKind::Npc.is_hostile_to(EntityKind::Player));
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "#42");
    }
}
