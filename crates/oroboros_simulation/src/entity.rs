//! Region-owned entity record.

use oroboros_shared::{EntityId, EntityKind, SkillId, Vec3};

/// Skill cast currently requested on an entity's Action layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkillCast {
    /// Skill being cast.
    pub skill: SkillId,
    /// Target, if the skill has one.
    pub target: Option<EntityId>,
}

/// A simulated entity.
///
/// Owned by exactly one region. Everything else refers to it by id.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Region-unique id.
    pub id: EntityId,
    /// Player, monster or NPC.
    pub kind: EntityKind,
    /// World position.
    pub position: Vec3,
    /// Facing in degrees; 0 = +Z, 90 = +X.
    pub yaw: f32,
    /// Desired movement direction this tick. Zero when standing still.
    pub move_dir: Vec3,
    /// Cast in progress on the Action layer.
    pub casting: Option<SkillCast>,
    /// Cleared while the Action layer is in Death.
    pub alive: bool,
}

impl Entity {
    /// Creates an entity standing still and facing +Z.
    #[must_use]
    pub const fn new(id: EntityId, kind: EntityKind, position: Vec3) -> Self {
        Self {
            id,
            kind,
            position,
            yaw: 0.0,
            move_dir: Vec3::ZERO,
            casting: None,
            alive: true,
        }
    }

    /// Unit vector the entity is facing, on the ground plane.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        let rad = self.yaw.to_radians();
        Vec3::new(rad.sin(), 0.0, rad.cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_matches_yaw_convention() {
        let mut e = Entity::new(EntityId(1), EntityKind::Monster, Vec3::ZERO);
        assert!((e.forward() - Vec3::Z).length() < 1e-6);
        e.yaw = 90.0;
        assert!((e.forward() - Vec3::X).length() < 1e-6);
    }
}
