//! Motion layer states: how the entity is *moving*.

use super::machine::{State, StateMachine, StateRequest};
use crate::entity::Entity;

/// Tags of the Motion layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionTag {
    /// Standing still.
    Idle,
    /// Walking or running.
    Move,
}

/// The Motion layer machine.
pub type MotionMachine = StateMachine<MotionTag, Entity>;

/// Builds the Motion layer, starting in `Idle`.
///
/// `epsilon` is the move-direction magnitude that separates Idle from Move.
#[must_use]
pub fn motion_machine(epsilon: f32) -> MotionMachine {
    StateMachine::new("motion", Box::new(IdleMotion { epsilon }))
        .with_state(Box::new(MoveMotion { epsilon }))
}

struct IdleMotion {
    epsilon: f32,
}

impl State<MotionTag, Entity> for IdleMotion {
    fn tag(&self) -> MotionTag {
        MotionTag::Idle
    }

    fn update(&mut self, ctx: &mut Entity, _dt: f32, requests: &mut StateRequest<'_, MotionTag>) {
        if ctx.move_dir.length() > self.epsilon {
            requests.request(MotionTag::Move);
        }
    }
}

struct MoveMotion {
    epsilon: f32,
}

impl State<MotionTag, Entity> for MoveMotion {
    fn tag(&self) -> MotionTag {
        MotionTag::Move
    }

    fn update(&mut self, ctx: &mut Entity, _dt: f32, requests: &mut StateRequest<'_, MotionTag>) {
        if ctx.move_dir.length() <= self.epsilon {
            requests.request(MotionTag::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oroboros_shared::{EntityId, EntityKind, Vec3};

    #[test]
    fn test_idle_move_follow_direction() {
        let mut m = motion_machine(0.01);
        let mut e = Entity::new(EntityId(1), EntityKind::Player, Vec3::ZERO);

        m.update(&mut e, 0.02);
        assert_eq!(m.current(), MotionTag::Idle);

        e.move_dir = Vec3::new(0.005, 0.0, 0.0);
        m.update(&mut e, 0.02);
        assert_eq!(m.current(), MotionTag::Idle);

        e.move_dir = Vec3::X;
        m.update(&mut e, 0.02);
        assert_eq!(m.current(), MotionTag::Move);

        e.move_dir = Vec3::ZERO;
        m.update(&mut e, 0.02);
        assert_eq!(m.current(), MotionTag::Idle);
        assert_eq!(m.drain_transitions().len(), 2);
    }
}
