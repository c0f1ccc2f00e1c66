//! Action layer states: what the entity is *doing*.
//!
//! | State       | Priority | Capabilities                    | Leaves to           |
//! |-------------|----------|---------------------------------|---------------------|
//! | `None`      | 0        | -                               | anything            |
//! | `CastSkill` | 20       | `LOCK_MOVE`, `OVERLAY_MOTION`   | Hit, Death; None when the cast ends |
//! | `Hit`       | 30       | `LOCK_MOVE`                     | Death; None when the stagger ends   |
//! | `Death`     | 100      | all                             | nothing (forced only)               |

use oroboros_shared::Vec3;

use super::machine::{Capabilities, State, StateMachine, StateRequest};
use crate::config::ActionConfig;
use crate::entity::Entity;

/// Tags of the Action layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionTag {
    /// Free to act.
    None,
    /// Casting a skill.
    CastSkill,
    /// Staggered by a hit.
    Hit,
    /// Dead. Terminal.
    Death,
}

/// Priority of [`ActionTag::None`].
pub const PRIORITY_NONE: i32 = 0;
/// Priority of [`ActionTag::CastSkill`].
pub const PRIORITY_CAST: i32 = 20;
/// Priority of [`ActionTag::Hit`].
pub const PRIORITY_HIT: i32 = 30;
/// Priority of [`ActionTag::Death`].
pub const PRIORITY_DEATH: i32 = 100;

/// The Action layer machine.
pub type ActionMachine = StateMachine<ActionTag, Entity>;

/// Builds the Action layer, starting in `None`.
#[must_use]
pub fn action_machine(config: &ActionConfig) -> ActionMachine {
    StateMachine::new("action", Box::new(NoAction))
        .with_state(Box::new(CastSkillState::new(config.cast_duration)))
        .with_state(Box::new(HitState::new(config.hit_duration)))
        .with_state(Box::new(DeathState))
}

struct NoAction;

impl State<ActionTag, Entity> for NoAction {
    fn tag(&self) -> ActionTag {
        ActionTag::None
    }

    fn priority(&self) -> i32 {
        PRIORITY_NONE
    }
}

/// Runs for a fixed cast time, then releases itself.
struct CastSkillState {
    duration: f32,
    elapsed: f32,
}

impl CastSkillState {
    const fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
        }
    }

    fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

impl State<ActionTag, Entity> for CastSkillState {
    fn tag(&self) -> ActionTag {
        ActionTag::CastSkill
    }

    fn priority(&self) -> i32 {
        PRIORITY_CAST
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LOCK_MOVE | Capabilities::OVERLAY_MOTION
    }

    fn can_enter(&self, _from: ActionTag, ctx: &Entity) -> bool {
        ctx.casting.is_some()
    }

    fn can_exit(&self, to: ActionTag, _ctx: &Entity) -> bool {
        match to {
            ActionTag::Hit | ActionTag::Death => true,
            ActionTag::None => self.finished(),
            ActionTag::CastSkill => false,
        }
    }

    fn enter(&mut self, _from: ActionTag, ctx: &mut Entity) {
        self.elapsed = 0.0;
        ctx.move_dir = Vec3::ZERO;
    }

    fn exit(&mut self, _to: ActionTag, ctx: &mut Entity) {
        ctx.casting = None;
    }

    fn update(&mut self, _ctx: &mut Entity, dt: f32, requests: &mut StateRequest<'_, ActionTag>) {
        self.elapsed += dt;
        if self.finished() {
            requests.request(ActionTag::None);
        }
    }
}

/// Stagger that clears itself after a fixed duration.
struct HitState {
    duration: f32,
    elapsed: f32,
}

impl HitState {
    const fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
        }
    }
}

impl State<ActionTag, Entity> for HitState {
    fn tag(&self) -> ActionTag {
        ActionTag::Hit
    }

    fn priority(&self) -> i32 {
        PRIORITY_HIT
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LOCK_MOVE
    }

    fn can_exit(&self, to: ActionTag, _ctx: &Entity) -> bool {
        to == ActionTag::Death || self.elapsed >= self.duration
    }

    fn enter(&mut self, _from: ActionTag, ctx: &mut Entity) {
        self.elapsed = 0.0;
        ctx.move_dir = Vec3::ZERO;
    }

    fn update(&mut self, _ctx: &mut Entity, dt: f32, requests: &mut StateRequest<'_, ActionTag>) {
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            requests.request(ActionTag::None);
        }
    }
}

struct DeathState;

impl State<ActionTag, Entity> for DeathState {
    fn tag(&self) -> ActionTag {
        ActionTag::Death
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEATH
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn can_exit(&self, _to: ActionTag, _ctx: &Entity) -> bool {
        false
    }

    fn enter(&mut self, from: ActionTag, ctx: &mut Entity) {
        ctx.move_dir = Vec3::ZERO;
        ctx.casting = None;
        ctx.alive = false;
        tracing::info!("Entity {} died (was {:?})", ctx.id, from);
    }

    fn exit(&mut self, to: ActionTag, ctx: &mut Entity) {
        ctx.alive = true;
        tracing::info!("Entity {} revived into {:?}", ctx.id, to);
    }
}
