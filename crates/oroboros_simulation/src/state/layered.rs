//! Two-layer coordinator: Action over Motion.

use super::action::{action_machine, ActionMachine, ActionTag};
use super::machine::{Capabilities, Transition};
use super::motion::{motion_machine, MotionMachine, MotionTag};
use crate::config::ActionConfig;
use crate::entity::Entity;

/// A transition on either layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerTransition {
    /// Action layer change.
    Action(Transition<ActionTag>),
    /// Motion layer change.
    Motion(Transition<MotionTag>),
}

/// Per-entity Action and Motion machines updated in a fixed order.
pub struct LayeredStateCoordinator {
    action: ActionMachine,
    motion: MotionMachine,
}

impl LayeredStateCoordinator {
    /// Creates both layers in their resting states (`None`, `Idle`).
    #[must_use]
    pub fn new(config: &ActionConfig) -> Self {
        Self {
            action: action_machine(config),
            motion: motion_machine(config.move_epsilon),
        }
    }

    /// Runs the resting states' `enter` hooks against `entity`.
    pub fn start(&mut self, entity: &mut Entity) {
        self.action.start(entity);
        self.motion.start(entity);
    }

    /// Action layer.
    #[must_use]
    pub const fn action(&self) -> &ActionMachine {
        &self.action
    }

    /// Motion layer.
    #[must_use]
    pub const fn motion(&self) -> &MotionMachine {
        &self.motion
    }

    /// Current Action tag.
    #[must_use]
    pub fn action_state(&self) -> ActionTag {
        self.action.current()
    }

    /// Current Motion tag.
    #[must_use]
    pub fn motion_state(&self) -> MotionTag {
        self.motion.current()
    }

    /// Flags of the active Action state.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.action.capabilities()
    }

    /// Returns false while the Action layer locks movement.
    #[must_use]
    pub fn can_move(&self) -> bool {
        !self.capabilities().contains(Capabilities::LOCK_MOVE)
    }

    /// Returns false while the Action layer locks turning.
    #[must_use]
    pub fn can_turn(&self) -> bool {
        !self.capabilities().contains(Capabilities::LOCK_TURN)
    }

    /// Guarded Action change.
    pub fn request_action(&mut self, to: ActionTag, entity: &mut Entity) -> bool {
        self.action.request_change(to, entity)
    }

    /// Unguarded Action change.
    pub fn force_action(&mut self, to: ActionTag, entity: &mut Entity) -> bool {
        self.action.force_change(to, entity)
    }

    /// Guarded Motion change.
    pub fn request_motion(&mut self, to: MotionTag, entity: &mut Entity) -> bool {
        self.motion.request_change(to, entity)
    }

    /// Advances Action, then Motion unless the Action state overlays it.
    ///
    /// The overlay flag is read after the Action update, so a cast that
    /// ends this tick lets Motion run in the same tick.
    pub fn update(&mut self, entity: &mut Entity, dt: f32) {
        self.action.update(entity, dt);
        if !self.action.capabilities().contains(Capabilities::OVERLAY_MOTION) {
            self.motion.update(entity, dt);
        }
    }

    /// Takes queued transitions, Action layer first.
    pub fn drain_transitions(&mut self) -> Vec<LayerTransition> {
        self.action
            .drain_transitions()
            .into_iter()
            .map(LayerTransition::Action)
            .chain(self.motion.drain_transitions().into_iter().map(LayerTransition::Motion))
            .collect()
    }
}
