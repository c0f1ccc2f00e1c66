//! # State Coordinator
//!
//! Each entity runs two state machines side by side:
//!
//! ```text
//!            ┌─────────────────────────────┐
//!  tick ───► │ Action: None/Cast/Hit/Death │ ── capabilities ──┐
//!            └─────────────────────────────┘                   │
//!                                                              ▼
//!            ┌─────────────────────────────┐     skipped if OVERLAY_MOTION
//!            │ Motion: Idle/Move           │ ◄─────────────────┘
//!            └─────────────────────────────┘
//! ```
//!
//! ## Transition rules
//!
//! A plain request succeeds only if the target is registered and not
//! already active, the active state agrees to exit, the target agrees to
//! enter, and the target's priority is not lower than the active one.
//! A state releasing itself from its own update skips the priority check.
//! Forced changes skip everything but registration.
//!
//! A request made from inside the active state's update is buffered and
//! applied once, right after that update returns. Enter/Exit never nest.

mod action;
mod layered;
mod machine;
mod motion;

pub use action::{
    action_machine, ActionMachine, ActionTag, PRIORITY_CAST, PRIORITY_DEATH, PRIORITY_HIT,
    PRIORITY_NONE,
};
pub use layered::{LayerTransition, LayeredStateCoordinator};
pub use machine::{Capabilities, State, StateMachine, StateRequest, Transition};
pub use motion::{motion_machine, MotionMachine, MotionTag};
