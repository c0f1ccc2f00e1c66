//! # OROBOROS Shared
//!
//! Common types used by every owner in the realm core: the scheduler,
//! regions, spatial indices and the AI.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - an async runtime
//! - channels or locks
//! - file or network I/O
//!
//! If you need any of that, put it in `oroboros_simulation`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod math;

pub use constants::{
    DEFAULT_CELL_SIZE, DEFAULT_HEIGHT_TOLERANCE, DEFAULT_TICK_INTERVAL_MS, DEFAULT_VIEW_RANGE,
    DEFAULT_WHEEL_SIZE,
};
pub use ids::{EntityId, EntityKind, OwnerId, SessionId, SkillId};
pub use math::{angle_delta_deg, yaw_towards_deg, Vec3};
