//! # OROBOROS Simulation - The Realm Core
//!
//! The authoritative heartbeat of a region: a fixed-interval tick
//! scheduler, an area-of-interest grid, a voxel nav volume, layered entity
//! state machines and a per-entity AI loop.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────────┐  TickEvent (bus)   ┌──────────────────────────────┐
//!  │ TickScheduler  │ ─────────────────► │ Region                        │
//!  │  clock + wheel │                    │  entities                     │
//!  │                │  TimerFired        │  SpatialIndex  (AOI)          │
//!  │                │ ─────────────────► │  LayeredStateCoordinator/ent  │
//!  └────────────────┘  (mailbox)         │  AiAgent/ent ──► IntentBatch  │
//!          ▲                             └──────────────┬───────────────┘
//!          │ SchedulerHandle                            │ gated intents
//!          │ (register / cancel / heartbeat)            ▼
//!      other owners                         movement & combat resolvers
//! ```
//!
//! ## Ownership
//!
//! Every piece of mutable state has exactly one owner and is only touched
//! by that owner's task. Owners talk through channels and refer to each
//! other's entities by [`EntityId`](oroboros_shared::EntityId), never by
//! reference.
//!
//! ## Failure policy
//!
//! A bad timer, a bad query or a missing entity is logged and skipped. The
//! tick always completes.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod ai;
pub mod config;
pub mod entity;
pub mod error;
pub mod nav;
pub mod region;
pub mod scheduler;
pub mod spatial;
pub mod state;

pub use ai::{AiAgent, AiServices, Behavior, Intent, IntentBatch};
pub use config::SimConfig;
pub use entity::{Entity, SkillCast};
pub use error::{SimError, SimResult};
pub use nav::{NavVolume, VoxelGrid};
pub use region::{AgentSpec, Region, RegionMessage, RegionReply, RegionTickReport, RegionTimer, SpawnRequest};
pub use scheduler::{
    Delay, SchedulerHandle, SchedulerMessage, TickBus, TickEvent, TickScheduler, TimerFired,
};
pub use spatial::{AoiDelta, SpatialIndex};
pub use state::{ActionTag, LayeredStateCoordinator, MotionTag};
