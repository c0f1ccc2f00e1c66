//! # AI Behavior
//!
//! One decision machine per AI-driven entity.
//!
//! ```text
//!            target assigned / acquired
//!   ┌──────┐ ─────────────────────────► ┌───────┐  dist <= 0.9 x range  ┌────────┐
//!   │ Idle │                            │ Chase │ ────────────────────► │ Attack │
//!   └──────┘ ◄───────────────────────── └───────┘ ◄──────────────────── └────────┘
//!      ▲      target lost / leash broken             dist > 1.2 x range     │
//!      └──────────────────────────────── target lost ───────────────────────┘
//! ```
//!
//! Agents never touch the world. Each tick they append [`Intent`]s to an
//! [`IntentBatch`]; the region gates them through the entity's Action
//! layer and hands the survivors to the movement and combat resolvers.
//!
//! Pathfinding, perception and threat selection are consumed through the
//! [`Pathfinder`], [`Perception`] and [`ThreatSelector`] traits.

mod agent;
mod intent;
mod services;

pub use agent::{AgentPath, AiAgent, Behavior};
pub use intent::{Intent, IntentBatch};
pub use services::{
    AiServices, AiWorld, AoiPerception, NavPathfinder, NearestThreat, Pathfinder, Perception,
    ThreatSelector,
};
