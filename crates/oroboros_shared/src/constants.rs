//! # Simulation Constants
//!
//! Default tuning for the realm core.
//!
//! **NOTE:** These are only the defaults. The live values come from
//! `SimConfig`, which is loaded once at startup and injected into each owner.

// =============================================================================
// TICK CONFIGURATION
// =============================================================================

/// Fixed simulation step in milliseconds (50 Hz).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

/// Number of slots in the timer wheel.
///
/// At 20 ms per tick one revolution covers 10.24 seconds; longer delays
/// carry a rounds counter.
pub const DEFAULT_WHEEL_SIZE: usize = 512;

/// Capacity of each tick-event subscriber channel.
pub const DEFAULT_TICK_BUS_CAPACITY: usize = 256;

// =============================================================================
// AREA OF INTEREST
// =============================================================================

/// Edge length of one AOI grid cell (world units).
pub const DEFAULT_CELL_SIZE: f32 = 16.0;

/// Horizontal radius within which entities see each other.
pub const DEFAULT_VIEW_RANGE: f32 = 48.0;

/// Maximum vertical separation for two entities to see each other.
pub const DEFAULT_HEIGHT_TOLERANCE: f32 = 8.0;

// =============================================================================
// AI
// =============================================================================

/// Distance from home past which a chasing agent disengages.
pub const DEFAULT_LEASH_DISTANCE: f32 = 30.0;

/// Radius around home in which idle agents patrol.
pub const DEFAULT_PATROL_RADIUS: f32 = 6.0;

/// Seconds between path refreshes while chasing.
pub const DEFAULT_REPATH_COOLDOWN: f32 = 0.5;

/// Arrival tolerance for waypoints, patrol points and home.
pub const DEFAULT_ARRIVE_TOLERANCE: f32 = 0.5;

/// Default attack range for AI agents.
pub const DEFAULT_ATTACK_RANGE: f32 = 2.5;

/// Facing error (degrees) above which an agent turns instead of attacking.
pub const FACING_TOLERANCE_DEG: f32 = 15.0;

/// Agents engage once inside this fraction of their attack range.
pub const ATTACK_ENTER_FACTOR: f32 = 0.9;

/// Agents resume chasing once outside this fraction of their attack range.
pub const ATTACK_EXIT_FACTOR: f32 = 1.2;

// =============================================================================
// ACTION LAYER
// =============================================================================

/// Seconds an entity stays in hit-stun.
pub const DEFAULT_HIT_DURATION: f32 = 0.4;

/// Move-direction magnitude above which the motion layer counts as moving.
pub const MOVE_EPSILON: f32 = 0.01;

// =============================================================================
// NAV VOLUME
// =============================================================================

/// Magic number at the head of every nav volume file ("VOXL").
pub const NAV_MAGIC: i32 = 0x564F_584C;

/// Vertical voxel offsets scanned by height projection, each way.
pub const NAV_SNAP_RANGE: i32 = 3;
