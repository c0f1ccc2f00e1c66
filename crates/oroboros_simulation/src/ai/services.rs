//! Narrow services the AI consumes, and their default implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use oroboros_shared::{EntityId, Vec3};

use crate::entity::Entity;
use crate::nav::NavVolume;
use crate::spatial::SpatialIndex;

/// Upper bound on waypoints in a straight-line path.
const MAX_WAYPOINTS: usize = 64;

/// Read-only view of a region during AI evaluation.
#[derive(Clone, Copy)]
pub struct AiWorld<'a> {
    entities: &'a BTreeMap<EntityId, Entity>,
    spatial: &'a SpatialIndex,
}

impl<'a> AiWorld<'a> {
    /// Creates a view over a region's entities and AOI index.
    #[must_use]
    pub const fn new(entities: &'a BTreeMap<EntityId, Entity>, spatial: &'a SpatialIndex) -> Self {
        Self { entities, spatial }
    }

    /// Resolves an id to a live entity. Dead or despawned ids resolve to
    /// nothing.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> Option<&'a Entity> {
        self.entities.get(&id).filter(|e| e.alive)
    }

    /// The region's AOI index.
    #[must_use]
    pub const fn spatial(&self) -> &'a SpatialIndex {
        self.spatial
    }
}

/// Produces waypoints between two points.
pub trait Pathfinder: Send + Sync {
    /// Waypoints from `from` to `to`, start excluded, goal last. `None` if
    /// no path exists or the service cannot answer.
    fn request_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;
}

/// Tells an agent which hostiles it can currently see.
pub trait Perception: Send + Sync {
    /// Hostile, live entities visible to `observer`, sorted by id.
    fn visible_hostiles(&self, observer: &Entity, world: &AiWorld<'_>) -> Vec<EntityId>;
}

/// Chooses a target among candidates.
pub trait ThreatSelector: Send + Sync {
    /// Picks one of `candidates`, or none.
    fn pick_target(&self, agent: &Entity, candidates: &[EntityId], world: &AiWorld<'_>) -> Option<EntityId>;
}

/// Straight-line paths projected onto the nav volume.
///
/// Every waypoint is snapped to walkable ground; if any sample has no
/// walkable voxel in its column the path is refused. An unusable volume
/// refuses every request.
pub struct NavPathfinder {
    nav: Arc<NavVolume>,
    spacing: f32,
}

impl NavPathfinder {
    /// Creates a pathfinder sampling every `spacing` world units.
    #[must_use]
    pub fn new(nav: Arc<NavVolume>, spacing: f32) -> Self {
        Self {
            nav,
            spacing: spacing.max(0.1),
        }
    }

    /// Underlying volume.
    #[must_use]
    pub fn nav(&self) -> &NavVolume {
        &self.nav
    }
}

impl Pathfinder for NavPathfinder {
    fn request_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        if !self.nav.is_available() {
            return None;
        }
        let span = to - from;
        let steps = ((span.flat().length() / self.spacing).ceil() as usize).clamp(1, MAX_WAYPOINTS);
        let mut waypoints = Vec::with_capacity(steps);
        for i in 1..=steps {
            let sample = from + span * (i as f32 / steps as f32);
            match self.nav.try_snap_height(sample) {
                Ok(Some(point)) => waypoints.push(Vec3::new(sample.x, point.y, sample.z)),
                Ok(None) | Err(_) => return None,
            }
        }
        Some(waypoints)
    }
}

/// Perception backed by the AOI visible set.
#[derive(Clone, Copy, Debug, Default)]
pub struct AoiPerception;

impl Perception for AoiPerception {
    fn visible_hostiles(&self, observer: &Entity, world: &AiWorld<'_>) -> Vec<EntityId> {
        let Some(visible) = world.spatial().visible_set(observer.id) else {
            return Vec::new();
        };
        visible
            .iter()
            .copied()
            .filter(|id| {
                world
                    .resolve(*id)
                    .is_some_and(|other| observer.kind.is_hostile_to(other.kind))
            })
            .collect()
    }
}

/// Picks the horizontally nearest candidate; ties go to the lower id.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestThreat;

impl ThreatSelector for NearestThreat {
    fn pick_target(&self, agent: &Entity, candidates: &[EntityId], world: &AiWorld<'_>) -> Option<EntityId> {
        candidates
            .iter()
            .filter_map(|id| {
                world
                    .resolve(*id)
                    .map(|e| (agent.position.horizontal_distance_squared(e.position), *id))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }
}

/// The three services bundled for a region.
pub struct AiServices {
    /// Path requests.
    pub pathfinder: Box<dyn Pathfinder>,
    /// Hostile detection.
    pub perception: Box<dyn Perception>,
    /// Target choice.
    pub threat: Box<dyn ThreatSelector>,
}

impl AiServices {
    /// Default services over a nav volume.
    #[must_use]
    pub fn with_nav(nav: Arc<NavVolume>) -> Self {
        let spacing = nav.grid().map_or(1.0, |g| g.voxel_size * 2.0);
        Self {
            pathfinder: Box::new(NavPathfinder::new(nav, spacing)),
            perception: Box::new(AoiPerception),
            threat: Box::new(NearestThreat),
        }
    }
}
