//! # Region
//!
//! Owner of every entity in one world region, and of everything that shares
//! an entity's lifetime: its AOI record, its layered state coordinator and
//! its AI agent. Those are created together on spawn and removed together
//! on despawn.
//!
//! ## Tick pipeline
//!
//! ```text
//! TickEvent
//!   │
//!   ├─► 1. refresh AOI for every entity (sorted by id)
//!   ├─► 2. every live agent thinks          ──► IntentBatch
//!   ├─► 3. gate intents by Action capabilities
//!   │        Move   dropped under LOCK_MOVE
//!   │        Rotate dropped under LOCK_TURN
//!   │        Attack becomes a CastSkill request, kept only if accepted
//!   └─► 4. update every coordinator (Action, then Motion)
//!                                          ──► RegionTickReport
//! ```
//!
//! A failure for one entity is logged and skipped; the tick goes on.

use std::collections::BTreeMap;
use std::sync::Arc;

use oroboros_shared::{EntityId, EntityKind, SkillId, Vec3};

use crate::ai::{AiAgent, AiServices, AiWorld, Intent, IntentBatch};
use crate::config::SimConfig;
use crate::entity::{Entity, SkillCast};
use crate::error::{SimError, SimResult};
use crate::nav::NavVolume;
use crate::scheduler::{TickEvent, TimerFired};
use crate::spatial::{AoiDelta, SpatialIndex};
use crate::state::{ActionTag, LayerTransition, LayeredStateCoordinator};

/// AI part of a spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpec {
    /// Skill used for attacks.
    pub skill: SkillId,
    /// Patrol and leash anchor. Defaults to the spawn position.
    pub home: Option<Vec3>,
}

/// Everything needed to create an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequest {
    /// Region-unique id.
    pub id: EntityId,
    /// Player, monster or NPC.
    pub kind: EntityKind,
    /// Spawn position.
    pub position: Vec3,
    /// Spawn facing in degrees.
    pub yaw: f32,
    /// Present for AI-driven entities.
    pub agent: Option<AgentSpec>,
}

/// Payloads the region schedules on the timer wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionTimer {
    /// Bring a dead entity back to the `None` action.
    Revive(EntityId),
    /// Remove an entity, e.g. a corpse.
    Despawn(EntityId),
}

/// Messages a region processes.
#[derive(Clone, Debug, PartialEq)]
pub enum RegionMessage {
    /// Create an entity.
    Spawn(SpawnRequest),
    /// Remove an entity and everything attached to it.
    Despawn(EntityId),
    /// Position report from the movement resolver.
    ApplyMovement {
        /// Entity that moved.
        id: EntityId,
        /// New position.
        position: Vec3,
        /// New facing in degrees.
        yaw: f32,
        /// Current movement direction.
        move_dir: Vec3,
    },
    /// Assign or clear an agent's target.
    AssignTarget {
        /// Agent entity.
        agent: EntityId,
        /// New target.
        target: Option<EntityId>,
    },
    /// Combat resolver landed a hit.
    ApplyHit(EntityId),
    /// Combat resolver killed the entity.
    ApplyDeath(EntityId),
    /// A region timer fired.
    TimerFired(TimerFired<RegionTimer>),
}

/// Result of one [`Region::handle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionReply {
    /// Applied, nothing to report.
    Done,
    /// A guard refused the change.
    Rejected,
    /// The entity's visible set changed.
    Visibility(AoiDelta),
    /// The entity left; these observers had it in view.
    Departed {
        /// Observers that need a leave notification.
        observers: Vec<EntityId>,
    },
}

/// Output of one region tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionTickReport {
    /// Tick processed.
    pub tick: u64,
    /// Intents that passed capability gating, in decision order.
    pub intents: Vec<Intent>,
    /// Intents dropped by gating.
    pub dropped_intents: usize,
    /// State transitions, per entity, Action layer first.
    pub transitions: Vec<(EntityId, LayerTransition)>,
    /// Non-empty visibility changes.
    pub visibility: Vec<(EntityId, AoiDelta)>,
    /// Entities skipped because of an error.
    pub failures: usize,
}

/// One region's simulation state.
pub struct Region {
    name: String,
    config: Arc<SimConfig>,
    entities: BTreeMap<EntityId, Entity>,
    layers: BTreeMap<EntityId, LayeredStateCoordinator>,
    agents: BTreeMap<EntityId, AiAgent>,
    spatial: SpatialIndex,
    services: AiServices,
    scratch: IntentBatch,
    last_tick: Option<u64>,
}

impl Region {
    /// Creates an empty region with the given AI services.
    #[must_use]
    pub fn new(name: impl Into<String>, config: Arc<SimConfig>, services: AiServices) -> Self {
        let name = name.into();
        tracing::info!("Region {} created", name);
        Self {
            name,
            spatial: SpatialIndex::new(config.aoi),
            config,
            entities: BTreeMap::new(),
            layers: BTreeMap::new(),
            agents: BTreeMap::new(),
            services,
            scratch: IntentBatch::new(),
            last_tick: None,
        }
    }

    /// Creates an empty region with the default services over `nav`.
    #[must_use]
    pub fn with_nav(name: impl Into<String>, config: Arc<SimConfig>, nav: Arc<NavVolume>) -> Self {
        Self::new(name, config, AiServices::with_nav(nav))
    }

    /// Region name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the region holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Looks up an entity's AI agent.
    #[must_use]
    pub fn agent(&self, id: EntityId) -> Option<&AiAgent> {
        self.agents.get(&id)
    }

    /// Looks up an entity's state layers.
    #[must_use]
    pub fn layers(&self, id: EntityId) -> Option<&LayeredStateCoordinator> {
        self.layers.get(&id)
    }

    /// The region's AOI index.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Processes one message.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownEntity`] if the message names an id this region
    /// does not own, [`SimError::DuplicateEntity`] on a spawn collision.
    pub fn handle(&mut self, message: RegionMessage) -> SimResult<RegionReply> {
        match message {
            RegionMessage::Spawn(request) => self.spawn(request).map(RegionReply::Visibility),
            RegionMessage::Despawn(id) => self.despawn(id).map(|observers| RegionReply::Departed { observers }),
            RegionMessage::ApplyMovement {
                id,
                position,
                yaw,
                move_dir,
            } => self
                .apply_movement(id, position, yaw, move_dir)
                .map(RegionReply::Visibility),
            RegionMessage::AssignTarget { agent, target } => {
                let agent = self.agents.get_mut(&agent).ok_or(SimError::UnknownEntity(agent))?;
                agent.set_target(target);
                Ok(RegionReply::Done)
            }
            RegionMessage::ApplyHit(id) => self.request_action(id, ActionTag::Hit),
            RegionMessage::ApplyDeath(id) => self.request_action(id, ActionTag::Death),
            RegionMessage::TimerFired(fired) => match fired.message {
                RegionTimer::Revive(id) => {
                    let (entity, layers) = self.entity_and_layers(id)?;
                    if layers.action_state() != ActionTag::Death {
                        return Ok(RegionReply::Rejected);
                    }
                    layers.force_action(ActionTag::None, entity);
                    Ok(RegionReply::Done)
                }
                RegionTimer::Despawn(id) => self.despawn(id).map(|observers| RegionReply::Departed { observers }),
            },
        }
    }

    /// Creates an entity with its AOI record, state layers and optional
    /// agent. Returns what the new entity sees.
    ///
    /// # Errors
    ///
    /// [`SimError::DuplicateEntity`] if the id is taken.
    pub fn spawn(&mut self, request: SpawnRequest) -> SimResult<AoiDelta> {
        if self.entities.contains_key(&request.id) {
            return Err(SimError::DuplicateEntity(request.id));
        }
        let mut entity = Entity::new(request.id, request.kind, request.position);
        entity.yaw = request.yaw;
        let mut layers = LayeredStateCoordinator::new(&self.config.actions);
        layers.start(&mut entity);
        self.entities.insert(request.id, entity);
        self.layers.insert(request.id, layers);
        if let Some(spec) = request.agent {
            let home = spec.home.unwrap_or(request.position);
            self.agents
                .insert(request.id, AiAgent::new(request.id, home, spec.skill, self.config.ai));
        }
        self.spatial.add(request.id, request.position);
        tracing::debug!("Region {}: spawned {:?} {}", self.name, request.kind, request.id);
        Ok(self.spatial.update(request.id, request.position))
    }

    /// Removes an entity and everything attached to it. Returns the
    /// observers that had it in view.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownEntity`] if the id is not owned here.
    pub fn despawn(&mut self, id: EntityId) -> SimResult<Vec<EntityId>> {
        if self.entities.remove(&id).is_none() {
            return Err(SimError::UnknownEntity(id));
        }
        self.layers.remove(&id);
        self.agents.remove(&id);
        let observers = self.spatial.remove(id);
        tracing::debug!(
            "Region {}: despawned {}, {} observers notified",
            self.name,
            id,
            observers.len()
        );
        Ok(observers)
    }

    /// Applies a position report and refreshes the entity's view.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownEntity`] if the id is not owned here.
    pub fn apply_movement(&mut self, id: EntityId, position: Vec3, yaw: f32, move_dir: Vec3) -> SimResult<AoiDelta> {
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;
        entity.position = position;
        entity.yaw = yaw;
        entity.move_dir = move_dir;
        Ok(self.spatial.update(id, position))
    }

    fn entity_and_layers(&mut self, id: EntityId) -> SimResult<(&mut Entity, &mut LayeredStateCoordinator)> {
        match (self.entities.get_mut(&id), self.layers.get_mut(&id)) {
            (Some(entity), Some(layers)) => Ok((entity, layers)),
            _ => Err(SimError::UnknownEntity(id)),
        }
    }

    fn request_action(&mut self, id: EntityId, to: ActionTag) -> SimResult<RegionReply> {
        let (entity, layers) = self.entity_and_layers(id)?;
        if !layers.request_action(to, entity) {
            return Ok(RegionReply::Rejected);
        }
        if to == ActionTag::Death {
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.set_target(None);
            }
        }
        Ok(RegionReply::Done)
    }

    /// Runs one simulation step.
    pub fn on_tick(&mut self, event: &TickEvent) -> RegionTickReport {
        if let Some(last) = self.last_tick {
            if event.tick != last + 1 {
                tracing::warn!("Region {}: tick {} after {}", self.name, event.tick, last);
            }
        }
        self.last_tick = Some(event.tick);
        let dt = event.delta_time_seconds;
        let mut report = RegionTickReport {
            tick: event.tick,
            ..RegionTickReport::default()
        };

        // 1. AOI refresh.
        for (id, entity) in &self.entities {
            let delta = self.spatial.update(*id, entity.position);
            if !delta.is_empty() {
                report.visibility.push((*id, delta));
            }
        }

        // 2. Decisions.
        self.scratch.clear();
        {
            let world = AiWorld::new(&self.entities, &self.spatial);
            for (id, agent) in &mut self.agents {
                let Some(me) = self.entities.get(id) else {
                    tracing::warn!("Region {}: agent {} has no entity", self.name, id);
                    report.failures += 1;
                    continue;
                };
                if me.alive {
                    agent.think(me, &world, &self.services, dt, &mut self.scratch);
                }
            }
        }

        // 3. Gating.
        for id in self.agents.keys() {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.move_dir = Vec3::ZERO;
            }
        }
        for intent in self.scratch.take() {
            match self.gate(intent) {
                Ok(true) => report.intents.push(intent),
                Ok(false) => report.dropped_intents += 1,
                Err(err) => {
                    tracing::warn!("Region {}: intent {:?} failed: {}", self.name, intent, err);
                    report.failures += 1;
                }
            }
        }

        // 4. State layers.
        for (id, layers) in &mut self.layers {
            let Some(entity) = self.entities.get_mut(id) else {
                tracing::warn!("Region {}: layers for missing entity {}", self.name, id);
                report.failures += 1;
                continue;
            };
            layers.update(entity, dt);
            report
                .transitions
                .extend(layers.drain_transitions().into_iter().map(|t| (*id, t)));
        }

        report
    }

    /// Applies one intent if the entity's Action layer allows it.
    fn gate(&mut self, intent: Intent) -> SimResult<bool> {
        let id = intent.entity();
        let (entity, layers) = self.entity_and_layers(id)?;
        let accepted = match intent {
            Intent::Move {
                target_yaw, direction, ..
            } => {
                if layers.can_move() {
                    entity.move_dir = direction;
                    if layers.can_turn() {
                        entity.yaw = target_yaw;
                    }
                    true
                } else {
                    false
                }
            }
            Intent::Rotate { yaw, .. } => {
                if layers.can_turn() {
                    entity.yaw = yaw;
                    true
                } else {
                    false
                }
            }
            Intent::Attack { target, skill, .. } => {
                let previous = entity.casting.replace(SkillCast {
                    skill,
                    target: Some(target),
                });
                let accepted = layers.request_action(ActionTag::CastSkill, entity);
                if !accepted {
                    entity.casting = previous;
                }
                accepted
            }
        };
        Ok(accepted)
    }
}
