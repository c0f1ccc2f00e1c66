//! Per-agent Idle/Chase/Attack decision machine.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use oroboros_shared::constants::{ATTACK_ENTER_FACTOR, ATTACK_EXIT_FACTOR, FACING_TOLERANCE_DEG};
use oroboros_shared::{angle_delta_deg, yaw_towards_deg, EntityId, SkillId, Vec3};

use super::intent::{Intent, IntentBatch};
use super::services::{AiServices, AiWorld};
use crate::config::AiConfig;
use crate::entity::Entity;

/// Active behavior of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Behavior {
    /// Patrolling, returning home, or looking for a target.
    #[default]
    Idle,
    /// Closing in on the target.
    Chase,
    /// In range: turning to face and attacking.
    Attack,
}

/// Waypoints with a cursor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentPath {
    waypoints: Vec<Vec3>,
    cursor: usize,
    goal: Vec3,
}

impl AgentPath {
    /// Remaining waypoints.
    #[must_use]
    pub fn remaining(&self) -> &[Vec3] {
        self.waypoints.get(self.cursor..).unwrap_or(&[])
    }

    /// Goal the path was planned for.
    #[must_use]
    pub const fn goal(&self) -> Vec3 {
        self.goal
    }

    /// Returns true if there is nothing left to follow.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    fn clear(&mut self) {
        self.waypoints.clear();
        self.cursor = 0;
    }
}

/// AI state for one entity.
///
/// Holds ids, never references: the entity and its target are resolved
/// through the region on every tick.
pub struct AiAgent {
    entity: EntityId,
    target: Option<EntityId>,
    behavior: Behavior,
    home: Vec3,
    path: AgentPath,
    patrol_point: Option<Vec3>,
    returning_home: bool,
    repath_cooldown: f32,
    attack_cooldown: f32,
    skill: SkillId,
    config: AiConfig,
    rng: ChaCha8Rng,
}

impl AiAgent {
    /// Creates an idle agent anchored at `home`.
    ///
    /// Patrol points are drawn from a generator seeded with the entity id
    /// and the configured world seed, so runs are reproducible.
    #[must_use]
    pub fn new(entity: EntityId, home: Vec3, skill: SkillId, config: AiConfig) -> Self {
        let seed = config.world_seed ^ entity.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            entity,
            target: None,
            behavior: Behavior::Idle,
            home,
            path: AgentPath::default(),
            patrol_point: None,
            returning_home: false,
            repath_cooldown: 0.0,
            attack_cooldown: 0.0,
            skill,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Entity this agent drives.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Current target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Active behavior.
    #[must_use]
    pub const fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Anchor for patrols and the leash.
    #[must_use]
    pub const fn home(&self) -> Vec3 {
        self.home
    }

    /// True while walking back after a leash break.
    #[must_use]
    pub const fn is_returning_home(&self) -> bool {
        self.returning_home
    }

    /// Current path.
    #[must_use]
    pub const fn path(&self) -> &AgentPath {
        &self.path
    }

    /// Current patrol point, if one has been picked.
    #[must_use]
    pub const fn patrol_point(&self) -> Option<Vec3> {
        self.patrol_point
    }

    /// Tuning in effect.
    #[must_use]
    pub const fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Assigns or clears the target.
    ///
    /// A target assigned while returning home is kept and chased once the
    /// agent is back home.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    /// Moves the anchor; takes effect for the next patrol point.
    pub fn set_home(&mut self, home: Vec3) {
        self.home = home;
        self.patrol_point = None;
    }

    /// Evaluates one tick and appends the resulting intents to `out`.
    ///
    /// At most one behavior change happens per tick; the new behavior acts
    /// on the next tick.
    pub fn think(&mut self, me: &Entity, world: &AiWorld<'_>, services: &AiServices, dt: f32, out: &mut IntentBatch) {
        self.repath_cooldown = (self.repath_cooldown - dt).max(0.0);
        self.attack_cooldown = (self.attack_cooldown - dt).max(0.0);

        if let Some(id) = self.target {
            if world.resolve(id).is_none() {
                tracing::debug!("Agent {} lost target {}", self.entity, id);
                self.target = None;
            }
        }

        match self.behavior {
            Behavior::Idle => self.idle(me, world, services, out),
            Behavior::Chase => self.chase(me, world, services, out),
            Behavior::Attack => self.attack(me, world, dt, out),
        }
    }

    fn switch(&mut self, next: Behavior) {
        if self.behavior != next {
            tracing::debug!("Agent {} behavior: {:?} -> {:?}", self.entity, self.behavior, next);
            self.behavior = next;
            self.path.clear();
        }
    }

    fn idle(&mut self, me: &Entity, world: &AiWorld<'_>, services: &AiServices, out: &mut IntentBatch) {
        if self.returning_home {
            if me.position.horizontal_distance(self.home) <= self.config.arrive_tolerance {
                tracing::debug!("Agent {} is home", self.entity);
                self.returning_home = false;
                self.path.clear();
            } else {
                self.move_towards(me, self.home, services, out);
            }
            return;
        }

        if self.target.is_none() {
            let hostiles = services.perception.visible_hostiles(me, world);
            self.target = services.threat.pick_target(me, &hostiles, world);
            if let Some(target) = self.target {
                tracing::debug!("Agent {} acquired target {}", self.entity, target);
            }
        }
        if self.target.is_some() {
            self.switch(Behavior::Chase);
            return;
        }

        if self.config.patrol_radius <= 0.0 {
            return;
        }
        let point = match self.patrol_point {
            Some(point) => point,
            None => self.next_patrol_point(),
        };
        if me.position.horizontal_distance(point) <= self.config.arrive_tolerance {
            self.patrol_point = Some(self.next_patrol_point());
            self.path.clear();
            return;
        }
        self.patrol_point = Some(point);
        self.move_towards(me, point, services, out);
    }

    fn chase(&mut self, me: &Entity, world: &AiWorld<'_>, services: &AiServices, out: &mut IntentBatch) {
        let Some(target) = self.target.and_then(|id| world.resolve(id)) else {
            self.switch(Behavior::Idle);
            return;
        };

        if self.home.horizontal_distance(me.position) > self.config.leash_distance {
            tracing::info!(
                "Agent {} leashed at {:.1} from home, dropping {}",
                self.entity,
                self.home.horizontal_distance(me.position),
                target.id
            );
            self.target = None;
            self.returning_home = true;
            self.switch(Behavior::Idle);
            return;
        }

        if me.position.horizontal_distance(target.position) <= ATTACK_ENTER_FACTOR * self.config.attack_range {
            self.switch(Behavior::Attack);
            return;
        }

        self.move_towards(me, target.position, services, out);
    }

    fn attack(&mut self, me: &Entity, world: &AiWorld<'_>, dt: f32, out: &mut IntentBatch) {
        let Some(target) = self.target.and_then(|id| world.resolve(id)) else {
            self.switch(Behavior::Idle);
            return;
        };

        if me.position.horizontal_distance(target.position) > ATTACK_EXIT_FACTOR * self.config.attack_range {
            self.switch(Behavior::Chase);
            return;
        }

        let desired = yaw_towards_deg(me.position, target.position);
        let error = angle_delta_deg(me.yaw, desired);
        if error.abs() > FACING_TOLERANCE_DEG {
            let turn = error.signum() * (self.config.turn_rate_deg * dt).min(error.abs());
            out.push(Intent::Rotate {
                entity: self.entity,
                yaw: normalize_yaw(me.yaw + turn),
            });
            return;
        }

        if self.attack_cooldown <= 0.0 {
            out.push(Intent::Attack {
                entity: self.entity,
                target: target.id,
                skill: self.skill,
            });
            self.attack_cooldown = self.config.attack_interval;
        }
    }

    /// Follows the current path towards `goal`, replanning when the goal
    /// has moved or the path ran out and the cooldown allows it.
    fn move_towards(&mut self, me: &Entity, goal: Vec3, services: &AiServices, out: &mut IntentBatch) {
        let stale = self.path.is_exhausted()
            || self.path.goal.horizontal_distance(goal) > self.config.arrive_tolerance;
        if stale && self.repath_cooldown <= 0.0 {
            self.repath_cooldown = self.config.repath_cooldown;
            self.path.clear();
            self.path.goal = goal;
            match services.pathfinder.request_path(me.position, goal) {
                Some(waypoints) => self.path.waypoints = waypoints,
                None => {
                    tracing::debug!("Agent {} has no path to {:?}", self.entity, goal);
                    return;
                }
            }
        }

        while let Some(next) = self.path.remaining().first().copied() {
            if me.position.horizontal_distance(next) > self.config.arrive_tolerance {
                let direction = (next - me.position).flat().normalize_or_zero();
                out.push(Intent::Move {
                    entity: self.entity,
                    target_pos: next,
                    target_yaw: yaw_towards_deg(me.position, next),
                    direction,
                    speed: self.config.move_speed,
                });
                return;
            }
            self.path.cursor += 1;
        }
    }

    fn next_patrol_point(&mut self) -> Vec3 {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let radius = self.config.patrol_radius * self.rng.gen::<f32>().sqrt();
        Vec3::new(
            self.home.x + angle.sin() * radius,
            self.home.y,
            self.home.z + angle.cos() * radius,
        )
    }
}

/// Wraps a yaw into [0, 360).
fn normalize_yaw(yaw: f32) -> f32 {
    yaw.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AoiConfig;
    use crate::spatial::SpatialIndex;
    use crate::ai::services::{NearestThreat, Pathfinder, Perception};
    use oroboros_shared::EntityKind;
    use std::collections::BTreeMap;

    /// Goes straight to the goal in one hop.
    struct Direct;

    impl Pathfinder for Direct {
        fn request_path(&self, _from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
            Some(vec![to])
        }
    }

    struct Blind;

    impl Perception for Blind {
        fn visible_hostiles(&self, _observer: &Entity, _world: &AiWorld<'_>) -> Vec<EntityId> {
            Vec::new()
        }
    }

    fn services() -> AiServices {
        AiServices {
            pathfinder: Box::new(Direct),
            perception: Box::new(Blind),
            threat: Box::new(NearestThreat),
        }
    }

    fn config() -> AiConfig {
        AiConfig {
            leash_distance: 20.0,
            attack_range: 2.0,
            patrol_radius: 5.0,
            ..AiConfig::default()
        }
    }

    struct Scene {
        entities: BTreeMap<EntityId, Entity>,
        spatial: SpatialIndex,
    }

    const MONSTER: EntityId = EntityId(1);
    const PLAYER: EntityId = EntityId(2);

    impl Scene {
        fn new(monster_at: Vec3, player_at: Vec3) -> Self {
            let mut entities = BTreeMap::new();
            entities.insert(MONSTER, Entity::new(MONSTER, EntityKind::Monster, monster_at));
            entities.insert(PLAYER, Entity::new(PLAYER, EntityKind::Player, player_at));
            Self {
                entities,
                spatial: SpatialIndex::new(AoiConfig::default()),
            }
        }

        fn think(&self, agent: &mut AiAgent) -> IntentBatch {
            let mut out = IntentBatch::new();
            let me = self.entities[&agent.entity()].clone();
            agent.think(&me, &AiWorld::new(&self.entities, &self.spatial), &services(), 0.02, &mut out);
            out
        }
    }

    #[test]
    fn test_leash_breaks_chase() {
        let scene = Scene::new(Vec3::new(25.0, 0.0, 0.0), Vec3::new(30.0, 0.0, 0.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Chase;

        let out = scene.think(&mut agent);
        assert!(out.is_empty());
        assert_eq!(agent.target(), None);
        assert!(agent.is_returning_home());
        assert_eq!(agent.behavior(), Behavior::Idle);

        // Next tick heads home even with a fresh target.
        agent.set_target(Some(PLAYER));
        let out = scene.think(&mut agent);
        match out.as_slice() {
            [Intent::Move { target_pos, direction, .. }] => {
                assert_eq!(*target_pos, Vec3::ZERO);
                assert!((direction.x + 1.0).abs() < 1e-6);
            }
            other => panic!("expected a move home, got {other:?}"),
        }
        assert_eq!(agent.target(), Some(PLAYER));
        assert_eq!(agent.behavior(), Behavior::Idle);
    }

    #[test]
    fn test_target_assigned_on_way_home_is_chased_after_arrival() {
        let mut scene = Scene::new(Vec3::new(25.0, 0.0, 0.0), Vec3::new(30.0, 0.0, 0.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Chase;
        scene.think(&mut agent);
        assert!(agent.is_returning_home());

        agent.set_target(Some(PLAYER));
        scene.entities.get_mut(&MONSTER).unwrap().position = Vec3::new(0.2, 0.0, 0.0);

        // Arrival tick only clears the return.
        assert!(scene.think(&mut agent).is_empty());
        assert!(!agent.is_returning_home());
        assert_eq!(agent.behavior(), Behavior::Idle);

        scene.think(&mut agent);
        assert_eq!(agent.target(), Some(PLAYER));
        assert_eq!(agent.behavior(), Behavior::Chase);
    }

    #[test]
    fn test_arrival_home_resumes_patrol() {
        let mut scene = Scene::new(Vec3::new(25.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 100.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Chase;
        scene.think(&mut agent);
        agent.set_target(None);
        assert!(agent.is_returning_home());
        assert!(matches!(scene.think(&mut agent).as_slice(), [Intent::Move { .. }]));

        scene.entities.get_mut(&MONSTER).unwrap().position = Vec3::new(0.0, 0.0, 0.3);
        scene.think(&mut agent);
        assert!(!agent.is_returning_home());
        assert!(agent.path().is_exhausted());

        // Patrol picks up again once the repath cooldown allows a new path.
        let mut patrol_move = None;
        for _ in 0..40 {
            if let [Intent::Move { target_pos, .. }] = scene.think(&mut agent).as_slice() {
                patrol_move = Some(*target_pos);
                break;
            }
        }
        let target_pos = patrol_move.expect("agent never resumed patrol");
        assert_eq!(Some(target_pos), agent.patrol_point());
        assert!(target_pos.horizontal_distance(Vec3::ZERO) <= 5.0 + 1e-4);
        assert_eq!(agent.behavior(), Behavior::Idle);
    }

    #[test]
    fn test_reaching_patrol_point_picks_next_one() {
        let mut scene = Scene::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 100.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        scene.think(&mut agent);
        let first = agent.patrol_point().unwrap();

        scene.entities.get_mut(&MONSTER).unwrap().position = first;
        assert!(scene.think(&mut agent).is_empty());
        let second = agent.patrol_point().unwrap();
        assert_ne!(first, second);
        assert!(second.horizontal_distance(Vec3::ZERO) <= 5.0 + 1e-4);
        assert!(agent.path().is_exhausted());
    }

    #[test]
    fn test_idle_with_target_starts_chase_then_moves() {
        let scene = Scene::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));

        assert!(scene.think(&mut agent).is_empty());
        assert_eq!(agent.behavior(), Behavior::Chase);

        let out = scene.think(&mut agent);
        assert!(matches!(out.as_slice(), [Intent::Move { .. }]));
    }

    #[test]
    fn test_attack_hysteresis_band() {
        // Chase holds until within 0.9 * range = 1.8.
        let mut scene = Scene::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.9));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Chase;
        scene.think(&mut agent);
        assert_eq!(agent.behavior(), Behavior::Chase);

        scene.entities.get_mut(&PLAYER).unwrap().position = Vec3::new(0.0, 0.0, 1.7);
        scene.think(&mut agent);
        assert_eq!(agent.behavior(), Behavior::Attack);

        // Inside the band: stays in Attack.
        scene.entities.get_mut(&PLAYER).unwrap().position = Vec3::new(0.0, 0.0, 2.3);
        let out = scene.think(&mut agent);
        assert_eq!(agent.behavior(), Behavior::Attack);
        assert!(matches!(out.as_slice(), [Intent::Attack { target: PLAYER, .. }]));

        // Beyond 1.2 * range: back to Chase.
        scene.entities.get_mut(&PLAYER).unwrap().position = Vec3::new(0.0, 0.0, 2.5);
        scene.think(&mut agent);
        assert_eq!(agent.behavior(), Behavior::Chase);
    }

    #[test]
    fn test_attack_turns_before_striking() {
        let mut scene = Scene::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(4), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Attack;

        // Facing +Z, target at +X: 90 degrees off.
        let out = scene.think(&mut agent);
        match out.as_slice() {
            [Intent::Rotate { yaw, .. }] => assert!((*yaw - 7.2).abs() < 1e-3),
            other => panic!("expected a rotation, got {other:?}"),
        }

        scene.entities.get_mut(&MONSTER).unwrap().yaw = 80.0;
        let out = scene.think(&mut agent);
        assert!(matches!(
            out.as_slice(),
            [Intent::Attack { skill: SkillId(4), .. }]
        ));

        // Paced by the attack interval.
        assert!(scene.think(&mut agent).is_empty());
    }

    #[test]
    fn test_lost_target_returns_to_idle() {
        let mut scene = Scene::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let mut agent = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        agent.set_target(Some(PLAYER));
        agent.behavior = Behavior::Attack;
        scene.entities.get_mut(&PLAYER).unwrap().alive = false;

        scene.think(&mut agent);
        assert_eq!(agent.target(), None);
        assert_eq!(agent.behavior(), Behavior::Idle);
    }

    #[test]
    fn test_patrol_is_deterministic_and_bounded() {
        let scene = Scene::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 100.0));
        let mut a = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        let mut b = AiAgent::new(MONSTER, Vec3::ZERO, SkillId(1), config());
        let out_a = scene.think(&mut a);
        let out_b = scene.think(&mut b);
        assert_eq!(out_a, out_b);
        let point = a.patrol_point().unwrap();
        assert!(point.horizontal_distance(Vec3::ZERO) <= 5.0 + 1e-4);
    }
}
