//! # Realm Server
//!
//! Runs one demo region against the live tick scheduler.
//!
//! The scheduler owns a current-thread tokio runtime; the region owns a
//! dedicated OS thread and consumes tick events and timer callbacks through
//! channels. This binary also plays the movement and combat resolvers, so
//! the AI's intents have visible consequences.
//!
//! ## Usage
//!
//! ```bash
//! realm_server --config realm.toml --ticks 3000
//! RUST_LOG=oroboros_simulation=debug realm_server
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver};
use oroboros_shared::{EntityId, EntityKind, OwnerId, SkillId, Vec3};
use oroboros_simulation::nav::GridCoord;
use oroboros_simulation::{
    AgentSpec, Delay, Intent, NavVolume, Region, RegionMessage, RegionReply, RegionTimer, SchedulerHandle,
    SimConfig, SimResult, SpawnRequest, TickEvent, TickScheduler, TimerFired, VoxelGrid,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Owner id the demo region receives its timers under.
const REGION_OWNER: OwnerId = OwnerId(1);
/// Hits a player takes before dying.
const HITS_TO_KILL: u32 = 5;
/// Time a dead player stays down.
const REVIVE_DELAY_MS: u64 = 3_000;
/// Player walking speed.
const PLAYER_SPEED: f32 = 2.0;

struct Args {
    config: Option<PathBuf>,
    ticks: Option<u64>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        ticks: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--ticks" | "-t" => {
                if i + 1 < args.len() {
                    parsed.ticks = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: realm_server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    TOML config (default: built-in defaults)");
                println!("  -t, --ticks <N>        Stop after N ticks (default: run until Ctrl-C)");
                println!("  -h, --help             Show this help");
                return None;
            }
            other => eprintln!("Ignoring unknown argument '{other}'"),
        }
        i += 1;
    }
    Some(parsed)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(args) = parse_args() else {
        return;
    };

    let config = match &args.config {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("Cannot start: {}", err);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    let nav = match &config.nav.volume_path {
        Some(path) => NavVolume::load(path),
        None => NavVolume::from_grid(demo_floor()),
    };
    if let Some(reason) = nav.unavailable_reason() {
        tracing::warn!("Running without navigation: {}", reason);
    }

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         OROBOROS REALM SERVER                                    ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("  Tick interval:   {} ms", config.tick.interval_ms);
    println!("  Wheel slots:     {}", config.tick.wheel_size);
    println!("  View range:      {}", config.aoi.view_range);
    match args.ticks {
        Some(ticks) => println!("  Duration:        {ticks} ticks"),
        None => println!("  Duration:        until Ctrl-C"),
    }
    println!();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Cannot build runtime: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(Arc::new(config), Arc::new(nav), args.ticks)) {
        tracing::error!("Realm server failed: {}", err);
        std::process::exit(1);
    }
}

async fn run(config: Arc<SimConfig>, nav: Arc<NavVolume>, max_ticks: Option<u64>) -> SimResult<()> {
    let scheduler = TickScheduler::<RegionTimer>::new(config.tick.clone());
    let (handle, inbox) = SchedulerHandle::channel(scheduler.bus());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (timer_tx, timer_rx) = bounded(config.tick.bus_capacity);
    handle.register_mailbox(REGION_OWNER, timer_tx)?;
    let ticks = handle.subscribe();
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let mut region = Region::with_nav("demo", Arc::clone(&config), Arc::clone(&nav));
    populate(&mut region)?;

    let region_handle = handle.clone();
    let region_thread = thread::Builder::new()
        .name("region-demo".into())
        .spawn(move || {
            let mut driver = RegionDriver {
                region,
                nav,
                scheduler: region_handle,
                hits: HashMap::new(),
                max_ticks,
            };
            driver.run(&ticks, &timer_rx, &stop_rx);
        })?;

    let scheduler_task = tokio::spawn(scheduler.run(inbox, shutdown_rx));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::warn!("Ctrl-C handler failed: {}", err);
            }
            tracing::info!("Ctrl-C received, shutting down");
            // The scheduler may already be gone.
            let _ = shutdown_tx.send(true);
        }
        () = wait_for_region(&region_thread) => {}
    }

    let stats = match scheduler_task.await {
        Ok(stats) => Some(stats),
        Err(err) => {
            tracing::error!("Scheduler task failed: {}", err);
            None
        }
    };
    let _ = stop_tx.try_send(());
    if region_thread.join().is_err() {
        tracing::error!("Region thread panicked");
    }

    if let Some(stats) = stats {
        println!();
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                    REALM SHUTDOWN                                ║");
        println!("╠══════════════════════════════════════════════════════════════════╣");
        println!("║ Total Ticks:        {:>10}                                   ║", stats.total_ticks);
        println!("║ Avg Tick Time:      {:>10} us                                ║", stats.avg_tick_us);
        println!("║ Max Tick Time:      {:>10} us                                ║", stats.max_tick_us);
        println!("║ Late Ticks:         {:>10}                                   ║", stats.late_ticks);
        println!("║ Caught Up:          {:>10}                                   ║", stats.catch_up_ticks);
        println!("╚══════════════════════════════════════════════════════════════════╝");
    }
    Ok(())
}

/// Resolves once the region thread has returned.
async fn wait_for_region(thread: &thread::JoinHandle<()>) {
    let mut poll = tokio::time::interval(std::time::Duration::from_millis(100));
    while !thread.is_finished() {
        poll.tick().await;
    }
}

/// 64 x 64 flat floor at y = 0, centred on the origin.
fn demo_floor() -> VoxelGrid {
    let mut grid = VoxelGrid::new([64, 4, 64], Vec3::new(-32.0, -1.0, -32.0), 1.0);
    for x in 0..64 {
        for z in 0..64 {
            grid.set_walkable(GridCoord::new(x, 1, z), true);
        }
    }
    grid
}

fn populate(region: &mut Region) -> SimResult<()> {
    let monsters = [
        (EntityId(1), Vec3::new(-10.0, 0.5, -10.0)),
        (EntityId(2), Vec3::new(10.0, 0.5, -10.0)),
        (EntityId(3), Vec3::new(0.0, 0.5, 12.0)),
    ];
    for (id, position) in monsters {
        region.spawn(SpawnRequest {
            id,
            kind: EntityKind::Monster,
            position,
            yaw: 0.0,
            agent: Some(AgentSpec {
                skill: SkillId(1),
                home: None,
            }),
        })?;
    }
    for (id, position) in [(EntityId(100), Vec3::new(-25.0, 0.5, 0.0)), (EntityId(101), Vec3::new(25.0, 0.5, 0.0))] {
        region.spawn(SpawnRequest {
            id,
            kind: EntityKind::Player,
            position,
            yaw: 90.0,
            agent: None,
        })?;
    }
    tracing::info!("Region {} populated with {} entities", region.name(), region.len());
    Ok(())
}

/// The region thread: applies timers, ticks the region, then resolves the
/// gated intents.
struct RegionDriver {
    region: Region,
    nav: Arc<NavVolume>,
    scheduler: SchedulerHandle<RegionTimer>,
    hits: HashMap<EntityId, u32>,
    max_ticks: Option<u64>,
}

impl RegionDriver {
    fn run(&mut self, ticks: &Receiver<TickEvent>, timers: &Receiver<TimerFired<RegionTimer>>, stop: &Receiver<()>) {
        loop {
            select! {
                recv(ticks) -> event => {
                    let Ok(event) = event else { break };
                    for fired in timers.try_iter() {
                        if let Err(err) = self.region.handle(RegionMessage::TimerFired(fired)) {
                            tracing::warn!("Timer callback failed: {}", err);
                        }
                    }
                    self.tick(&event);
                    if self.max_ticks.is_some_and(|max| event.tick >= max) {
                        tracing::info!("Tick limit {} reached", event.tick);
                        // Already stopping if this fails.
                        let _ = self.scheduler.shutdown();
                        break;
                    }
                }
                recv(stop) -> _ => break,
            }
        }
    }

    fn tick(&mut self, event: &TickEvent) {
        let dt = event.delta_time_seconds;
        let report = self.region.on_tick(event);
        for (id, delta) in &report.visibility {
            tracing::debug!("{} sees +{:?} -{:?}", id, delta.enter, delta.leave);
        }

        for intent in &report.intents {
            match *intent {
                Intent::Move {
                    entity,
                    target_yaw,
                    direction,
                    speed,
                    ..
                } => {
                    let Some(current) = self.region.entity(entity) else {
                        continue;
                    };
                    let next = self.nav.snap_height(current.position + direction * (speed * dt));
                    if let Err(err) = self.region.apply_movement(entity, next, target_yaw, direction) {
                        tracing::warn!("Movement for {} failed: {}", entity, err);
                    }
                }
                Intent::Rotate { .. } => {}
                Intent::Attack { entity, target, .. } => self.resolve_attack(entity, target),
            }
        }

        self.walk_players(event.tick, dt);
    }

    fn resolve_attack(&mut self, attacker: EntityId, target: EntityId) {
        let count = self.hits.entry(target).or_default();
        *count += 1;
        let message = if *count >= HITS_TO_KILL {
            *count = 0;
            RegionMessage::ApplyDeath(target)
        } else {
            RegionMessage::ApplyHit(target)
        };
        let dies = matches!(message, RegionMessage::ApplyDeath(_));
        match self.region.handle(message) {
            Ok(RegionReply::Done) if dies => {
                tracing::info!("{} killed {}", attacker, target);
                let armed = self.scheduler.register_timer(
                    format!("revive-{target}"),
                    REGION_OWNER,
                    RegionTimer::Revive(target),
                    Delay::Millis(REVIVE_DELAY_MS),
                    Delay::Ticks(0),
                    false,
                );
                if let Err(err) = armed {
                    tracing::warn!("Cannot arm revive for {}: {}", target, err);
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Attack on {} failed: {}", target, err),
        }
    }

    /// Players walk back and forth across the map so monsters notice them.
    fn walk_players(&mut self, tick: u64, dt: f32) {
        let direction = if (tick / 500) % 2 == 0 { Vec3::X } else { Vec3::new(-1.0, 0.0, 0.0) };
        for id in [EntityId(100), EntityId(101)] {
            let Some(player) = self.region.entity(id) else {
                continue;
            };
            if !player.alive {
                continue;
            }
            let next = self.nav.snap_height(player.position + direction * (PLAYER_SPEED * dt));
            let yaw = if direction.x > 0.0 { 90.0 } else { 270.0 };
            if let Err(err) = self.region.apply_movement(id, next, yaw, direction) {
                tracing::warn!("Player {} walk failed: {}", id, err);
            }
        }
    }
}
