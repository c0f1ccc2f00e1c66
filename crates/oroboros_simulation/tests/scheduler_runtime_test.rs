//! # Scheduler Runtime Tests
//!
//! Runs the real scheduler loop on a tokio runtime and talks to it only
//! through its handle, the tick bus and a timer mailbox.
//!
//! Run with: cargo test --package oroboros_simulation --test scheduler_runtime_test

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use oroboros_shared::{OwnerId, SessionId};
use oroboros_simulation::config::TickConfig;
use oroboros_simulation::{Delay, SchedulerHandle, TickScheduler, TimerFired};
use tokio::sync::watch;

const OWNER: OwnerId = OwnerId(7);

/// Polls `rx` until a value arrives or `limit` elapses.
async fn recv_within<T>(rx: &Receiver<T>, limit: Duration) -> Option<T> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if let Ok(value) = rx.try_recv() {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn start() -> (
    SchedulerHandle<&'static str>,
    watch::Sender<bool>,
    tokio::task::JoinHandle<oroboros_simulation::scheduler::TickStats>,
) {
    let scheduler = TickScheduler::<&'static str>::new(TickConfig {
        interval_ms: 10,
        stats_interval_ticks: 0,
        ..TickConfig::default()
    });
    let (handle, inbox) = SchedulerHandle::channel(scheduler.bus());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler.run(inbox, shutdown_rx));
    (handle, shutdown_tx, task)
}

#[tokio::test]
async fn test_timer_fires_once_and_never_early() {
    let (handle, _shutdown, task) = start();
    let (tx, rx) = unbounded::<TimerFired<&'static str>>();
    handle.register_mailbox(OWNER, tx).unwrap();

    // Queued back to back, so the heartbeat reports the registration tick.
    handle
        .register_timer("loot-expire", OWNER, "expire", Delay::Ticks(4), Delay::Ticks(0), false)
        .unwrap();
    let registered_at = handle.heartbeat(0, SessionId(1)).await.unwrap().current_tick;

    let fired = recv_within(&rx, Duration::from_secs(2)).await.expect("timer never fired");
    assert_eq!(fired.key, "loot-expire");
    assert_eq!(fired.message, "expire");
    assert_eq!(fired.tick, registered_at + 4);

    // Non-repeating: nothing else arrives.
    assert!(recv_within(&rx, Duration::from_millis(100)).await.is_none());

    handle.shutdown().unwrap();
    let stats = task.await.unwrap();
    assert!(stats.total_ticks >= 4);
}

#[tokio::test]
async fn test_cancelled_timer_never_fires() {
    let (handle, _shutdown, task) = start();
    let (tx, rx) = unbounded::<TimerFired<&'static str>>();
    handle.register_mailbox(OWNER, tx).unwrap();

    handle
        .register_timer("respawn", OWNER, "spawn", Delay::Millis(200), Delay::Ticks(0), false)
        .unwrap();
    handle.cancel_timer("respawn").unwrap();
    handle.cancel_timer("no-such-key").unwrap();

    assert!(recv_within(&rx, Duration::from_millis(400)).await.is_none());

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_ticks_are_consecutive_and_repeat_timers_rearm() {
    let (handle, shutdown, task) = start();
    let ticks = handle.subscribe();
    let (tx, rx) = unbounded::<TimerFired<&'static str>>();
    handle.register_mailbox(OWNER, tx).unwrap();
    handle
        .register_timer("regen", OWNER, "tick", Delay::Ticks(2), Delay::Ticks(2), true)
        .unwrap();

    let mut fired = Vec::new();
    while fired.len() < 3 {
        let next = recv_within(&rx, Duration::from_secs(2)).await.expect("repeat stopped");
        fired.push(next.tick);
    }
    assert_eq!(fired[1] - fired[0], 2);
    assert_eq!(fired[2] - fired[1], 2);

    shutdown.send(true).unwrap();
    task.await.unwrap();

    let seen: Vec<u64> = ticks.try_iter().map(|e| e.tick).collect();
    assert!(seen.len() >= 6);
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 1), "ticks skipped: {seen:?}");
}

#[tokio::test]
async fn test_heartbeat_echo() {
    let (handle, _shutdown, task) = start();
    let reply = handle.heartbeat(1_234, SessionId(3)).await.unwrap();
    assert_eq!(reply.echoed_client_utc_ms, 1_234);
    assert!(reply.server_utc_ms > 0);

    handle.shutdown().unwrap();
    task.await.unwrap();
    assert!(handle.heartbeat(1, SessionId(3)).await.is_err());
}
