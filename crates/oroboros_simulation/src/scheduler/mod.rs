//! # Tick Scheduler
//!
//! The realm's heartbeat: a fixed-interval clock, a hierarchical timer wheel
//! for deferred and periodic callbacks, a heartbeat echo for clock sync, and
//! the tick event bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       TICK SCHEDULER                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  inbox (mpsc)            clock                 tick bus       │
//! │  RegisterTimer ─┐   sleep_until(next) ──► Step(tick) ──► subs  │
//! │  CancelTimer   ─┼──►     │                     │               │
//! │  Heartbeat     ─┘        └─ drain every        └─► TimerFired  │
//! │                             elapsed tick           to owners   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler is owned by a single task. Other owners talk to it only
//! through [`SchedulerHandle`], and it talks back only through mailboxes.

mod bus;
mod clock;
mod wheel;

pub use bus::{TickBus, TickEvent};
pub use clock::{TickClock, TickStats};
pub use wheel::{TimerFired, TimerTask, TimerWheel};

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use oroboros_shared::{OwnerId, SessionId};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::TickConfig;
use crate::error::{SimError, SimResult};

/// Delay or period for a timer, in ticks or milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    /// Whole ticks.
    Ticks(u64),
    /// Milliseconds, rounded up to whole ticks.
    Millis(u64),
}

/// Reply to a heartbeat, used by clients for RTT and clock sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatReply {
    /// Server wall clock (Unix epoch ms).
    pub server_utc_ms: i64,
    /// Last completed tick.
    pub current_tick: u64,
    /// Client timestamp, echoed unchanged.
    pub echoed_client_utc_ms: i64,
}

/// Messages accepted by the scheduler's inbox.
#[derive(Debug)]
pub enum SchedulerMessage<M> {
    /// Arms a timer.
    RegisterTimer {
        /// Key used for cancellation.
        key: String,
        /// Mailbox that receives the callback.
        owner: OwnerId,
        /// Payload handed back on fire.
        message: M,
        /// Time until first fire.
        delay: Delay,
        /// Re-arm period for repeating timers.
        period: Delay,
        /// Re-arm after firing.
        repeat: bool,
    },
    /// Disarms every timer with this key.
    CancelTimer {
        /// Key to cancel.
        key: String,
    },
    /// Registers the mailbox that receives an owner's callbacks.
    RegisterMailbox {
        /// Owner id timers will be registered under.
        owner: OwnerId,
        /// Delivery channel.
        mailbox: Sender<TimerFired<M>>,
    },
    /// Clock-sync request.
    Heartbeat {
        /// Client wall clock (Unix epoch ms).
        client_utc_ms: i64,
        /// Session that sent the request.
        session_id: SessionId,
        /// Where to send the reply.
        reply: oneshot::Sender<HeartbeatReply>,
    },
    /// Stops the run loop after the current tick.
    Shutdown,
}

/// Current wall clock in Unix epoch milliseconds.
#[must_use]
pub fn utc_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// The fixed-interval scheduler.
pub struct TickScheduler<M> {
    config: TickConfig,
    clock: TickClock,
    wheel: TimerWheel<M>,
    mailboxes: HashMap<OwnerId, Sender<TimerFired<M>>>,
    bus: TickBus,
}

impl<M: Clone + Send + 'static> TickScheduler<M> {
    /// Creates a scheduler whose clock starts now.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        let clock = TickClock::starting_now(config.interval());
        Self {
            wheel: TimerWheel::new(config.wheel_size),
            bus: TickBus::new(config.bus_capacity),
            clock,
            mailboxes: HashMap::new(),
            config,
        }
    }

    /// Last completed tick.
    #[inline]
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Tick configuration.
    #[must_use]
    pub const fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Tick timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        self.clock.stats()
    }

    /// Number of armed timers.
    #[must_use]
    pub const fn pending_timers(&self) -> usize {
        self.wheel.len()
    }

    /// Handle to the tick event bus.
    #[must_use]
    pub fn bus(&self) -> TickBus {
        self.bus.clone()
    }

    /// Subscribes to tick events.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<TickEvent> {
        self.bus.subscribe()
    }

    /// Registers the mailbox for `owner`'s timer callbacks.
    pub fn register_mailbox(&mut self, owner: OwnerId, mailbox: Sender<TimerFired<M>>) {
        self.mailboxes.insert(owner, mailbox);
    }

    /// Converts a [`Delay`] to ticks.
    #[must_use]
    pub fn to_ticks(&self, delay: Delay) -> u64 {
        match delay {
            Delay::Ticks(ticks) => ticks,
            Delay::Millis(ms) => self.config.ms_to_ticks(ms),
        }
    }

    /// Arms a timer relative to the current tick.
    pub fn register_timer(
        &mut self,
        key: impl Into<String>,
        owner: OwnerId,
        message: M,
        delay: Delay,
        period: Delay,
        repeat: bool,
    ) {
        let delay = self.to_ticks(delay);
        let period = self.to_ticks(period);
        let key = key.into();
        tracing::debug!(
            "Timer '{}' armed for owner {} at tick {} (+{} ticks, repeat: {})",
            key,
            owner.0,
            self.clock.tick(),
            delay,
            repeat
        );
        self.wheel.register(key, owner, message, delay, period, repeat);
    }

    /// Disarms every timer with `key`. Unknown keys are ignored.
    pub fn cancel_timer(&mut self, key: &str) {
        let removed = self.wheel.cancel(key);
        if removed > 0 {
            tracing::debug!("Timer '{}' cancelled ({} task(s))", key, removed);
        }
    }

    /// Answers a clock-sync request. Does not mutate anything.
    #[must_use]
    pub fn heartbeat(&self, client_utc_ms: i64, session_id: SessionId) -> HeartbeatReply {
        tracing::trace!("Heartbeat from session {} at tick {}", session_id.0, self.clock.tick());
        HeartbeatReply {
            server_utc_ms: utc_now_ms(),
            current_tick: self.clock.tick(),
            echoed_client_utc_ms: client_utc_ms,
        }
    }

    /// Runs one tick: fires due timers, then publishes the tick event.
    pub fn step(&mut self) -> TickEvent {
        let started = Instant::now();
        let tick = self.clock.advance();

        let mailboxes = &self.mailboxes;
        let mut closed = Vec::new();
        self.wheel.step(tick, |owner, fired| {
            if let Err(err) = deliver(mailboxes, owner, fired) {
                tracing::warn!("Timer for owner {} dropped at tick {}: {}", owner.0, tick, err);
                if matches!(err, SimError::MailboxClosed) {
                    closed.push(owner);
                }
            }
        });
        for owner in closed {
            self.mailboxes.remove(&owner);
        }

        let event = TickEvent {
            tick,
            utc_ms: utc_now_ms(),
            delta_time_seconds: self.clock.interval().as_secs_f32(),
        };
        self.bus.publish(event);

        self.clock.record(started.elapsed());
        event
    }

    /// Runs every tick that has come due by `now`.
    ///
    /// Returns the number of ticks executed.
    pub fn catch_up(&mut self, now: Instant) -> u64 {
        let due = self.clock.due_ticks(now);
        for _ in 0..due {
            self.step();
        }
        if due > 1 {
            self.clock.record_catch_up(due - 1);
            tracing::debug!("Caught up {} ticks after a stall", due - 1);
        }
        due
    }

    /// Applies one inbox message.
    ///
    /// Returns `false` once a shutdown was requested.
    pub fn handle(&mut self, message: SchedulerMessage<M>) -> bool {
        match message {
            SchedulerMessage::RegisterTimer {
                key,
                owner,
                message,
                delay,
                period,
                repeat,
            } => self.register_timer(key, owner, message, delay, period, repeat),
            SchedulerMessage::CancelTimer { key } => self.cancel_timer(&key),
            SchedulerMessage::RegisterMailbox { owner, mailbox } => {
                self.register_mailbox(owner, mailbox);
            }
            SchedulerMessage::Heartbeat {
                client_utc_ms,
                session_id,
                reply,
            } => {
                // The caller may have given up; nothing to do then.
                let _ = reply.send(self.heartbeat(client_utc_ms, session_id));
            }
            SchedulerMessage::Shutdown => return false,
        }
        true
    }

    /// Drives the scheduler until shutdown.
    ///
    /// The sleep here is the only suspension point of the realm core.
    /// Inbox messages are applied between ticks, and messages queued together
    /// are applied together without a tick in between; the loop ends on
    /// [`SchedulerMessage::Shutdown`] or when `shutdown` flips to `true`
    /// (or its sender is dropped).
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<SchedulerMessage<M>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TickStats {
        tracing::info!(
            "Tick scheduler running at {} ms/tick, wheel of {} slots",
            self.config.interval_ms,
            self.wheel.size()
        );
        let mut inbox_open = true;

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.catch_up(Instant::now());

            if self.config.stats_interval_ticks > 0
                && self.clock.tick() > 0
                && self.clock.tick() % self.config.stats_interval_ticks == 0
            {
                let stats = self.clock.stats();
                tracing::info!(
                    "Tick {}: avg {} us, max {} us, late {}, caught up {}",
                    self.clock.tick(),
                    stats.avg_tick_us,
                    stats.max_tick_us,
                    stats.late_ticks,
                    stats.catch_up_ticks
                );
            }

            let deadline = tokio::time::Instant::from_std(self.clock.next_due());
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {}
                message = inbox.recv(), if inbox_open => match message {
                    Some(message) => {
                        // Everything already queued lands between the same two ticks.
                        let mut running = self.handle(message);
                        while running {
                            match inbox.try_recv() {
                                Ok(next) => running = self.handle(next),
                                Err(_) => break,
                            }
                        }
                        if !running {
                            break;
                        }
                    }
                    None => inbox_open = false,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Tick scheduler stopped at tick {}", self.clock.tick());
        *self.clock.stats()
    }
}

fn deliver<M>(
    mailboxes: &HashMap<OwnerId, Sender<TimerFired<M>>>,
    owner: OwnerId,
    fired: TimerFired<M>,
) -> SimResult<()> {
    let Some(mailbox) = mailboxes.get(&owner) else {
        return Err(SimError::MailboxMissing(owner.0));
    };
    match mailbox.try_send(fired) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => Err(SimError::MailboxFull(owner.0)),
        Err(TrySendError::Disconnected(_)) => Err(SimError::MailboxClosed),
    }
}

/// Cloneable handle used by other owners to reach the scheduler.
pub struct SchedulerHandle<M> {
    inbox: mpsc::UnboundedSender<SchedulerMessage<M>>,
    bus: TickBus,
}

impl<M> Clone for SchedulerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<M: Send + 'static> SchedulerHandle<M> {
    /// Creates a handle and the inbox the scheduler task should drain.
    #[must_use]
    pub fn channel(bus: TickBus) -> (Self, mpsc::UnboundedReceiver<SchedulerMessage<M>>) {
        let (inbox, receiver) = mpsc::unbounded_channel();
        (Self { inbox, bus }, receiver)
    }

    /// Subscribes to tick events.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<TickEvent> {
        self.bus.subscribe()
    }

    /// Sends a raw message.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has stopped.
    pub fn send(&self, message: SchedulerMessage<M>) -> SimResult<()> {
        self.inbox.send(message).map_err(|_| SimError::MailboxClosed)
    }

    /// Arms a timer.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has stopped.
    pub fn register_timer(
        &self,
        key: impl Into<String>,
        owner: OwnerId,
        message: M,
        delay: Delay,
        period: Delay,
        repeat: bool,
    ) -> SimResult<()> {
        self.send(SchedulerMessage::RegisterTimer {
            key: key.into(),
            owner,
            message,
            delay,
            period,
            repeat,
        })
    }

    /// Disarms every timer with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has stopped.
    pub fn cancel_timer(&self, key: impl Into<String>) -> SimResult<()> {
        self.send(SchedulerMessage::CancelTimer { key: key.into() })
    }

    /// Registers the mailbox for `owner`'s timer callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has stopped.
    pub fn register_mailbox(&self, owner: OwnerId, mailbox: Sender<TimerFired<M>>) -> SimResult<()> {
        self.send(SchedulerMessage::RegisterMailbox { owner, mailbox })
    }

    /// Sends a clock-sync request and waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has stopped.
    pub async fn heartbeat(&self, client_utc_ms: i64, session_id: SessionId) -> SimResult<HeartbeatReply> {
        let (reply, response) = oneshot::channel();
        self.send(SchedulerMessage::Heartbeat {
            client_utc_ms,
            session_id,
            reply,
        })?;
        response.await.map_err(|_| SimError::MailboxClosed)
    }

    /// Asks the scheduler to stop.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MailboxClosed`] if the scheduler has already stopped.
    pub fn shutdown(&self) -> SimResult<()> {
        self.send(SchedulerMessage::Shutdown)
    }
}
