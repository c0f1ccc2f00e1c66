//! # Hierarchical Timer Wheel
//!
//! Fixed-size circular array of buckets indexed by `due_tick % size`.
//! Tasks due more than one revolution ahead carry a rounds counter that is
//! decremented each time their slot is visited.
//!
//! ## Invariants
//!
//! - A task lives in exactly one slot at a time.
//! - Tasks in the same slot fire in registration order.
//! - A task registered with delay `d` at cursor `c` fires at tick `c + d`,
//!   never earlier.
//! - Repeating tasks rescheduled during a step are buffered and merged after
//!   the slot scan, so the bucket being scanned is never touched mid-scan.
//! - The cursor only moves forward, one slot at a time.

use oroboros_shared::OwnerId;

/// A pending deferred or periodic callback.
#[derive(Clone, Debug)]
pub struct TimerTask<M> {
    /// Caller-chosen key, used for cancellation.
    pub key: String,
    /// Mailbox that receives the callback.
    pub owner: OwnerId,
    /// Payload handed back when the timer fires.
    pub message: M,
    /// Re-arm after firing.
    pub repeat: bool,
    /// Period in ticks for repeating timers.
    pub period: u64,
    /// Full wheel revolutions left before the task is due.
    pub rounds: u64,
}

/// Callback delivered to a timer's owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerFired<M> {
    /// Key the timer was registered with.
    pub key: String,
    /// Payload the timer was registered with.
    pub message: M,
    /// Tick on which it fired.
    pub tick: u64,
}

/// Fixed-size timer wheel.
pub struct TimerWheel<M> {
    slots: Vec<Vec<TimerTask<M>>>,
    /// Last stepped tick.
    cursor: u64,
    /// Repeating tasks re-armed during the current step.
    rearmed: Vec<TimerTask<M>>,
    len: usize,
}

impl<M: Clone> TimerWheel<M> {
    /// Creates an empty wheel with `size` slots, cursor at tick 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: (0..size).map(|_| Vec::new()).collect(),
            cursor: 0,
            rearmed: Vec::new(),
            len: 0,
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Last stepped tick.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Number of armed tasks.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no task is armed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if a task with `key` is armed.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slots.iter().flatten().any(|task| task.key == key)
    }

    /// Arms a timer `delay` ticks after the cursor.
    ///
    /// A delay of zero is treated as one: the cursor's own slot has already
    /// been visited this tick.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        owner: OwnerId,
        message: M,
        delay: u64,
        period: u64,
        repeat: bool,
    ) {
        let task = TimerTask {
            key: key.into(),
            owner,
            message,
            repeat,
            period: period.max(1),
            rounds: 0,
        };
        self.insert(task, delay);
    }

    /// Disarms every task registered under `key`.
    ///
    /// Returns how many were removed. An unknown key is not an error.
    pub fn cancel(&mut self, key: &str) -> usize {
        let mut removed = 0;
        for bucket in &mut self.slots {
            let before = bucket.len();
            bucket.retain(|task| task.key != key);
            removed += before - bucket.len();
        }
        self.len -= removed;
        removed
    }

    /// Steps to the next tick. See [`TimerWheel::step`].
    pub fn advance(&mut self, dispatch: impl FnMut(OwnerId, TimerFired<M>)) -> usize {
        self.step(self.cursor + 1, dispatch)
    }

    /// Steps the cursor to `tick`, firing every task due on the way.
    ///
    /// Normally called once per tick with consecutive tick numbers. A jump
    /// ahead visits each skipped slot in order; a tick at or behind the
    /// cursor fires nothing.
    ///
    /// Returns the number of tasks fired.
    pub fn step(&mut self, tick: u64, mut dispatch: impl FnMut(OwnerId, TimerFired<M>)) -> usize {
        if tick <= self.cursor {
            tracing::warn!("Timer wheel asked to revisit tick {} (cursor {})", tick, self.cursor);
            return 0;
        }
        if tick != self.cursor + 1 {
            tracing::warn!(
                "Timer wheel stepped out of order: cursor {} -> tick {}, walking the gap",
                self.cursor,
                tick
            );
        }
        let mut fired = 0;
        while self.cursor < tick {
            fired += self.visit(self.cursor + 1, &mut dispatch);
        }
        fired
    }

    /// Visits the slot for `tick` and fires every task due on it.
    fn visit(&mut self, tick: u64, dispatch: &mut impl FnMut(OwnerId, TimerFired<M>)) -> usize {
        self.cursor = tick;

        let index = self.slot_index(tick);
        let bucket = std::mem::take(&mut self.slots[index]);
        let mut retained = Vec::with_capacity(bucket.len());
        let mut fired = 0;

        for mut task in bucket {
            if task.rounds > 0 {
                task.rounds -= 1;
                retained.push(task);
                continue;
            }

            fired += 1;
            self.len -= 1;
            if task.repeat {
                let event = TimerFired {
                    key: task.key.clone(),
                    message: task.message.clone(),
                    tick,
                };
                dispatch(task.owner, event);
                self.rearmed.push(task);
            } else {
                dispatch(
                    task.owner,
                    TimerFired {
                        key: task.key,
                        message: task.message,
                        tick,
                    },
                );
            }
        }

        self.slots[index] = retained;

        // Merge re-armed repeating tasks only after the scan.
        let rearmed = std::mem::take(&mut self.rearmed);
        for task in rearmed {
            let period = task.period;
            self.insert(task, period);
        }

        fired
    }

    fn insert(&mut self, mut task: TimerTask<M>, delay: u64) {
        let delay = delay.max(1);
        let size = self.slots.len() as u64;
        let due = self.cursor + delay;
        // Visits of the due slot strictly before `due`.
        task.rounds = (delay - 1) / size;
        let index = self.slot_index(due);
        self.slots[index].push(task);
        self.len += 1;
    }

    #[inline]
    fn slot_index(&self, tick: u64) -> usize {
        (tick % self.slots.len() as u64) as usize
    }
}
