//! Generic named-state machine.

use std::fmt::Debug;
use std::hash::Hash;

use bitflags::bitflags;

bitflags! {
    /// What the active state forbids or takes over.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Movement intents are dropped.
        const LOCK_MOVE = 0b0000_0001;
        /// Rotation intents are dropped.
        const LOCK_TURN = 0b0000_0010;
        /// The Motion layer is not updated while this state is active.
        const OVERLAY_MOTION = 0b0000_0100;
    }
}

/// Buffered change request handed to [`State::update`].
///
/// Single slot: the last request made during one update wins.
pub struct StateRequest<'a, K> {
    slot: &'a mut Option<K>,
}

impl<K> StateRequest<'_, K> {
    /// Asks the machine to switch to `to` once the current update returns.
    pub fn request(&mut self, to: K) {
        *self.slot = Some(to);
    }

    /// Returns true if a request is buffered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }
}

/// One registered state.
///
/// `K` is the state tag, `C` the context every hook receives.
pub trait State<K, C>: Send {
    /// Tag this state is registered under.
    fn tag(&self) -> K;

    /// Higher-priority states cannot be left for lower ones by a plain
    /// request.
    fn priority(&self) -> i32 {
        0
    }

    /// Flags read by the layered coordinator.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Whether this state accepts being entered from `from`.
    fn can_enter(&self, _from: K, _ctx: &C) -> bool {
        true
    }

    /// Whether this state lets go to `to`.
    fn can_exit(&self, _to: K, _ctx: &C) -> bool {
        true
    }

    /// Called after the swap, with the previous tag.
    fn enter(&mut self, _from: K, _ctx: &mut C) {}

    /// Called before the swap, with the next tag.
    fn exit(&mut self, _to: K, _ctx: &mut C) {}

    /// Per-tick work. Changes requested here are applied right after return.
    fn update(&mut self, _ctx: &mut C, _dt: f32, _requests: &mut StateRequest<'_, K>) {}
}

/// A completed state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition<K> {
    /// State left.
    pub from: K,
    /// State entered.
    pub to: K,
    /// True if guards were bypassed.
    pub forced: bool,
}

/// Which guards a change has to pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Guard {
    /// Registration, difference, exit, enter and priority.
    Full,
    /// The current state releasing itself: priority is not checked.
    SelfRelease,
    /// Only registration.
    Forced,
}

/// Fixed registry of states with exactly one active.
pub struct StateMachine<K, C> {
    name: &'static str,
    states: Vec<Box<dyn State<K, C>>>,
    current: usize,
    pending: Option<K>,
    transitions: Vec<Transition<K>>,
    /// Set once the initial state's `enter` has run.
    started: bool,
}

impl<K, C> StateMachine<K, C>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Creates a machine whose initial active state is `initial`.
    ///
    /// No context exists yet, so the initial state's `enter` hook is deferred
    /// to [`StateMachine::start`], which runs on its own before the first
    /// update or change if nobody calls it earlier.
    #[must_use]
    pub fn new(name: &'static str, initial: Box<dyn State<K, C>>) -> Self {
        Self {
            name,
            states: vec![initial],
            current: 0,
            pending: None,
            transitions: Vec::new(),
            started: false,
        }
    }

    /// Runs the initial state's `enter` hook, with its own tag as `from`.
    ///
    /// Idempotent. Not recorded as a transition.
    pub fn start(&mut self, ctx: &mut C) {
        if self.started {
            return;
        }
        self.started = true;
        let tag = self.current();
        self.states[self.current].enter(tag, ctx);
    }

    /// Registers another state. A duplicate tag is ignored.
    #[must_use]
    pub fn with_state(mut self, state: Box<dyn State<K, C>>) -> Self {
        let tag = state.tag();
        if self.index_of(tag).is_some() {
            tracing::warn!("{} machine: state {:?} registered twice, ignoring", self.name, tag);
        } else {
            self.states.push(state);
        }
        self
    }

    /// Layer name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn index_of(&self, tag: K) -> Option<usize> {
        self.states.iter().position(|s| s.tag() == tag)
    }

    fn active(&self) -> &dyn State<K, C> {
        self.states[self.current].as_ref()
    }

    /// Tag of the active state.
    #[must_use]
    pub fn current(&self) -> K {
        self.active().tag()
    }

    /// Priority of the active state.
    #[must_use]
    pub fn current_priority(&self) -> i32 {
        self.active().priority()
    }

    /// Capability flags of the active state.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.active().capabilities()
    }

    /// Returns true if `tag` is registered.
    #[must_use]
    pub fn is_registered(&self, tag: K) -> bool {
        self.index_of(tag).is_some()
    }

    /// Returns true while a request from inside an update is buffered.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Asks to switch to `to`, subject to every guard.
    ///
    /// Returns false, with nothing changed, if `to` is unregistered or
    /// already active, if either state's guard refuses, or if `to` has a
    /// lower priority than the active state.
    pub fn request_change(&mut self, to: K, ctx: &mut C) -> bool {
        self.apply(to, ctx, Guard::Full)
    }

    /// Switches to `to` bypassing every guard but registration.
    ///
    /// Forcing the active state re-enters it.
    pub fn force_change(&mut self, to: K, ctx: &mut C) -> bool {
        self.apply(to, ctx, Guard::Forced)
    }

    /// Runs the active state's update, then applies the change it
    /// requested, if any.
    pub fn update(&mut self, ctx: &mut C, dt: f32) {
        self.start(ctx);
        {
            let mut requests = StateRequest {
                slot: &mut self.pending,
            };
            self.states[self.current].update(ctx, dt, &mut requests);
        }

        if let Some(to) = self.pending.take() {
            self.apply(to, ctx, Guard::SelfRelease);
        }
    }

    /// Completed transitions since the last drain.
    #[must_use]
    pub fn transitions(&self) -> &[Transition<K>] {
        &self.transitions
    }

    /// Takes the queued transitions.
    pub fn drain_transitions(&mut self) -> Vec<Transition<K>> {
        std::mem::take(&mut self.transitions)
    }

    fn apply(&mut self, to: K, ctx: &mut C, guard: Guard) -> bool {
        let Some(target) = self.index_of(to) else {
            return false;
        };
        let from = self.current();

        if guard != Guard::Forced {
            if target == self.current {
                return false;
            }
            let (leaving, entering) = (&self.states[self.current], &self.states[target]);
            if !leaving.can_exit(to, ctx) || !entering.can_enter(from, ctx) {
                tracing::trace!("{} machine: {:?} -> {:?} refused by guard", self.name, from, to);
                return false;
            }
            if guard == Guard::Full && entering.priority() < leaving.priority() {
                tracing::trace!("{} machine: {:?} -> {:?} refused by priority", self.name, from, to);
                return false;
            }
        }

        self.start(ctx);
        self.states[self.current].exit(to, ctx);
        self.current = target;
        self.states[self.current].enter(from, ctx);

        let forced = guard == Guard::Forced;
        tracing::debug!(
            "{} state transition: {:?} -> {:?}{}",
            self.name,
            from,
            to,
            if forced { " (forced)" } else { "" }
        );
        self.transitions.push(Transition { from, to, forced });
        true
    }
}
