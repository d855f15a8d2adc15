//! Cooperative clock-domain scheduler.
//!
//! Every independently clocked unit (CPU, video counter, cartridge clock) is a
//! [`Thread`] with its own frequency. Local clocks are kept in a shared time
//! base so domains running at different rates can be compared directly: one
//! cycle of a domain is worth `SECOND / frequency` time units.
//!
//! There are no real threads. A domain "waits" for another by calling
//! [`synchronize`], which runs the other domain's main routine until it has
//! caught up with the caller.

use log::warn;

use crate::state::{Serializable, Serializer};

/// Scheduler time units in one emulated second.
pub const SECOND: u128 = 1 << 63;

/// Handle to a domain registered with a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(usize);

impl DomainId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Thread {
    name: &'static str,
    frequency: u64,
    scalar: u128,
    clock: u128,
}

impl Thread {
    fn new(name: &'static str, frequency: u64) -> Self {
        let frequency = frequency.max(1);
        Self {
            name,
            frequency,
            scalar: SECOND / frequency as u128,
            clock: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Time units charged per local cycle.
    pub fn scalar(&self) -> u128 {
        self.scalar
    }

    /// Local clock in scheduler time units.
    pub fn clock(&self) -> u128 {
        self.clock
    }
}

#[derive(Debug, Default, Clone)]
pub struct Scheduler {
    threads: Vec<Thread>,
    active: Option<DomainId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain running at `frequency` Hz. Domains start at time zero.
    pub fn create(&mut self, name: &'static str, frequency: u64) -> DomainId {
        self.threads.push(Thread::new(name, frequency));
        DomainId(self.threads.len() - 1)
    }

    /// Drop every domain. Handles issued before the reset become invalid.
    pub fn reset(&mut self) {
        self.threads.clear();
        self.active = None;
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DomainId> + '_ {
        (0..self.threads.len()).map(DomainId)
    }

    pub fn thread(&self, id: DomainId) -> &Thread {
        &self.threads[id.0]
    }

    pub fn time(&self, id: DomainId) -> u128 {
        self.threads[id.0].clock
    }

    /// Advance `id` by `clocks` of its own cycles.
    pub fn step(&mut self, id: DomainId, clocks: u32) {
        let thread = &mut self.threads[id.0];
        thread.clock += thread.scalar * clocks as u128;
    }

    pub fn active(&self) -> Option<DomainId> {
        self.active
    }

    /// Mark `id` as the running domain, returning the previous one so it can be
    /// restored with [`Scheduler::leave`].
    pub fn enter(&mut self, id: DomainId) -> Option<DomainId> {
        self.active.replace(id)
    }

    pub fn leave(&mut self, previous: Option<DomainId>) {
        self.active = previous;
    }

    /// Whether `target` lags behind the running domain.
    pub fn behind(&self, target: DomainId) -> bool {
        match self.active {
            Some(active) if active != target => self.time(target) < self.time(active),
            _ => false,
        }
    }

    /// Domain with the smallest clock; ties go to the earliest registered.
    pub fn most_behind(&self) -> Option<DomainId> {
        self.threads
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| t.clock)
            .map(|(i, _)| DomainId(i))
    }

    /// Rebase every clock on the smallest one. Relative order is unchanged.
    pub fn normalize(&mut self) {
        let Some(floor) = self.threads.iter().map(|t| t.clock).min() else {
            return;
        };
        for thread in &mut self.threads {
            thread.clock -= floor;
        }
    }
}

/// Only the clocks are stored; the domain set itself is rebuilt at power-on.
impl Serializable for Scheduler {
    fn serialize(&mut self, s: &mut Serializer) {
        for thread in &mut self.threads {
            s.integer(&mut thread.clock);
        }
    }
}

/// A set of domains that can be driven by [`synchronize`].
pub trait Domains {
    fn scheduler(&mut self) -> &mut Scheduler;

    /// Run one unit of work for `id`. Implementations must advance the domain
    /// with [`Scheduler::step`].
    fn main(&mut self, id: DomainId);
}

/// Run `target` until it is no longer behind the active domain.
///
/// A target whose main routine fails to advance its clock would loop forever;
/// that is reported and the catch-up stops.
pub fn synchronize<D: Domains + ?Sized>(domains: &mut D, target: DomainId) {
    while domains.scheduler().behind(target) {
        let before = domains.scheduler().time(target);
        let caller = domains.scheduler().enter(target);
        domains.main(target);
        let scheduler = domains.scheduler();
        scheduler.leave(caller);
        if scheduler.time(target) == before {
            warn!(
                "domain {} made no progress while synchronizing",
                scheduler.thread(target).name()
            );
            break;
        }
    }
}
