//! `WakeQueue`: sparse per-tick agent activation queue.
//!
//! Most transportables spend most ticks inside a wait or a walk whose end
//! is known in advance.  When a stage is activated with a completion tick,
//! the agent is pushed here; each tick the driver drains only the agents due
//! at that tick.
//!
//! A pushed entry can go stale, e.g. when the itinerary was aborted in the
//! meantime.  The driver checks the current stage's scheduled completion
//! before acting on a drained entry.

use std::collections::BTreeMap;

use tp_core::{AgentId, Tick};

/// Maps simulation ticks to the agents that must wake at that tick.
#[derive(Default)]
pub struct WakeQueue {
    inner: BTreeMap<Tick, Vec<AgentId>>,
    /// Cached total entry count for O(1) `len()`.
    total: usize,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `agent` to wake at `tick`.
    pub fn push(&mut self, tick: Tick, agent: AgentId) {
        self.inner.entry(tick).or_default().push(agent);
        self.total += 1;
    }

    /// Remove and return the agents scheduled for exactly `tick`, in
    /// ascending `AgentId` order without duplicates.
    pub fn drain_tick(&mut self, tick: Tick) -> Option<Vec<AgentId>> {
        let mut agents = self.inner.remove(&tick)?;
        self.total -= agents.len();
        agents.sort_unstable();
        agents.dedup();
        Some(agents)
    }

    /// The earliest tick with at least one queued agent.
    pub fn next_tick(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    /// Number of distinct ticks with queued agents.
    pub fn tick_count(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
