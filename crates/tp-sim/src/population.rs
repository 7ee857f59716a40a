//! Transportables and their per-agent RNGs.
//!
//! # Why two structs?
//!
//! Driving a stage needs `&mut AgentRng` for the agent being stepped while
//! the rest of the sim (network, fleet, router) is borrowed shared.  Keeping
//! the RNGs out of [`Population`] lets the tick loop borrow one agent's
//! itinerary and RNG mutably at the same time.

use tp_core::{AgentId, AgentRng, EdgeId, Tick, TransportableKind};
use tp_stage::{AgentRef, Itinerary, Stage, WaitingStage};

// ── Transportable ─────────────────────────────────────────────────────────────

/// A person or container and its itinerary.
#[derive(Clone, Debug)]
pub struct Transportable {
    pub id:        AgentId,
    /// External id, used in reports.
    pub name:      String,
    pub kind:      TransportableKind,
    pub itinerary: Itinerary,
}

impl Transportable {
    pub fn agent_ref(&self) -> AgentRef<'_> {
        AgentRef { id: self.id, name: &self.name, kind: self.kind }
    }
}

// ── Population ────────────────────────────────────────────────────────────────

/// All transportables, indexed by `AgentId`.
#[derive(Clone, Debug, Default)]
pub struct Population {
    pub agents: Vec<Transportable>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transportable that appears at `start_pos` on `start_edge` and
    /// departs at `depart`.  A pre-departure wait is put in front of `stages`.
    pub fn add(
        &mut self,
        name:       impl Into<String>,
        kind:       TransportableKind,
        depart:     Tick,
        start_edge: EdgeId,
        start_pos:  f64,
        stages:     Vec<Stage>,
    ) -> AgentId {
        let id = AgentId(self.agents.len() as u32);
        let mut all = Vec::with_capacity(stages.len() + 1);
        all.push(WaitingStage::initial(start_edge, start_pos, depart).into());
        all.extend(stages);
        self.agents.push(Transportable { id, name: name.into(), kind, itinerary: Itinerary::new(all) });
        id
    }

    pub fn get(&self, id: AgentId) -> &Transportable {
        &self.agents[id.index()]
    }

    pub fn get_mut(&mut self, id: AgentId) -> &mut Transportable {
        &mut self.agents[id.index()]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents whose itinerary has ended, normally or by abort.
    pub fn finished_count(&self) -> usize {
        self.agents.iter().filter(|a| a.itinerary.is_finished()).count()
    }
}

// ── AgentRngs ─────────────────────────────────────────────────────────────────

/// Per-agent deterministic RNG state, separated from [`Population`].
pub struct AgentRngs {
    pub inner: Vec<AgentRng>,
}

impl AgentRngs {
    /// Allocate and seed `count` per-agent RNGs from `global_seed`.
    pub fn new(count: usize, global_seed: u64) -> Self {
        let inner = (0..count as u32)
            .map(|i| AgentRng::new(global_seed, AgentId(i)))
            .collect();
        Self { inner }
    }

    #[inline]
    pub fn get_mut(&mut self, agent: AgentId) -> &mut AgentRng {
        &mut self.inner[agent.index()]
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
