//! The `Sim` struct and its tick loop.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use tp_core::{AgentId, EdgeId, SimClock, SimConfig, StopId, Tick, VehicleId};
use tp_network::{Network, TransitSchedule};
use tp_stage::{
    Activation, Advance, AgentRef, IntermodalRouter, Stage, StageContext, StageError, TransportVehicle, Traveller,
};

use crate::fleet::{Fleet, Halt, Vehicle};
use crate::{AgentRngs, Population, SimError, SimObserver, SimResult, Transportable, WakeQueue};

/// Which itinerary call drives an agent.
#[derive(Copy, Clone)]
enum Drive {
    Start,
    Advance,
}

/// Borrow the sim's collaborators as a [`StageContext`].  A free function so
/// the tick loop can build a context while other fields are borrowed
/// mutably.
fn context<'a, R: IntermodalRouter>(
    network:  &'a Network,
    schedule: &'a TransitSchedule,
    fleet:    &'a Fleet,
    router:   &'a R,
    tick_duration_secs: u32,
) -> StageContext<'a> {
    StageContext { network, schedule, vehicles: fleet, router, tick_duration_secs }
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The main simulation runner.
///
/// Each tick runs these phases in order:
///
/// 1. **Start** (first tick only): activate every itinerary in ascending
///    `AgentId` order.
/// 2. **Spawn**: insert the transit trips departing this tick.
/// 3. **Move**: step every vehicle to its position for this tick.
/// 4. **Exchange**: for each halted vehicle in ascending `VehicleId`, let
///    passengers whose ride ends here alight, then board the matching
///    waiting agents in ascending `AgentId` order up to capacity.
/// 5. **Retire**: vehicles that finished their route drop any remaining
///    passengers and leave the network.
/// 6. **Wake**: advance agents whose self-completing stage is due.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<R: IntermodalRouter> {
    pub config:     SimConfig,
    pub clock:      SimClock,
    pub network:    Network,
    pub schedule:   TransitSchedule,
    pub population: Population,
    /// Per-agent deterministic RNGs, separated for the split-borrow pattern.
    pub rngs:       AgentRngs,
    pub fleet:      Fleet,
    pub wake_queue: WakeQueue,
    pub router:     R,
    /// Transit trips not yet inserted, by departure tick: `(line, trip)`.
    pub(crate) departures: BTreeMap<Tick, Vec<(usize, usize)>>,
    /// Agents waiting for a vehicle, by the edge they wait on.
    pub(crate) waiting:    FxHashMap<EdgeId, Vec<(AgentId, Option<StopId>)>>,
    /// Itineraries not yet ended.
    pub(crate) active:     usize,
    pub(crate) started:    bool,
}

impl<R: IntermodalRouter> Sim<R> {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current tick to `config.end_tick()`, or until every
    /// itinerary has ended.  Itineraries still running at the end are
    /// force-finished.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        info!(agents = self.population.len(), lines = self.schedule.len(), "simulation start");
        loop {
            let now = self.clock.current_tick;
            if now >= self.config.end_tick() || (self.started && self.active == 0) {
                break;
            }
            observer.on_tick_start(now);
            let woken = self.process_tick(now, observer)?;
            observer.on_tick_end(now, woken);
            self.clock.advance();
        }
        let end = self.clock.current_tick;
        self.finish(end, observer)?;
        info!(%end, "simulation end");
        observer.on_sim_end(end);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position (ignores `end_tick`).
    ///
    /// Useful for tests and incremental stepping.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            let now = self.clock.current_tick;
            observer.on_tick_start(now);
            let woken = self.process_tick(now, observer)?;
            observer.on_tick_end(now, woken);
            self.clock.advance();
        }
        Ok(())
    }

    /// Force-finish every itinerary still running at `now`.
    pub fn finish<O: SimObserver>(&mut self, now: Tick, observer: &mut O) -> SimResult<()> {
        let tick_secs = self.config.tick_duration_secs;
        for i in 0..self.population.len() {
            let ctx = context(&self.network, &self.schedule, &self.fleet, &self.router, tick_secs);
            let agent = &mut self.population.agents[i];
            if agent.itinerary.is_finished() {
                continue;
            }
            let diagnostic = agent
                .itinerary
                .force_finish(&ctx, now)
                .map_err(|source| SimError::Stage { agent: agent.name.clone(), source })?;
            if let Some(msg) = diagnostic {
                warn!(agent = %agent.name, %now, "{msg}");
            }
            self.active = self.active.saturating_sub(1);
            observer.on_itinerary_end(agent, &ctx);
        }
        Ok(())
    }

    /// The collaborators stages are driven with.
    pub fn context(&self) -> StageContext<'_> {
        context(&self.network, &self.schedule, &self.fleet, &self.router, self.config.tick_duration_secs)
    }

    pub fn agent(&self, id: AgentId) -> &Transportable {
        self.population.get(id)
    }

    /// Agents waiting on `edge`, in registration order.  May contain
    /// agents that stopped waiting since.
    pub fn waiting_on(&self, edge: EdgeId) -> &[(AgentId, Option<StopId>)] {
        self.waiting.get(&edge).map_or(&[], Vec::as_slice)
    }

    // ── Core tick processing ──────────────────────────────────────────────

    fn process_tick<O: SimObserver>(&mut self, now: Tick, observer: &mut O) -> SimResult<usize> {
        let mut woken = 0;

        // ── Phase 1: start itineraries ────────────────────────────────────
        if !self.started {
            self.started = true;
            self.active = self.population.len();
            for i in 0..self.population.len() {
                self.drive(AgentId(i as u32), now, Drive::Start, observer)?;
            }
        }

        // ── Phase 2: spawn transit trips ──────────────────────────────────
        if let Some(trips) = self.departures.remove(&now) {
            for (line, trip) in trips {
                let id = self.fleet.insert_transit(&self.network, &self.schedule, line, trip, now);
                debug!(vehicle = %id, trip = %self.schedule.line(line).trip_id(trip), %now, "transit trip departs");
            }
        }

        // ── Phase 3: move vehicles ────────────────────────────────────────
        self.fleet.step(now, &self.network, &self.schedule, self.config.tick_duration_secs);

        // ── Phase 4: alight and board ─────────────────────────────────────
        let halted: Vec<VehicleId> = self
            .fleet
            .iter()
            .filter(|v| v.halted().is_some())
            .map(|v| v.id)
            .collect();
        for vehicle in halted {
            woken += self.alight(vehicle, now, observer)?;
            woken += self.board(vehicle, now)?;
        }

        // ── Phase 5: retire vehicles ──────────────────────────────────────
        woken += self.retire(now, observer)?;

        // ── Phase 6: timers ───────────────────────────────────────────────
        //
        // Entries are stale when the stage they were pushed for has ended
        // in the meantime; only a stage still due at `now` is advanced.
        if let Some(due) = self.wake_queue.drain_tick(now) {
            for agent in due {
                let scheduled = self
                    .population
                    .get(agent)
                    .itinerary
                    .current_stage()
                    .and_then(Stage::scheduled_completion);
                if scheduled == Some(now) {
                    self.drive(agent, now, Drive::Advance, observer)?;
                    woken += 1;
                }
            }
        }

        Ok(woken)
    }

    /// Start or advance one agent's itinerary and act on the outcome.
    fn drive<O: SimObserver>(&mut self, agent: AgentId, now: Tick, step: Drive, observer: &mut O) -> SimResult<()> {
        let outcome = {
            let ctx = context(&self.network, &self.schedule, &self.fleet, &self.router, self.config.tick_duration_secs);
            let Transportable { id, name, kind, itinerary } = &mut self.population.agents[agent.index()];
            let mut traveller = Traveller {
                agent: AgentRef { id: *id, name, kind: *kind },
                rng:   self.rngs.get_mut(agent),
            };
            let result = match step {
                Drive::Start => itinerary.start(&ctx, &mut traveller, now),
                Drive::Advance => itinerary.advance(&ctx, &mut traveller, now),
            };
            match result {
                Ok(adv) => Some(adv),
                Err(StageError::Unroutable(e)) => {
                    warn!(agent = %name, %now, "{e}; aborting itinerary");
                    itinerary.abort();
                    None
                }
                Err(source) => return Err(SimError::Stage { agent: name.clone(), source }),
            }
        };

        let activation = match outcome {
            Some(adv) => self.apply(agent, now, adv),
            None => Activation::Finished,
        };
        match activation {
            Activation::CompleteAt(at) => self.wake_queue.push(at, agent),
            Activation::AwaitVehicle { edge, stop } => self.waiting.entry(edge).or_default().push((agent, stop)),
            Activation::Finished => self.end_itinerary(agent, observer),
        }
        Ok(())
    }

    /// Insert requested vehicles and report diagnostics.
    fn apply(&mut self, agent: AgentId, now: Tick, adv: Advance) -> Activation {
        let name = &self.population.get(agent).name;
        for msg in &adv.diagnostics {
            warn!(agent = %name, %now, "{msg}");
        }
        for vehicle in &adv.vehicles {
            let id = self.fleet.insert_private(&self.network, vehicle);
            debug!(vehicle = %id, name = %vehicle.name, %now, "private vehicle inserted");
        }
        adv.activation
    }

    fn end_itinerary<O: SimObserver>(&mut self, agent: AgentId, observer: &mut O) {
        self.active = self.active.saturating_sub(1);
        let ctx = context(&self.network, &self.schedule, &self.fleet, &self.router, self.config.tick_duration_secs);
        observer.on_itinerary_end(self.population.get(agent), &ctx);
    }

    /// Whether `agent`'s current ride ends at the place `vehicle` halts at.
    fn alights_here(&self, agent: AgentId, vehicle: &Vehicle, halt: Halt) -> bool {
        let Some(ride) = self.population.get(agent).itinerary.current_stage() else {
            return false;
        };
        if ride.vehicle() != Some(vehicle.id) {
            return false;
        }
        let at_destination_edge =
            vehicle.edge() == ride.destination() && (!vehicle.is_private() || vehicle.is_finished());
        match ride.destination_stop() {
            Some(stop) => halt == Halt::Stop(stop) || (vehicle.is_finished() && at_destination_edge),
            None => at_destination_edge,
        }
    }

    fn alight<O: SimObserver>(&mut self, vehicle: VehicleId, now: Tick, observer: &mut O) -> SimResult<usize> {
        let alighting: Vec<AgentId> = match self.fleet.get(vehicle) {
            Some(v) => match v.halted() {
                Some(halt) => v.passengers.iter().copied().filter(|&a| self.alights_here(a, v, halt)).collect(),
                None => return Ok(0),
            },
            None => return Ok(0),
        };
        if let Some(v) = self.fleet.get_mut(vehicle) {
            v.passengers.retain(|a| !alighting.contains(a));
        }
        for &agent in &alighting {
            self.drive(agent, now, Drive::Advance, observer)?;
        }
        Ok(alighting.len())
    }

    fn board(&mut self, vehicle: VehicleId, now: Tick) -> SimResult<usize> {
        let Some(v) = self.fleet.get(vehicle) else {
            return Ok(0);
        };
        let Some(halt) = v.halted() else {
            return Ok(0);
        };
        let edge = v.edge();
        let Some(mut queue) = self.waiting.remove(&edge) else {
            return Ok(0);
        };
        queue.sort_by_key(|&(agent, _)| agent);
        queue.dedup_by_key(|&mut (agent, _)| agent);

        let mut room = v.capacity.saturating_sub(v.passengers.len());
        let mut boarding = Vec::new();
        let mut remaining = Vec::with_capacity(queue.len());
        for (agent, stop) in queue {
            let Some(stage) = self.population.get(agent).itinerary.current_stage() else {
                continue;
            };
            if !stage.is_waiting_for_vehicle() {
                continue;
            }
            let place_matches = match halt {
                Halt::Stop(h) => stop.is_none_or(|s| s == h),
                Halt::Edge(_) => v.is_private(),
            };
            if room > 0 && place_matches && stage.is_waiting_for(v) {
                boarding.push(agent);
                room -= 1;
            } else {
                remaining.push((agent, stop));
            }
        }
        if !remaining.is_empty() {
            self.waiting.entry(edge).or_default().extend(remaining);
        }

        for &agent in &boarding {
            let person = &mut self.population.agents[agent.index()];
            let Some(v) = self.fleet.get(vehicle) else {
                break;
            };
            if let Some(ride) = person.itinerary.current_stage_mut().and_then(Stage::as_driving_mut) {
                ride.set_vehicle(v, now)
                    .map_err(|source| SimError::Stage { agent: person.name.clone(), source })?;
            }
            if let Some(v) = self.fleet.get_mut(vehicle) {
                v.passengers.push(agent);
                v.start(now);
            }
        }
        Ok(boarding.len())
    }

    /// Drop the remaining passengers of every vehicle that reached its route
    /// end, then remove the empty finished vehicles.
    fn retire<O: SimObserver>(&mut self, now: Tick, observer: &mut O) -> SimResult<usize> {
        let stranded: Vec<(VehicleId, Vec<AgentId>)> = self
            .fleet
            .iter()
            .filter(|v| v.is_finished() && !v.passengers.is_empty())
            .map(|v| (v.id, v.passengers.clone()))
            .collect();
        let mut count = 0;
        for (vehicle, agents) in stranded {
            if let Some(v) = self.fleet.get_mut(vehicle) {
                v.passengers.clear();
            }
            for agent in agents {
                warn!(agent = %agent, vehicle = %vehicle, %now, "passenger still aboard at the end of the route");
                self.drive(agent, now, Drive::Advance, observer)?;
                count += 1;
            }
        }
        for v in self.fleet.remove_finished() {
            debug!(vehicle = %v.name, %now, "vehicle left the network");
        }
        Ok(count)
    }
}
