//! Fluent builder for constructing a [`Sim`].

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use tp_core::{SimConfig, Tick};
use tp_network::{Network, TransitSchedule};
use tp_stage::{IntermodalRouter, ANY_LINE};

use crate::{AgentRngs, Fleet, Population, Sim, SimError, SimResult, WakeQueue};

/// Fluent builder for [`Sim<R>`].
///
/// # Required inputs
///
/// - [`SimConfig`]: total ticks, seed, tick duration, …
/// - [`Network`]: roads and stopping places
/// - [`Population`]: the transportables and their itineraries
/// - `R: IntermodalRouter`: resolves trips (e.g. [`tp_stage::ScheduleRouter`])
///
/// # Optional inputs (have defaults)
///
/// | Method          | Default                      |
/// |-----------------|------------------------------|
/// | `.schedule(s)`  | Empty `TransitSchedule`      |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, network, population, ScheduleRouter::new(settings.router))
///     .schedule(schedule)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<R: IntermodalRouter> {
    config:     SimConfig,
    network:    Network,
    population: Population,
    schedule:   Option<TransitSchedule>,
    router:     R,
}

impl<R: IntermodalRouter> SimBuilder<R> {
    pub fn new(config: SimConfig, network: Network, population: Population, router: R) -> Self {
        Self { config, network, population, schedule: None, router }
    }

    /// Supply the transit lines.  Their timings must have been computed with
    /// the same tick duration as `config`.
    pub fn schedule(mut self, schedule: TransitSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Validate inputs, seed the agent RNGs and index the transit
    /// departures, and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim<R>> {
        if self.config.tick_duration_secs == 0 {
            return Err(SimError::Config("tick_duration_secs must be positive".to_owned()));
        }
        let schedule = self.schedule.unwrap_or_default();
        check_rides(&self.population, &schedule)?;

        let mut departures: BTreeMap<Tick, Vec<(usize, usize)>> = BTreeMap::new();
        for (line, (spec, _)) in schedule.iter().enumerate() {
            for (trip, &depart) in spec.departures.iter().enumerate() {
                departures.entry(depart).or_default().push((line, trip));
            }
        }

        let rngs = AgentRngs::new(self.population.len(), self.config.seed);

        Ok(Sim {
            clock:      self.config.make_clock(),
            config:     self.config,
            network:    self.network,
            schedule,
            population: self.population,
            rngs,
            fleet:      Fleet::new(),
            wake_queue: WakeQueue::new(),
            router:     self.router,
            departures,
            waiting:    FxHashMap::default(),
            active:     0,
            started:    false,
        })
    }
}

/// Reject rides no vehicle could ever take: an empty candidate set, or one
/// naming no scheduled line, no scheduled trip, and no agent's private car.
fn check_rides(population: &Population, schedule: &TransitSchedule) -> SimResult<()> {
    let mut known: FxHashSet<String> = FxHashSet::default();
    for (line, _) in schedule.iter() {
        known.insert(line.name.clone());
        known.extend((0..line.departures.len()).map(|k| line.trip_id(k)));
    }
    known.extend(population.agents.iter().map(|a| format!("{}_car", a.name)));

    for agent in &population.agents {
        for (idx, ride) in agent.itinerary.stages().iter().enumerate().filter_map(|(i, s)| Some((i, s.as_driving()?))) {
            let lines = ride.lines();
            if lines.is_empty() {
                return Err(SimError::Config(format!("agent '{}' stage {idx}: ride has no candidate lines", agent.name)));
            }
            if !lines.contains(ANY_LINE) && !lines.iter().any(|l| known.contains(l)) {
                let names: Vec<&str> = lines.iter().map(String::as_str).collect();
                return Err(SimError::Config(format!(
                    "agent '{}' stage {idx}: no vehicle serves lines '{}'",
                    agent.name,
                    names.join(" ")
                )));
            }
        }
    }
    Ok(())
}
