//! Report records emitted by stages.
//!
//! Stages describe themselves as plain records pushed into a [`ReportSink`];
//! formatting them (CSV, XML, …) is the writer's business.  Two streams
//! exist: *trip info* (what happened) and *routes* (what was planned).

use tp_core::{Tick, VehicleClass};
use tp_network::Network;

use crate::{AgentRef, StageCore};

/// What happened during one stage.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TripInfoRecord {
    pub agent:            String,
    /// `"stop"`, `"walk"`, `"ride"`, `"transport"`, `"access"`, `"tranship"`
    /// or `"trip"`.
    pub element:          &'static str,
    pub depart:           Option<Tick>,
    pub arrival:          Option<Tick>,
    pub from_edge:        String,
    pub to_edge:          String,
    pub to_stop:          String,
    pub arrival_pos:      f64,
    /// Ticks between depart and arrival.
    pub duration:         Option<u64>,
    /// Metres travelled; `-1` when undetermined.
    pub route_length:     f64,
    /// Ticks spent waiting for a vehicle.
    pub waiting_time:     u64,
    pub vehicle:          String,
    pub line:             String,
    pub vehicle_class:    Option<VehicleClass>,
    pub intended_vehicle: String,
    pub intended_depart:  Option<Tick>,
    pub act_type:         String,
}

impl TripInfoRecord {
    /// A record pre-filled from the shared stage state.
    pub(crate) fn for_stage(element: &'static str, agent: &AgentRef<'_>, core: &StageCore, from: &str, network: &Network) -> Self {
        Self {
            agent:        agent.name.to_owned(),
            element,
            depart:       core.departed(),
            arrival:      core.arrived(),
            from_edge:    from.to_owned(),
            to_edge:      network.edge(core.destination).name.clone(),
            to_stop:      stop_name(core, network),
            arrival_pos:  core.arrival_pos,
            duration:     match (core.departed(), core.arrived()) {
                (Some(d), Some(a)) => Some(a.saturating_since(d)),
                _ => None,
            },
            ..Self::default()
        }
    }
}

/// What was planned for one stage.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RouteRecord {
    pub agent:            String,
    /// Same vocabulary as [`TripInfoRecord::element`].
    pub element:          &'static str,
    /// Edge names from start to destination.
    pub edges:            Vec<String>,
    pub to_stop:          String,
    pub arrival_pos:      f64,
    pub lines:            Vec<String>,
    pub modes:            String,
    pub duration:         Option<u64>,
    pub until:            Option<Tick>,
    pub act_type:         String,
    /// Present only when route lengths were requested.
    pub route_length:     Option<f64>,
    pub intended_vehicle: String,
    pub intended_depart:  Option<Tick>,
    pub started:          Option<Tick>,
    pub ended:            Option<Tick>,
}

impl RouteRecord {
    pub(crate) fn for_stage(element: &'static str, agent: &AgentRef<'_>, core: &StageCore, network: &Network) -> Self {
        Self {
            agent:       agent.name.to_owned(),
            element,
            edges:       vec![network.edge(core.destination).name.clone()],
            to_stop:     stop_name(core, network),
            arrival_pos: core.arrival_pos,
            started:     core.departed(),
            ended:       core.arrived(),
            ..Self::default()
        }
    }
}

fn stop_name(core: &StageCore, network: &Network) -> String {
    core.destination_stop
        .map(|s| network.stop(s).name.clone())
        .unwrap_or_default()
}

/// Destination of stage reports.
pub trait ReportSink {
    fn trip_info(&mut self, record: TripInfoRecord);
    fn route(&mut self, record: RouteRecord);
}

/// A sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    pub trip_infos: Vec<TripInfoRecord>,
    pub routes:     Vec<RouteRecord>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.trip_infos.is_empty() && self.routes.is_empty()
    }
}

impl ReportSink for RecordBuffer {
    fn trip_info(&mut self, record: TripInfoRecord) {
        self.trip_infos.push(record);
    }

    fn route(&mut self, record: RouteRecord) {
        self.routes.push(record);
    }
}
