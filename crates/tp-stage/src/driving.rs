//! Riding a vehicle: wait for a matching one, board, and ride to the
//! destination.
//!
//! # State machine
//!
//! ```text
//!   Pending ──proceed──▶ WaitingForVehicle ──set_vehicle──▶ Aboard ──set_arrived──▶ Done
//!                              │                               │
//!                              └────────────abort──────────────┴──▶ Aborted
//! ```
//!
//! The ride holds only a [`VehicleId`] handle.  Everything reports need
//! (name, line, class, distance) is copied out at boarding or arrival, so
//! the ride stays fully reportable after the vehicle has left the network.

use std::collections::BTreeSet;

use tracing::debug;

use tp_core::{EdgeId, Position, StopId, Tick, TransportableKind, VehicleClass, VehicleId};
use tp_network::Network;

use crate::geometry::{roadside_angle, roadside_position, stop_wait_position};
use crate::output::{ReportSink, RouteRecord, TripInfoRecord};
use crate::vehicle::TransportVehicle;
use crate::{AgentRef, Stage, StageContext, StageCore, StageError, StageResult, StageType, Transition};

/// Candidate line that accepts any vehicle halting at the ride's destination.
pub const ANY_LINE: &str = "ANY";

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RideState {
    Pending,
    WaitingForVehicle,
    Aboard,
    Done,
    Aborted,
}

#[derive(Clone, Debug)]
pub struct DrivingStage {
    pub(crate) core:   StageCore,
    lines:             BTreeSet<String>,
    state:             RideState,

    vehicle:           Option<VehicleId>,
    vehicle_name:      String,
    vehicle_line:      String,
    vehicle_class:     Option<VehicleClass>,
    vehicle_distance:  Option<f64>,
    boarding_odometer: f64,
    boarded:           Option<Tick>,

    waiting_since:     Option<Tick>,
    waiting_edge:      Option<EdgeId>,
    waiting_pos:       f64,
    waiting_stop:      Option<StopId>,
    waiting_point:     Position,
    waiting_angle:     f64,

    intended_vehicle:  String,
    intended_depart:   Option<Tick>,
}

impl DrivingStage {
    /// A ride to `destination` aboard any vehicle whose line or id is in
    /// `lines`.
    pub fn new<I, S>(destination: EdgeId, destination_stop: Option<StopId>, arrival_pos: f64, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            core:              StageCore::new(StageType::Driving, destination, destination_stop, arrival_pos),
            lines:             lines.into_iter().map(Into::into).collect(),
            state:             RideState::Pending,
            vehicle:           None,
            vehicle_name:      String::new(),
            vehicle_line:      String::new(),
            vehicle_class:     None,
            vehicle_distance:  None,
            boarding_odometer: 0.0,
            boarded:           None,
            waiting_since:     None,
            waiting_edge:      None,
            waiting_pos:       0.0,
            waiting_stop:      None,
            waiting_point:     Position::default(),
            waiting_angle:     0.0,
            intended_vehicle:  String::new(),
            intended_depart:   None,
        }
    }

    /// Record the vehicle and departure the planner expected this ride to use.
    pub fn with_intended(mut self, vehicle: impl Into<String>, depart: Tick) -> Self {
        self.intended_vehicle = vehicle.into();
        self.intended_depart = Some(depart);
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn lines(&self) -> &BTreeSet<String> {
        &self.lines
    }

    pub fn state(&self) -> RideState {
        self.state
    }

    pub fn vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    /// Name of the boarded vehicle; empty if none was ever boarded.
    pub fn vehicle_name(&self) -> &str {
        &self.vehicle_name
    }

    pub fn vehicle_line(&self) -> &str {
        &self.vehicle_line
    }

    pub fn vehicle_class(&self) -> Option<VehicleClass> {
        self.vehicle_class
    }

    /// Distance ridden, known once the ride has arrived.
    pub fn vehicle_distance(&self) -> Option<f64> {
        self.vehicle_distance
    }

    pub fn boarded(&self) -> Option<Tick> {
        self.boarded
    }

    pub fn waiting_since(&self) -> Option<Tick> {
        self.waiting_since
    }

    pub fn intended_vehicle(&self) -> &str {
        &self.intended_vehicle
    }

    pub fn intended_depart(&self) -> Option<Tick> {
        self.intended_depart
    }

    pub fn is_waiting_for_vehicle(&self) -> bool {
        self.state == RideState::WaitingForVehicle
    }

    pub(crate) fn from_edge(&self) -> EdgeId {
        self.waiting_edge.unwrap_or(self.core.destination)
    }

    /// Distance ridden, `0` until known.
    pub fn distance(&self) -> f64 {
        self.vehicle_distance.unwrap_or(0.0)
    }

    // ── Vehicle matching ──────────────────────────────────────────────────

    /// Whether the ride, while waiting, would board `vehicle`: its line or
    /// its own id is a candidate, or `ANY` is a candidate and the vehicle
    /// halts at the ride's destination.
    pub fn is_waiting_for(&self, vehicle: &dyn TransportVehicle) -> bool {
        if self.state != RideState::WaitingForVehicle {
            return false;
        }
        if self.lines.contains(vehicle.line()) || self.lines.contains(vehicle.name()) {
            return true;
        }
        self.lines.contains(ANY_LINE)
            && match self.core.destination_stop {
                Some(stop) => vehicle.stops_at(stop),
                None => vehicle.stops_at_edge(self.core.destination),
            }
    }

    /// Board `vehicle`.  Caches the vehicle's identity immediately.
    pub fn set_vehicle(&mut self, vehicle: &dyn TransportVehicle, now: Tick) -> StageResult<()> {
        if self.state != RideState::WaitingForVehicle {
            return Err(StageError::Precondition(format!(
                "cannot board vehicle '{}' from ride state {:?}",
                vehicle.name(),
                self.state
            )));
        }
        self.core.check_time(now)?;
        self.vehicle = Some(vehicle.id());
        self.vehicle_name = vehicle.name().to_owned();
        self.vehicle_line = vehicle.line().to_owned();
        self.vehicle_class = Some(vehicle.vehicle_class());
        self.boarding_odometer = vehicle.odometer();
        self.boarded = Some(now);
        self.state = RideState::Aboard;
        debug!(vehicle = %self.vehicle_name, line = %self.vehicle_line, %now, "boarded");
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    pub(crate) fn proceed(&mut self, ctx: &StageContext<'_>, now: Tick, previous: Option<&Stage>) -> StageResult<Transition> {
        let Some(prev) = previous else {
            return Err(StageError::Precondition(
                "a ride needs a previous stage to know where to wait".to_owned(),
            ));
        };
        let net = ctx.network;
        let edge = prev.edge(now, ctx);
        let pos = prev.edge_pos(now, ctx)?;
        let stop = prev.destination_stop().filter(|&s| net.stop(s).edge == edge);

        self.waiting_since = Some(now);
        self.waiting_edge = Some(edge);
        self.waiting_pos = pos;
        self.waiting_stop = stop;
        self.waiting_point = match stop {
            Some(s) => stop_wait_position(net, s),
            None => roadside_position(net, edge, pos),
        };
        self.waiting_angle = roadside_angle(net, edge, pos);
        self.core.set_departed(now);
        self.state = RideState::WaitingForVehicle;
        debug!(lines = %self.lines_label(), edge = %net.edge(edge).name, %now, "waiting for ride");
        Ok(Transition::AwaitVehicle { edge, stop })
    }

    /// Close the ride.  Reads the distance from the vehicle's odometer and
    /// drops the vehicle handle; the cached fields stay valid.
    pub(crate) fn set_arrived(&mut self, ctx: &StageContext<'_>, now: Tick) -> StageResult<String> {
        self.core.mark_arrived(now)?;
        let diagnostic = match self.state {
            RideState::Aboard => match self.vehicle.and_then(|v| ctx.vehicles.vehicle(v)) {
                Some(v) => {
                    self.vehicle_distance = Some(v.odometer() - self.boarding_odometer);
                    String::new()
                }
                None => {
                    self.vehicle_distance = Some(0.0);
                    format!("vehicle '{}' left the network before the ride arrived", self.vehicle_name)
                }
            },
            RideState::Pending | RideState::WaitingForVehicle => {
                self.vehicle_distance = Some(0.0);
                let mut msg = format!(
                    "no vehicle arrived for lines '{}' {}",
                    self.lines_label(),
                    self.waiting_place(ctx.network)
                );
                if !self.intended_vehicle.is_empty() {
                    msg.push_str(&format!(" (intended '{}')", self.intended_vehicle));
                }
                msg
            }
            RideState::Done | RideState::Aborted => String::new(),
        };
        self.vehicle = None;
        if self.state != RideState::Aborted {
            self.state = RideState::Done;
        }
        Ok(diagnostic)
    }

    pub(crate) fn abort(&mut self) {
        if matches!(self.state, RideState::WaitingForVehicle | RideState::Aboard) {
            self.state = RideState::Aborted;
            self.vehicle = None;
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Ticks spent waiting so far, while still waiting.
    pub(crate) fn waiting_time(&self, now: Tick) -> u64 {
        match (self.state, self.waiting_since) {
            (RideState::WaitingForVehicle, Some(since)) => now.saturating_since(since),
            _ => 0,
        }
    }

    fn live_vehicle<'c>(&self, ctx: &'c StageContext<'_>) -> Option<&'c dyn TransportVehicle> {
        match self.state {
            RideState::Aboard => self.vehicle.and_then(|v| ctx.vehicles.vehicle(v)),
            _ => None,
        }
    }

    pub(crate) fn speed(&self, ctx: &StageContext<'_>) -> f64 {
        self.live_vehicle(ctx).map_or(0.0, |v| v.speed())
    }

    pub(crate) fn edge(&self, ctx: &StageContext<'_>) -> EdgeId {
        if let Some(v) = self.live_vehicle(ctx) {
            return v.edge();
        }
        match self.state {
            RideState::WaitingForVehicle | RideState::Aboard | RideState::Aborted => self.from_edge(),
            RideState::Pending | RideState::Done => self.core.destination,
        }
    }

    pub(crate) fn edge_pos(&self, ctx: &StageContext<'_>) -> f64 {
        if let Some(v) = self.live_vehicle(ctx) {
            return v.edge_pos();
        }
        match self.state {
            RideState::WaitingForVehicle | RideState::Aboard | RideState::Aborted => self.waiting_pos,
            RideState::Pending | RideState::Done => self.core.arrival_pos,
        }
    }

    pub(crate) fn position(&self, _now: Tick, ctx: &StageContext<'_>) -> Position {
        if let Some(v) = self.live_vehicle(ctx) {
            return v.position();
        }
        match self.state {
            RideState::WaitingForVehicle | RideState::Aboard | RideState::Aborted => self.waiting_point,
            RideState::Pending | RideState::Done => match self.core.destination_stop {
                Some(stop) => stop_wait_position(ctx.network, stop),
                None => roadside_position(ctx.network, self.core.destination, self.core.arrival_pos),
            },
        }
    }

    pub(crate) fn angle(&self, _now: Tick, ctx: &StageContext<'_>) -> f64 {
        if let Some(v) = self.live_vehicle(ctx) {
            return v.angle();
        }
        match self.state {
            RideState::WaitingForVehicle | RideState::Aboard | RideState::Aborted => self.waiting_angle,
            RideState::Pending | RideState::Done => {
                roadside_angle(ctx.network, self.core.destination, self.core.arrival_pos)
            }
        }
    }

    // ── Descriptions ──────────────────────────────────────────────────────

    fn lines_label(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    fn waiting_place(&self, network: &Network) -> String {
        match (self.waiting_stop, self.waiting_edge) {
            (Some(stop), _) => format!("at stop '{}'", network.stop(stop).name),
            (None, Some(edge)) => format!("at edge '{}' position {:.2}", network.edge(edge).name, self.waiting_pos),
            (None, None) => "before departure".to_owned(),
        }
    }

    /// Where the transportable waits and for which lines.
    pub fn waiting_description(&self, network: &Network) -> String {
        format!("waiting for {} {}", self.lines_label(), self.waiting_place(network))
    }

    fn verb(kind: TransportableKind) -> &'static str {
        match kind {
            TransportableKind::Person    => "driving",
            TransportableKind::Container => "transport",
        }
    }

    pub(crate) fn description(&self, kind: TransportableKind) -> String {
        Self::verb(kind).to_owned()
    }

    pub(crate) fn summary(&self, network: &Network, kind: TransportableKind) -> String {
        let target = match self.core.destination_stop {
            Some(stop) => format!(
                "stop '{}' (edge '{}')",
                network.stop(stop).name,
                network.edge(self.core.destination).name
            ),
            None => format!("edge '{}'", network.edge(self.core.destination).name),
        };
        let mut out = format!("{} to {target} with lines '{}'", Self::verb(kind), self.lines_label());
        if !self.intended_vehicle.is_empty() {
            out.push_str(&format!(" (intended '{}')", self.intended_vehicle));
        }
        out
    }

    // ── Reports ───────────────────────────────────────────────────────────

    fn element(kind: TransportableKind) -> &'static str {
        match kind {
            TransportableKind::Person    => "ride",
            TransportableKind::Container => "transport",
        }
    }

    pub(crate) fn trip_info_output(&self, sink: &mut dyn ReportSink, agent: &AgentRef<'_>, ctx: &StageContext<'_>) {
        let from = ctx.network.edge(self.from_edge()).name.clone();
        let mut rec = TripInfoRecord::for_stage(Self::element(agent.kind), agent, &self.core, &from, ctx.network);
        rec.depart = self.boarded;
        rec.duration = match (self.boarded, self.core.arrived()) {
            (Some(b), Some(a)) => Some(a.saturating_since(b)),
            _ => None,
        };
        rec.waiting_time = match (self.waiting_since, self.boarded.or(self.core.arrived())) {
            (Some(since), Some(end)) => end.saturating_since(since),
            _ => 0,
        };
        rec.route_length = self.distance();
        rec.vehicle = self.vehicle_name.clone();
        rec.line = self.vehicle_line.clone();
        rec.vehicle_class = self.vehicle_class;
        rec.intended_vehicle = self.intended_vehicle.clone();
        rec.intended_depart = self.intended_depart;
        sink.trip_info(rec);
    }

    pub(crate) fn route_output(
        &self,
        sink: &mut dyn ReportSink,
        agent: &AgentRef<'_>,
        with_route_length: bool,
        ctx: &StageContext<'_>,
    ) {
        let mut rec = RouteRecord::for_stage(Self::element(agent.kind), agent, &self.core, ctx.network);
        rec.edges = vec![
            ctx.network.edge(self.from_edge()).name.clone(),
            ctx.network.edge(self.core.destination).name.clone(),
        ];
        rec.lines = self.lines.iter().cloned().collect();
        rec.intended_vehicle = self.intended_vehicle.clone();
        rec.intended_depart = self.intended_depart;
        if with_route_length {
            rec.route_length = Some(self.distance());
        }
        sink.route(rec);
    }
}

impl From<DrivingStage> for Stage {
    fn from(stage: DrivingStage) -> Self {
        Stage::Driving(stage)
    }
}
