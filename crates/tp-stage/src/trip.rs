//! Unresolved trip requests.
//!
//! A [`TripStage`] knows where the transportable wants to go and how it may
//! travel, but not the path.  The path is computed when the stage is
//! activated, from wherever the transportable actually is at that moment.

use tp_core::{EdgeId, ModeSet, Position, StopId, Tick, TransportableKind};
use tp_network::Network;

use crate::geometry::{roadside_angle, roadside_position};
use crate::output::{ReportSink, RouteRecord};
use crate::router::TripRequest;
use crate::{AgentRef, Stage, StageContext, StageCore, StageResult, StageType, Transition, Traveller};

/// Where on the origin edge an itinerary's first trip starts.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum DepartPos {
    /// A fixed offset, clamped to the edge.
    Given(f64),
    /// Uniform over the edge, drawn from the agent's RNG.
    Random,
}

impl Default for DepartPos {
    fn default() -> Self {
        DepartPos::Given(0.0)
    }
}

#[derive(Clone, Debug)]
pub struct TripStage {
    pub(crate) core: StageCore,
    /// Updated on each resolution to where the previous stage ended.
    pub origin:              EdgeId,
    pub origin_stop:         Option<StopId>,
    /// Fixed walking duration in ticks; ignored by non-walking plans.
    pub duration:            Option<u64>,
    pub modes:               ModeSet,
    /// Vehicle type prefixes the router may use.
    pub vehicle_types:       Vec<String>,
    pub speed:               Option<f64>,
    pub walk_factor:         f64,
    pub depart_pos:          DepartPos,
    pub depart_pos_lat:      f64,
    pub has_arrival_pos:     bool,
    /// Depart offset used by the latest resolution.
    pub resolved_depart_pos: f64,
}

impl TripStage {
    /// A trip from `origin` to the end of `destination`.
    pub fn new(network: &Network, origin: EdgeId, destination: EdgeId) -> Self {
        let arrival_pos = network.edge(destination).length;
        Self {
            core:                StageCore::new(StageType::Trip, destination, None, arrival_pos),
            origin,
            origin_stop:         None,
            duration:            None,
            modes:               ModeSet::NONE,
            vehicle_types:       Vec::new(),
            speed:               None,
            walk_factor:         1.0,
            depart_pos:          DepartPos::default(),
            depart_pos_lat:      0.0,
            has_arrival_pos:     false,
            resolved_depart_pos: 0.0,
        }
    }

    /// End at `stop` instead of at the end of the destination edge.
    pub fn to_stop(mut self, network: &Network, stop: StopId) -> Self {
        let place = network.stop(stop);
        self.core.destination = place.edge;
        self.core.destination_stop = Some(stop);
        self.core.arrival_pos = place.access_pos();
        self
    }

    pub fn from_stop(mut self, stop: StopId) -> Self {
        self.origin_stop = Some(stop);
        self
    }

    pub fn with_arrival_pos(mut self, pos: f64) -> Self {
        self.core.arrival_pos = pos;
        self.has_arrival_pos = true;
        self
    }

    pub fn with_modes(mut self, modes: ModeSet) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_vehicle_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vehicle_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_duration(mut self, ticks: u64) -> Self {
        self.duration = Some(ticks);
        self
    }

    pub fn with_walk_factor(mut self, factor: f64) -> Self {
        self.walk_factor = factor;
        self
    }

    pub fn with_depart_pos(mut self, pos: DepartPos) -> Self {
        self.depart_pos = pos;
        self
    }

    pub fn with_depart_pos_lat(mut self, lateral: f64) -> Self {
        self.depart_pos_lat = lateral;
        self
    }

    /// Re-anchor the trip, e.g. for a reroute from the current position.
    pub fn set_origin(&mut self, edge: EdgeId) {
        self.origin = edge;
    }

    fn resolve_depart_pos(&self, network: &Network, traveller: &mut Traveller<'_>) -> f64 {
        let len = network.edge(self.origin).length;
        match self.depart_pos {
            DepartPos::Given(pos) => pos.clamp(0.0, len),
            DepartPos::Random => traveller.rng.gen_range(0.0..=len),
        }
    }

    /// Resolve the trip through the context's router.
    ///
    /// A previous stage re-anchors the origin to where it ended.  The
    /// pre-departure wait is the exception: the trip's own depart position
    /// applies after it.  On failure nothing is recorded, so the trip can be
    /// resolved again later.
    pub(crate) fn proceed(
        &mut self,
        ctx: &StageContext<'_>,
        traveller: &mut Traveller<'_>,
        now: Tick,
        previous: Option<&Stage>,
    ) -> StageResult<Transition> {
        let net = ctx.network;
        match previous {
            Some(prev) if prev.stage_type() != StageType::WaitingForDepart => {
                self.origin = prev.edge(now, ctx);
                self.resolved_depart_pos = prev.edge_pos(now, ctx)?;
                if self.origin_stop.is_none() {
                    self.origin_stop = prev.destination_stop().filter(|&s| net.stop(s).edge == self.origin);
                }
            }
            Some(prev) => {
                self.origin = prev.destination();
                self.resolved_depart_pos = self.resolve_depart_pos(net, traveller);
            }
            None => {
                self.resolved_depart_pos = self.resolve_depart_pos(net, traveller);
            }
        }

        let request = TripRequest {
            agent:            traveller.agent.id,
            agent_name:       traveller.agent.name.to_owned(),
            kind:             traveller.agent.kind,
            origin:           self.origin,
            origin_stop:      self.origin_stop,
            destination:      self.core.destination,
            destination_stop: self.core.destination_stop,
            depart:           now,
            depart_pos:       self.resolved_depart_pos,
            depart_pos_lat:   self.depart_pos_lat,
            arrival_pos:      self.core.arrival_pos,
            has_arrival_pos:  self.has_arrival_pos,
            modes:            self.modes,
            vehicle_types:    self.vehicle_types.clone(),
            speed:            self.speed,
            duration:         self.duration,
            walk_factor:      self.walk_factor,
        };
        let resolution = ctx.router.resolve(net, ctx.schedule, ctx.tick_duration_secs, &request)?;
        self.core.set_departed(now);
        Ok(Transition::Expand(resolution))
    }

    pub(crate) fn position(&self, _now: Tick, ctx: &StageContext<'_>) -> Position {
        roadside_position(ctx.network, self.origin, self.resolved_depart_pos)
    }

    pub(crate) fn angle(&self, _now: Tick, ctx: &StageContext<'_>) -> f64 {
        roadside_angle(ctx.network, self.origin, self.resolved_depart_pos)
    }

    pub(crate) fn description(&self, _kind: TransportableKind) -> String {
        "trip".to_owned()
    }

    pub(crate) fn summary(&self, network: &Network, _kind: TransportableKind) -> String {
        let target = match self.core.destination_stop {
            Some(stop) => format!("stop '{}'", network.stop(stop).name),
            None => format!("edge '{}'", network.edge(self.core.destination).name),
        };
        let mut out = format!("trip from edge '{}' to {target}", network.edge(self.origin).name);
        if !self.modes.is_empty() {
            out.push_str(&format!(" modes '{}'", self.modes));
        }
        out
    }

    /// Trips only exist before resolution; what they became is reported by
    /// the resolved stages.
    pub(crate) fn trip_info_output(&self, _sink: &mut dyn ReportSink, _agent: &AgentRef<'_>, _ctx: &StageContext<'_>) {}

    pub(crate) fn route_output(
        &self,
        sink: &mut dyn ReportSink,
        agent: &AgentRef<'_>,
        _with_route_length: bool,
        ctx: &StageContext<'_>,
    ) {
        let mut rec = RouteRecord::for_stage("trip", agent, &self.core, ctx.network);
        rec.edges = vec![
            ctx.network.edge(self.origin).name.clone(),
            ctx.network.edge(self.core.destination).name.clone(),
        ];
        rec.modes = self.modes.to_string();
        rec.lines = self.vehicle_types.clone();
        rec.duration = self.duration;
        sink.route(rec);
    }
}

impl From<TripStage> for Stage {
    fn from(stage: TripStage) -> Self {
        Stage::Trip(stage)
    }
}
