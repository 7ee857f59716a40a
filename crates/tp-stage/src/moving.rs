//! Walking (persons) and tranship (containers) along an edge route.
//!
//! Movement is constant-speed: the stage completes `ceil(length / speed)`
//! ticks after departure (at least one tick), and positions in between are
//! interpolated linearly along the route, so the transportable reaches its
//! arrival offset exactly at completion.

use tp_core::time::ticks_for_secs;
use tp_core::{EdgeId, Position, StopId, Tick, TransportableKind};
use tp_network::Network;

use crate::geometry::{edge_angle, edge_position, roadside_offset};
use crate::output::{ReportSink, RouteRecord, TripInfoRecord};
use crate::{AgentRef, Stage, StageContext, StageCore, StageError, StageResult, StageType, Transition};

/// Default pedestrian speed in m/s.
pub const DEFAULT_WALK_SPEED: f64 = 1.39;

#[derive(Clone, Debug)]
pub struct MovingStage {
    pub(crate) core:  StageCore,
    /// Edges from start to destination.  Never empty.
    pub route:        Vec<EdgeId>,
    pub depart_pos:   f64,
    /// Extra lateral offset, added to the roadside offset.
    pub depart_pos_lat: f64,
    /// Speed in m/s.
    pub speed:        f64,
    /// Fixed duration in ticks, overriding `length / speed`.
    pub duration:     Option<u64>,
    pub(crate) length:     f64,
    pub(crate) completion: Option<Tick>,
}

impl MovingStage {
    /// Walk (persons) or tranship (containers) along `route`, which must
    /// name at least one edge.  The last edge is the destination.
    #[allow(clippy::too_many_arguments)]
    pub fn on_foot(
        kind: TransportableKind,
        network: &Network,
        route: Vec<EdgeId>,
        depart_pos: f64,
        arrival_pos: f64,
        destination_stop: Option<StopId>,
        speed: f64,
    ) -> StageResult<Self> {
        let stage_type = match kind {
            TransportableKind::Person    => StageType::Walking,
            TransportableKind::Container => StageType::Tranship,
        };
        let Some(&destination) = route.last() else {
            return Err(StageError::Precondition(format!("{stage_type} stage with an empty route")));
        };
        let mut stage = Self {
            core: StageCore::new(stage_type, destination, destination_stop, arrival_pos),
            route,
            depart_pos,
            depart_pos_lat: 0.0,
            speed: speed.max(0.01),
            duration: None,
            length: 0.0,
            completion: None,
        };
        stage.length = stage.route_length(network);
        Ok(stage)
    }

    pub fn with_duration(mut self, ticks: u64) -> Self {
        self.duration = Some(ticks);
        self
    }

    pub fn with_depart_pos_lat(mut self, lateral: f64) -> Self {
        self.depart_pos_lat = lateral;
        self
    }

    /// Distance covered from `depart_pos` on the first edge to the arrival
    /// offset on the last.
    pub fn route_length(&self, network: &Network) -> f64 {
        match self.route.as_slice() {
            [] => 0.0,
            [only] => {
                let len = network.edge(*only).length;
                (self.core.arrival_pos.clamp(0.0, len) - self.depart_pos.clamp(0.0, len)).abs()
            }
            [first, middle @ .., last] => {
                let head = network.edge(*first).length;
                let inner: f64 = middle.iter().map(|&e| network.edge(e).length).sum();
                let tail = self.core.arrival_pos.clamp(0.0, network.edge(*last).length);
                (head - self.depart_pos.clamp(0.0, head)) + inner + tail
            }
        }
    }

    /// Ticks the whole movement takes.
    pub fn travel_ticks(&self, tick_duration_secs: u32) -> u64 {
        self.duration
            .unwrap_or_else(|| ticks_for_secs(self.length / self.speed, tick_duration_secs))
            .max(1)
    }

    pub(crate) fn set_speed(&mut self, speed: f64) {
        // Takes effect for a stage that has not started yet.
        if self.core.departed().is_none() && speed > 0.0 {
            self.speed = speed;
        }
    }

    pub(crate) fn proceed(&mut self, ctx: &StageContext<'_>, now: Tick, previous: Option<&Stage>) -> Transition {
        if let Some(prev) = previous {
            let prev_edge = prev.edge(now, ctx);
            if self.route.first() == Some(&prev_edge) {
                if let Ok(pos) = prev.edge_pos(now, ctx) {
                    self.depart_pos = pos;
                }
            }
        }
        self.length = self.route_length(ctx.network);
        self.core.set_departed(now);
        let end = now + self.travel_ticks(ctx.tick_duration_secs);
        self.completion = Some(end);
        Transition::CompleteAt(end)
    }

    /// Metres covered at `now`.
    fn covered(&self, now: Tick, tick_duration_secs: u32) -> f64 {
        let Some(departed) = self.core.departed() else { return 0.0 };
        if self.core.arrived().is_some() {
            return self.length;
        }
        let total = self.travel_ticks(tick_duration_secs) as f64;
        let elapsed = now.saturating_since(departed) as f64;
        self.length * (elapsed / total).min(1.0)
    }

    /// `(edge, offset, backwards)` at `now`.
    fn locate(&self, now: Tick, ctx: &StageContext<'_>) -> (EdgeId, f64, bool) {
        let net = ctx.network;
        let mut left = self.covered(now, ctx.tick_duration_secs);
        match self.route.as_slice() {
            [] => (self.core.destination, self.core.arrival_pos, false),
            [only] => {
                let backwards = self.core.arrival_pos < self.depart_pos;
                let pos = if backwards { self.depart_pos - left } else { self.depart_pos + left };
                (*only, pos, backwards)
            }
            [first, ..] => {
                let first_len = net.edge(*first).length;
                let start = self.depart_pos.clamp(0.0, first_len);
                let head = first_len - start;
                if left <= head {
                    return (*first, start + left, false);
                }
                left -= head;
                let last_idx = self.route.len() - 1;
                for (i, &e) in self.route.iter().enumerate().skip(1) {
                    let len = net.edge(e).length;
                    if left <= len || i == last_idx {
                        return (e, left.min(len), false);
                    }
                    left -= len;
                }
                (self.core.destination, self.core.arrival_pos, false)
            }
        }
    }

    pub(crate) fn edge_at(&self, now: Tick, ctx: &StageContext<'_>) -> EdgeId {
        self.locate(now, ctx).0
    }

    pub(crate) fn edge_pos_at(&self, now: Tick, ctx: &StageContext<'_>) -> f64 {
        self.locate(now, ctx).1
    }

    pub(crate) fn position(&self, now: Tick, ctx: &StageContext<'_>) -> Position {
        let (edge, pos, _) = self.locate(now, ctx);
        edge_position(ctx.network, edge, pos, roadside_offset(ctx.network) + self.depart_pos_lat)
    }

    pub(crate) fn angle(&self, now: Tick, ctx: &StageContext<'_>) -> f64 {
        let (edge, pos, backwards) = self.locate(now, ctx);
        let angle = edge_angle(ctx.network, edge, pos);
        if backwards { angle + std::f64::consts::PI } else { angle }
    }

    fn verb(&self) -> &'static str {
        match self.core.stage_type() {
            StageType::Tranship => "tranship",
            _ => "walking",
        }
    }

    fn element(&self) -> &'static str {
        match self.core.stage_type() {
            StageType::Tranship => "tranship",
            _ => "walk",
        }
    }

    pub(crate) fn description(&self, _kind: TransportableKind) -> String {
        self.verb().to_owned()
    }

    pub(crate) fn summary(&self, network: &Network, _kind: TransportableKind) -> String {
        let names: Vec<&str> = self.route.iter().map(|&e| network.edge(e).name.as_str()).collect();
        let mut out = format!("{} edges '{}'", self.verb(), names.join(" "));
        if let Some(stop) = self.core.destination_stop {
            out.push_str(&format!(" to stop '{}'", network.stop(stop).name));
        }
        out
    }

    pub(crate) fn trip_info_output(&self, sink: &mut dyn ReportSink, agent: &AgentRef<'_>, ctx: &StageContext<'_>) {
        let from = ctx.network.edge(self.route.first().copied().unwrap_or(self.core.destination)).name.clone();
        let mut rec = TripInfoRecord::for_stage(self.element(), agent, &self.core, &from, ctx.network);
        rec.route_length = self.length;
        sink.trip_info(rec);
    }

    pub(crate) fn route_output(
        &self,
        sink: &mut dyn ReportSink,
        agent: &AgentRef<'_>,
        with_route_length: bool,
        ctx: &StageContext<'_>,
    ) {
        let mut rec = RouteRecord::for_stage(self.element(), agent, &self.core, ctx.network);
        rec.edges = self.route.iter().map(|&e| ctx.network.edge(e).name.clone()).collect();
        rec.duration = self.duration;
        if with_route_length {
            rec.route_length = Some(self.length);
        }
        sink.route(rec);
    }
}

impl From<MovingStage> for Stage {
    fn from(stage: MovingStage) -> Self {
        Stage::Moving(stage)
    }
}
