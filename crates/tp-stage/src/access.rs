//! Straight-line transfers between the road and a stop.

use tp_core::time::ticks_for_secs;
use tp_core::{EdgeId, Position, StopId, Tick, TransportableKind};
use tp_network::Network;

use crate::output::{ReportSink, RouteRecord, TripInfoRecord};
use crate::{AgentRef, Stage, StageContext, StageCore, StageType, Transition};

/// Move from `from` to `to` in a straight line at constant speed.
///
/// Used when a stop is close by but not reachable over walkable edges.
#[derive(Clone, Debug)]
pub struct AccessStage {
    pub(crate) core: StageCore,
    /// The edge the transfer starts from.
    pub origin:      EdgeId,
    pub from:        Position,
    pub to:          Position,
    pub speed:       f64,
    pub(crate) length:     f64,
    pub(crate) completion: Option<Tick>,
}

impl AccessStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        origin: EdgeId,
        from: Position,
        destination: EdgeId,
        destination_stop: Option<StopId>,
        arrival_pos: f64,
        to: Position,
        speed: f64,
    ) -> Self {
        Self {
            core: StageCore::new(StageType::Access, destination, destination_stop, arrival_pos),
            origin,
            from,
            to,
            speed: speed.max(0.01),
            length: from.distance(to),
            completion: None,
        }
    }

    pub fn travel_ticks(&self, tick_duration_secs: u32) -> u64 {
        ticks_for_secs(self.length / self.speed, tick_duration_secs).max(1)
    }

    pub(crate) fn proceed(&mut self, ctx: &StageContext<'_>, now: Tick) -> Transition {
        self.core.set_departed(now);
        let end = now + self.travel_ticks(ctx.tick_duration_secs);
        self.completion = Some(end);
        Transition::CompleteAt(end)
    }

    pub(crate) fn position(&self, now: Tick, ctx: &StageContext<'_>) -> Position {
        match (self.core.departed(), self.core.arrived()) {
            (None, _) => self.from,
            (_, Some(_)) => self.to,
            (Some(departed), None) => {
                let total = self.travel_ticks(ctx.tick_duration_secs) as f64;
                let t = (now.saturating_since(departed) as f64 / total).min(1.0);
                self.from.lerp(self.to, t)
            }
        }
    }

    pub(crate) fn angle(&self, _now: Tick, _ctx: &StageContext<'_>) -> f64 {
        self.from.angle_to(self.to)
    }

    pub(crate) fn description(&self, _kind: TransportableKind) -> String {
        "access".to_owned()
    }

    pub(crate) fn summary(&self, network: &Network, _kind: TransportableKind) -> String {
        let target = match self.core.destination_stop {
            Some(stop) => format!("stop '{}'", network.stop(stop).name),
            None => format!("edge '{}'", network.edge(self.core.destination).name),
        };
        format!("access from edge '{}' to {target}", network.edge(self.origin).name)
    }

    pub(crate) fn trip_info_output(&self, sink: &mut dyn ReportSink, agent: &AgentRef<'_>, ctx: &StageContext<'_>) {
        let from = ctx.network.edge(self.origin).name.clone();
        let mut rec = TripInfoRecord::for_stage("access", agent, &self.core, &from, ctx.network);
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
        let mut rec = RouteRecord::for_stage("access", agent, &self.core, ctx.network);
        rec.edges = vec![
            ctx.network.edge(self.origin).name.clone(),
            ctx.network.edge(self.core.destination).name.clone(),
        ];
        if with_route_length {
            rec.route_length = Some(self.length);
        }
        sink.route(rec);
    }
}

impl From<AccessStage> for Stage {
    fn from(stage: AccessStage) -> Self {
        Stage::Access(stage)
    }
}
