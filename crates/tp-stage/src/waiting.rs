//! Timed waits: activities, stops, and the wait before departure.

use tp_core::{EdgeId, Position, StopId, Tick, TransportableKind};
use tp_network::Network;

use crate::geometry::{roadside_angle, roadside_position, stop_wait_position};
use crate::output::{ReportSink, RouteRecord, TripInfoRecord};
use crate::{AgentRef, Stage, StageContext, StageCore, StageType, Transition};

/// Elapse `duration` ticks, or wait until `until`, whichever ends later.
///
/// The transportable stands beside its destination edge (or at its stop)
/// for the whole stage; the position never changes.
#[derive(Clone, Debug)]
pub struct WaitingStage {
    pub(crate) core: StageCore,
    /// Relative bound in ticks.
    pub duration:    u64,
    /// Absolute bound.
    pub until:       Option<Tick>,
    /// Free-text activity label, used only for reporting.
    pub act_type:    String,
    pub(crate) completion: Option<Tick>,
}

impl WaitingStage {
    pub fn new(destination: EdgeId, arrival_pos: f64, duration: u64, until: Option<Tick>, act_type: &str) -> Self {
        Self {
            core: StageCore::new(StageType::Waiting, destination, None, arrival_pos),
            duration,
            until,
            act_type: act_type.to_owned(),
            completion: None,
        }
    }

    /// The wait that opens an itinerary, ending at the planned departure.
    pub fn initial(destination: EdgeId, arrival_pos: f64, depart: Tick) -> Self {
        let mut stage = Self::new(destination, arrival_pos, 0, Some(depart), "awaiting departure");
        stage.core = StageCore::new(StageType::WaitingForDepart, destination, None, arrival_pos);
        stage
    }

    /// Wait at a stop rather than at an edge offset.
    pub fn at_stop(mut self, stop: StopId, network: &Network) -> Self {
        let place = network.stop(stop);
        self.core.destination = place.edge;
        self.core.destination_stop = Some(stop);
        self.core.arrival_pos = place.access_pos();
        self
    }

    /// The tick at which the active wait ends.
    pub fn completion(&self) -> Option<Tick> {
        self.completion
    }

    pub(crate) fn proceed(&mut self, now: Tick) -> Transition {
        self.core.set_departed(now);
        let end = (now + self.duration).max(self.until.unwrap_or(now));
        self.completion = Some(end);
        Transition::CompleteAt(end)
    }

    pub(crate) fn abort(&mut self) {
        self.completion = None;
    }

    pub(crate) fn position(&self, _now: Tick, ctx: &StageContext<'_>) -> Position {
        match self.core.destination_stop {
            Some(stop) => stop_wait_position(ctx.network, stop),
            None => roadside_position(ctx.network, self.core.destination, self.core.arrival_pos),
        }
    }

    pub(crate) fn angle(&self, _now: Tick, ctx: &StageContext<'_>) -> f64 {
        roadside_angle(ctx.network, self.core.destination, self.core.arrival_pos)
    }

    pub(crate) fn description(&self, _kind: TransportableKind) -> String {
        format!("waiting ({})", self.act_type)
    }

    pub(crate) fn summary(&self, network: &Network, _kind: TransportableKind) -> String {
        let place = match self.core.destination_stop {
            Some(stop) => format!("stop '{}'", network.stop(stop).name),
            None => format!("edge '{}'", network.edge(self.core.destination).name),
        };
        let mut out = format!("waiting at {place}");
        if self.duration > 0 {
            out.push_str(&format!(" duration={}", self.duration));
        }
        if let Some(until) = self.until {
            out.push_str(&format!(" until={}", until.0));
        }
        if !self.act_type.is_empty() {
            out.push_str(&format!(" ({})", self.act_type));
        }
        out
    }

    pub(crate) fn trip_info_output(&self, sink: &mut dyn ReportSink, agent: &AgentRef<'_>, ctx: &StageContext<'_>) {
        // The pre-departure wait is not part of the journey.
        if self.core.stage_type() == StageType::WaitingForDepart {
            return;
        }
        let from = ctx.network.edge(self.core.destination).name.clone();
        let mut rec = TripInfoRecord::for_stage("stop", agent, &self.core, &from, ctx.network);
        rec.route_length = 0.0;
        rec.act_type = self.act_type.clone();
        sink.trip_info(rec);
    }

    pub(crate) fn route_output(
        &self,
        sink: &mut dyn ReportSink,
        agent: &AgentRef<'_>,
        _with_route_length: bool,
        ctx: &StageContext<'_>,
    ) {
        if self.core.stage_type() == StageType::WaitingForDepart {
            return;
        }
        let mut rec = RouteRecord::for_stage("stop", agent, &self.core, ctx.network);
        rec.duration = (self.duration > 0).then_some(self.duration);
        rec.until = self.until;
        rec.act_type = self.act_type.clone();
        sink.route(rec);
    }
}

impl From<WaitingStage> for Stage {
    fn from(stage: WaitingStage) -> Self {
        Stage::Waiting(stage)
    }
}
