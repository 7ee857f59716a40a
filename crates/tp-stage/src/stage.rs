//! The stage contract and its dispatch over the closed set of variants.
//!
//! # Lifecycle
//!
//! ```text
//!   constructed ──proceed(now, previous)──▶ active ──set_arrived(now)──▶ done
//!                  sets departed = now                 sets arrived = now
//! ```
//!
//! `proceed` is called exactly once, when the stage becomes current, and
//! returns a [`Transition`] telling the owner how the stage will end:
//!
//! | Transition         | Owner's job                                          |
//! |--------------------|------------------------------------------------------|
//! | `CompleteAt(t)`    | wake the agent at `t`, then call `set_arrived`       |
//! | `AwaitVehicle{..}` | register the agent as waiting; board on a match      |
//! | `Expand(res)`      | splice `res.stages` in after this stage and go on    |
//!
//! Time queries (`position`, `angle`, `edge_pos`) fail with
//! [`StageError::BeforeDeparture`] when `now` precedes the departure.  A stage
//! that has not departed yet answers them from its planned destination.

use std::fmt;

use tp_core::{AgentId, AgentRng, EdgeId, Position, StopId, Tick, TransportableKind, VehicleId};
use tp_network::{Network, TransitSchedule};

use crate::access::AccessStage;
use crate::driving::DrivingStage;
use crate::moving::MovingStage;
use crate::output::ReportSink;
use crate::router::{IntermodalRouter, Resolution};
use crate::trip::TripStage;
use crate::vehicle::{TransportVehicle, VehicleLookup};
use crate::waiting::WaitingStage;
use crate::{StageError, StageResult};

// ── StageType ─────────────────────────────────────────────────────────────────

/// The closed tag set of stage kinds.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageType {
    /// The wait before an itinerary's first real stage.
    WaitingForDepart,
    Waiting,
    Walking,
    Driving,
    Access,
    Trip,
    Tranship,
}

impl StageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StageType::WaitingForDepart => "waiting_for_depart",
            StageType::Waiting          => "waiting",
            StageType::Walking          => "walking",
            StageType::Driving          => "driving",
            StageType::Access           => "access",
            StageType::Trip             => "trip",
            StageType::Tranship         => "tranship",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── StageCore ─────────────────────────────────────────────────────────────────

/// State shared by every stage variant.
#[derive(Clone, Debug, PartialEq)]
pub struct StageCore {
    pub destination:      EdgeId,
    pub destination_stop: Option<StopId>,
    /// Desired offset on the destination edge at which the stage ends.
    pub arrival_pos:      f64,
    departed:             Option<Tick>,
    arrived:              Option<Tick>,
    stage_type:           StageType,
}

impl StageCore {
    pub fn new(stage_type: StageType, destination: EdgeId, destination_stop: Option<StopId>, arrival_pos: f64) -> Self {
        Self {
            destination,
            destination_stop,
            arrival_pos,
            departed: None,
            arrived: None,
            stage_type,
        }
    }

    #[inline]
    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    #[inline]
    pub fn departed(&self) -> Option<Tick> {
        self.departed
    }

    #[inline]
    pub fn arrived(&self) -> Option<Tick> {
        self.arrived
    }

    /// Departed and not yet arrived.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.departed.is_some() && self.arrived.is_none()
    }

    /// Record the departure.  Only the first call has an effect.
    pub(crate) fn set_departed(&mut self, now: Tick) {
        if self.departed.is_none() {
            self.departed = Some(now);
        }
    }

    /// Record the arrival.  Fails if already arrived, not yet departed, or
    /// if `now` precedes the departure.
    pub(crate) fn mark_arrived(&mut self, now: Tick) -> StageResult<()> {
        if let Some(arrived) = self.arrived {
            return Err(StageError::DoubleArrival { arrived, now });
        }
        let Some(departed) = self.departed else {
            return Err(StageError::Precondition(format!(
                "{} stage arrived at {now} without having departed",
                self.stage_type
            )));
        };
        if now < departed {
            return Err(StageError::BeforeDeparture { now, departed });
        }
        self.arrived = Some(now);
        Ok(())
    }

    /// Reject queries for a time before the departure.
    #[inline]
    pub(crate) fn check_time(&self, now: Tick) -> StageResult<()> {
        match self.departed {
            Some(departed) if now < departed => Err(StageError::BeforeDeparture { now, departed }),
            _ => Ok(()),
        }
    }

    /// Ticks since departure while active, else 0.
    pub(crate) fn active_for(&self, now: Tick) -> u64 {
        match (self.departed, self.arrived) {
            (Some(departed), None) => now.saturating_since(departed),
            _ => 0,
        }
    }

    /// Test hook: overwrite the timestamps directly.
    #[cfg(test)]
    pub(crate) fn set_times(&mut self, departed: Option<Tick>, arrived: Option<Tick>) {
        self.departed = departed;
        self.arrived = arrived;
    }
}

// ── Context types ─────────────────────────────────────────────────────────────

/// Read-only collaborators every stage operation may consult.
///
/// Built by the owner whenever it drives stages; all borrows are shared, so
/// the owner may hold several contexts at once.
pub struct StageContext<'a> {
    pub network:            &'a Network,
    pub schedule:           &'a TransitSchedule,
    pub vehicles:           &'a dyn VehicleLookup,
    pub router:             &'a dyn IntermodalRouter,
    /// How many seconds one tick represents.
    pub tick_duration_secs: u32,
}

/// Identity of the transportable a stage belongs to.
#[derive(Copy, Clone, Debug)]
pub struct AgentRef<'a> {
    pub id:   AgentId,
    pub name: &'a str,
    pub kind: TransportableKind,
}

/// The transportable executing `proceed`, with its deterministic RNG.
pub struct Traveller<'a> {
    pub agent: AgentRef<'a>,
    pub rng:   &'a mut AgentRng,
}

// ── Transition ────────────────────────────────────────────────────────────────

/// How an activated stage will end.
#[derive(Debug)]
pub enum Transition {
    /// The stage completes by itself at the given tick.
    CompleteAt(Tick),
    /// The stage waits on `edge` (at `stop`, if any) for a matching vehicle.
    AwaitVehicle { edge: EdgeId, stop: Option<StopId> },
    /// The stage resolved into the given concrete stages.
    Expand(Resolution),
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// One leg of an itinerary.
///
/// Stages are cloned only through `Clone`, which deep-copies all timing and
/// vehicle state; a clone never shares mutable state with its original.
#[derive(Clone, Debug)]
pub enum Stage {
    Waiting(WaitingStage),
    Trip(TripStage),
    Driving(DrivingStage),
    /// Walking (persons) or tranship (containers).
    Moving(MovingStage),
    Access(AccessStage),
}

/// Forward a call to whichever variant `$self` holds.
macro_rules! each_variant {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Stage::Waiting($s) => $body,
            Stage::Trip($s)    => $body,
            Stage::Driving($s) => $body,
            Stage::Moving($s)  => $body,
            Stage::Access($s)  => $body,
        }
    };
}

impl Stage {
    // ── Shared state ──────────────────────────────────────────────────────

    pub fn core(&self) -> &StageCore {
        each_variant!(self, s => &s.core)
    }

    pub fn core_mut(&mut self) -> &mut StageCore {
        each_variant!(self, s => &mut s.core)
    }

    #[inline]
    pub fn stage_type(&self) -> StageType {
        self.core().stage_type()
    }

    #[inline]
    pub fn destination(&self) -> EdgeId {
        self.core().destination
    }

    #[inline]
    pub fn destination_stop(&self) -> Option<StopId> {
        self.core().destination_stop
    }

    #[inline]
    pub fn arrival_pos(&self) -> f64 {
        self.core().arrival_pos
    }

    #[inline]
    pub fn departed(&self) -> Option<Tick> {
        self.core().departed()
    }

    #[inline]
    pub fn arrived(&self) -> Option<Tick> {
        self.core().arrived()
    }

    /// Redirect the stage, e.g. after a parking or stop reassignment.
    pub fn set_destination(&mut self, edge: EdgeId, stop: Option<StopId>) {
        let core = self.core_mut();
        core.destination = edge;
        core.destination_stop = stop;
    }

    /// The trip's origin stop; `None` for every other variant.
    pub fn origin_stop(&self) -> Option<StopId> {
        match self {
            Stage::Trip(t) => t.origin_stop,
            _ => None,
        }
    }

    // ── Position queries ──────────────────────────────────────────────────

    /// The edge the transportable is on at `now`.
    pub fn edge(&self, now: Tick, ctx: &StageContext<'_>) -> EdgeId {
        match self {
            Stage::Trip(t)    => t.origin,
            Stage::Driving(d) => d.edge(ctx),
            Stage::Moving(m)  => m.edge_at(now, ctx),
            Stage::Waiting(_) | Stage::Access(_) => self.destination(),
        }
    }

    /// The edge the stage starts from.
    pub fn from_edge(&self) -> EdgeId {
        match self {
            Stage::Trip(t)    => t.origin,
            Stage::Driving(d) => d.from_edge(),
            Stage::Moving(m)  => m.route.first().copied().unwrap_or(m.core.destination),
            Stage::Access(a)  => a.origin,
            Stage::Waiting(w) => w.core.destination,
        }
    }

    /// Offset along [`edge`](Self::edge) at `now`.
    pub fn edge_pos(&self, now: Tick, ctx: &StageContext<'_>) -> StageResult<f64> {
        self.core().check_time(now)?;
        Ok(match self {
            Stage::Trip(t)    => t.resolved_depart_pos,
            Stage::Driving(d) => d.edge_pos(ctx),
            Stage::Moving(m)  => m.edge_pos_at(now, ctx),
            Stage::Waiting(_) | Stage::Access(_) => self.arrival_pos(),
        })
    }

    pub fn position(&self, now: Tick, ctx: &StageContext<'_>) -> StageResult<Position> {
        self.core().check_time(now)?;
        Ok(each_variant!(self, s => s.position(now, ctx)))
    }

    /// Heading in radians, counter-clockwise from the +x axis.
    pub fn angle(&self, now: Tick, ctx: &StageContext<'_>) -> StageResult<f64> {
        self.core().check_time(now)?;
        Ok(each_variant!(self, s => s.angle(now, ctx)))
    }

    // ── Descriptions ──────────────────────────────────────────────────────

    /// Brief label, e.g. `"waiting (work)"` or `"driving"`.
    pub fn description(&self, kind: TransportableKind) -> String {
        each_variant!(self, s => s.description(kind))
    }

    /// One sentence naming the edges and stops involved.
    pub fn summary(&self, network: &Network, kind: TransportableKind) -> String {
        each_variant!(self, s => s.summary(network, kind))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Activate the stage.  See the module docs for the returned
    /// [`Transition`].
    pub fn proceed(
        &mut self,
        ctx: &StageContext<'_>,
        traveller: &mut Traveller<'_>,
        now: Tick,
        previous: Option<&Stage>,
    ) -> StageResult<Transition> {
        match self {
            Stage::Waiting(w) => Ok(w.proceed(now)),
            Stage::Trip(t)    => t.proceed(ctx, traveller, now, previous),
            Stage::Driving(d) => d.proceed(ctx, now, previous),
            Stage::Moving(m)  => Ok(m.proceed(ctx, now, previous)),
            Stage::Access(a)  => Ok(a.proceed(ctx, now)),
        }
    }

    /// Close the stage.  Returns an empty string on a clean arrival and a
    /// diagnostic otherwise.
    pub fn set_arrived(&mut self, ctx: &StageContext<'_>, now: Tick) -> StageResult<String> {
        match self {
            Stage::Driving(d) => d.set_arrived(ctx, now),
            other => other.core_mut().mark_arrived(now).map(|_| String::new()),
        }
    }

    /// Best-effort cancellation.  Rides and waits release their pending
    /// registration; other stages ignore it.
    pub fn abort(&mut self) {
        match self {
            Stage::Driving(d) => d.abort(),
            Stage::Waiting(w) => w.abort(),
            _ => {}
        }
    }

    /// Change the walking speed.  Ignored by every other stage kind.
    pub fn set_speed(&mut self, speed: f64) {
        if let Stage::Moving(m) = self {
            m.set_speed(speed);
        }
    }

    /// The tick at which a self-completing stage is due, while it is active.
    pub fn scheduled_completion(&self) -> Option<Tick> {
        if !self.core().is_active() {
            return None;
        }
        match self {
            Stage::Waiting(w) => w.completion,
            Stage::Moving(m)  => m.completion,
            Stage::Access(a)  => a.completion,
            Stage::Trip(_) | Stage::Driving(_) => None,
        }
    }

    // ── Vehicle interaction ───────────────────────────────────────────────

    /// Whether this stage would board `vehicle` now.
    pub fn is_waiting_for(&self, vehicle: &dyn TransportVehicle) -> bool {
        match self {
            Stage::Driving(d) => d.is_waiting_for(vehicle),
            _ => false,
        }
    }

    pub fn is_waiting_for_vehicle(&self) -> bool {
        match self {
            Stage::Driving(d) => d.is_waiting_for_vehicle(),
            _ => false,
        }
    }

    /// The vehicle currently carrying the transportable.
    pub fn vehicle(&self) -> Option<VehicleId> {
        match self {
            Stage::Driving(d) => d.vehicle(),
            _ => None,
        }
    }

    pub fn as_driving(&self) -> Option<&DrivingStage> {
        match self {
            Stage::Driving(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_driving_mut(&mut self) -> Option<&mut DrivingStage> {
        match self {
            Stage::Driving(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_trip_mut(&mut self) -> Option<&mut TripStage> {
        match self {
            Stage::Trip(t) => Some(t),
            _ => None,
        }
    }

    // ── Reporting accessors ───────────────────────────────────────────────

    /// Ticks spent waiting at `now`.
    pub fn waiting_time(&self, now: Tick) -> u64 {
        match self {
            Stage::Waiting(w) => w.core.active_for(now),
            Stage::Driving(d) => d.waiting_time(now),
            _ => 0,
        }
    }

    /// Current speed in m/s.
    pub fn speed(&self, ctx: &StageContext<'_>) -> f64 {
        match self {
            Stage::Driving(d) => d.speed(ctx),
            Stage::Moving(m)  => m.speed,
            Stage::Access(a)  => a.speed,
            Stage::Waiting(_) | Stage::Trip(_) => 0.0,
        }
    }

    /// The edges this stage covers.
    pub fn edges(&self) -> Vec<EdgeId> {
        match self {
            Stage::Driving(d) => vec![d.from_edge(), d.core.destination],
            Stage::Moving(m)  => m.route.clone(),
            Stage::Trip(t)    => vec![t.origin, t.core.destination],
            _ => vec![self.destination()],
        }
    }

    /// Distance travelled in metres.  `-1.0` means "not determined".
    pub fn distance(&self) -> f64 {
        match self {
            Stage::Waiting(_) => 0.0,
            Stage::Trip(_)    => -1.0,
            Stage::Driving(d) => d.distance(),
            Stage::Moving(m)  => m.length,
            Stage::Access(a)  => a.length,
        }
    }

    // ── Report streams ────────────────────────────────────────────────────

    /// Append this stage's trip-info record to `sink`.  Read-only.
    pub fn trip_info_output(&self, sink: &mut dyn ReportSink, agent: &AgentRef<'_>, ctx: &StageContext<'_>) {
        each_variant!(self, s => s.trip_info_output(sink, agent, ctx))
    }

    /// Append this stage's plan record to `sink`.  Read-only.
    pub fn route_output(
        &self,
        sink: &mut dyn ReportSink,
        agent: &AgentRef<'_>,
        with_route_length: bool,
        ctx: &StageContext<'_>,
    ) {
        each_variant!(self, s => s.route_output(sink, agent, with_route_length, ctx))
    }
}
