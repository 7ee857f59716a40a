//! Trip resolution: turning a [`TripRequest`] into concrete stages.
//!
//! # Pluggability
//!
//! Trip stages call the router through the [`IntermodalRouter`] trait, so a
//! driver can substitute its own planner.  [`ScheduleRouter`] is the default:
//! it compares a walk-only plan, direct public-transport connections and a
//! private-car plan, and keeps the cheapest.
//!
//! # Cost model
//!
//! Candidates are compared by estimated seconds from departure to arrival.
//! Walking seconds are additionally weighted by `walk_factor - 1`, so a
//! factor above one penalises plans with long walks.  Ties keep the
//! candidate evaluated first (walk, then public transport, then car).

use std::collections::BTreeSet;

use tracing::debug;

use tp_core::time::ticks_for_secs;
use tp_core::{AgentId, EdgeId, ModeSet, StopId, Tick, TransportableKind, VehicleClass};
use tp_network::{DijkstraRouter, EdgeRouter, Network, TransitSchedule};

use crate::geometry::{roadside_position, stop_wait_position};
use crate::{AccessStage, DrivingStage, MovingStage, Stage, UnroutableTrip, DEFAULT_WALK_SPEED};

// ── Request / result ──────────────────────────────────────────────────────────

/// Everything a trip stage passes to the router.
#[derive(Clone, Debug)]
pub struct TripRequest {
    pub agent:            AgentId,
    pub agent_name:       String,
    pub kind:             TransportableKind,
    pub origin:           EdgeId,
    pub origin_stop:      Option<StopId>,
    pub destination:      EdgeId,
    pub destination_stop: Option<StopId>,
    pub depart:           Tick,
    pub depart_pos:       f64,
    pub depart_pos_lat:   f64,
    pub arrival_pos:      f64,
    pub has_arrival_pos:  bool,
    /// Empty means walking only.
    pub modes:            ModeSet,
    pub vehicle_types:    Vec<String>,
    pub speed:            Option<f64>,
    pub duration:         Option<u64>,
    pub walk_factor:      f64,
}

/// A vehicle the driver must insert for a resolved plan to work.
#[derive(Clone, Debug, PartialEq)]
pub struct PrivateVehicle {
    pub name:         String,
    pub vehicle_type: String,
    pub class:        VehicleClass,
    pub route:        Vec<EdgeId>,
    pub depart_pos:   f64,
    pub arrival_pos:  f64,
    /// Cruising speed in m/s.
    pub speed:        f64,
    pub depart:       Tick,
}

/// The outcome of a successful resolution.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Concrete stages, in travel order.
    pub stages:   Vec<Stage>,
    pub vehicles: Vec<PrivateVehicle>,
}

/// Pluggable intermodal planner.
pub trait IntermodalRouter: Send + Sync {
    fn resolve(
        &self,
        network: &Network,
        schedule: &TransitSchedule,
        tick_duration_secs: u32,
        request: &TripRequest,
    ) -> Result<Resolution, UnroutableTrip>;
}

// ── RouterConfig ──────────────────────────────────────────────────────────────

/// Tunables of [`ScheduleRouter`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouterConfig {
    /// Walking speed in m/s when the trip gives none.
    pub walk_speed:       f64,
    /// Stops farther than this (metres, straight line) are not considered for
    /// boarding or alighting.
    pub access_radius:    f64,
    /// Vehicle type of private cars when the trip gives none.
    pub default_car_type: String,
    /// Cruising speed of private cars in m/s.
    pub car_speed:        f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            walk_speed:       DEFAULT_WALK_SPEED,
            access_radius:    400.0,
            default_car_type: "passenger".to_owned(),
            car_speed:        13.89,
        }
    }
}

// ── ScheduleRouter ────────────────────────────────────────────────────────────

/// Default planner over the road network and the transit schedule.
pub struct ScheduleRouter<E: EdgeRouter = DijkstraRouter> {
    edge_router: E,
    config:      RouterConfig,
}

impl ScheduleRouter<DijkstraRouter> {
    pub fn new(config: RouterConfig) -> Self {
        Self { edge_router: DijkstraRouter, config }
    }
}

impl<E: EdgeRouter> ScheduleRouter<E> {
    pub fn with_edge_router(edge_router: E, config: RouterConfig) -> Self {
        Self { edge_router, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// One end of a foot leg.
#[derive(Copy, Clone)]
struct Place {
    edge: EdgeId,
    pos:  f64,
    stop: Option<StopId>,
}

/// A walk, tranship or access stage with its timing.
struct FootLeg {
    stage:     Stage,
    ticks:     u64,
    walk_secs: f64,
}

struct Candidate {
    label:      &'static str,
    cost:       f64,
    resolution: Resolution,
}

impl<E: EdgeRouter> ScheduleRouter<E> {
    fn walk_speed(&self, req: &TripRequest) -> f64 {
        req.speed.unwrap_or(self.config.walk_speed)
    }

    /// Walk (or tranship) between two places, falling back to a straight
    /// access move when no walkable path exists but the places are close.
    fn foot_leg(&self, net: &Network, tick_secs: u32, req: &TripRequest, from: Place, to: Place) -> Option<FootLeg> {
        let speed = self.walk_speed(req);
        let walk = self
            .edge_router
            .route(net, from.edge, to.edge, ModeSet::WALK, speed)
            .ok()
            .and_then(|path| MovingStage::on_foot(req.kind, net, path.edges, from.pos, to.pos, to.stop, speed).ok());
        if let Some(stage) = walk {
            let walk_secs = stage.length / speed;
            let ticks = stage.travel_ticks(tick_secs);
            return Some(FootLeg { stage: stage.into(), ticks, walk_secs });
        }

        let start = roadside_position(net, from.edge, from.pos);
        let end = match to.stop {
            Some(stop) => stop_wait_position(net, stop),
            None => roadside_position(net, to.edge, to.pos),
        };
        if start.distance(end) > self.config.access_radius {
            return None;
        }
        let stage = AccessStage::new(from.edge, start, to.edge, to.stop, to.pos, end, speed);
        let walk_secs = stage.length / speed;
        let ticks = stage.travel_ticks(tick_secs);
        Some(FootLeg { stage: stage.into(), ticks, walk_secs })
    }

    fn origin(req: &TripRequest) -> Place {
        Place { edge: req.origin, pos: req.depart_pos, stop: None }
    }

    fn target(req: &TripRequest) -> Place {
        Place { edge: req.destination, pos: req.arrival_pos, stop: req.destination_stop }
    }

    fn plan_walk(&self, net: &Network, tick_secs: u32, req: &TripRequest) -> Option<Candidate> {
        let leg = self.foot_leg(net, tick_secs, req, Self::origin(req), Self::target(req))?;
        let mut stage = leg.stage;
        let mut secs = leg.walk_secs * req.walk_factor;
        if let Stage::Moving(m) = &mut stage {
            m.depart_pos_lat = req.depart_pos_lat;
            if let Some(ticks) = req.duration {
                m.duration = Some(ticks);
                secs = (ticks * u64::from(tick_secs)) as f64;
            }
        }
        Some(Candidate {
            label: "walk",
            cost: secs,
            resolution: Resolution { stages: vec![stage], vehicles: Vec::new() },
        })
    }

    fn line_allowed(req: &TripRequest, class: VehicleClass) -> bool {
        req.vehicle_types.is_empty() || req.vehicle_types.iter().any(|t| class.as_str().starts_with(t.as_str()))
    }

    fn plan_public(&self, net: &Network, schedule: &TransitSchedule, tick_secs: u32, req: &TripRequest) -> Option<Candidate> {
        let radius = self.config.access_radius;
        let mut boards = net.stops_near(roadside_position(net, req.origin, req.depart_pos), radius);
        if let Some(stop) = req.origin_stop {
            if !boards.contains(&stop) {
                boards.insert(0, stop);
            }
        }
        let alights = match req.destination_stop {
            Some(stop) => vec![stop],
            None => net.stops_near(roadside_position(net, req.destination, req.arrival_pos), radius),
        };

        let mut best: Option<Candidate> = None;
        for &board in &boards {
            let board_place = {
                let s = net.stop(board);
                Place { edge: s.edge, pos: s.access_pos(), stop: Some(board) }
            };
            let Some(access) = self.foot_leg(net, tick_secs, req, Self::origin(req), board_place) else {
                continue;
            };
            let at_stop = req.depart + access.ticks;

            for &alight in &alights {
                if alight == board {
                    continue;
                }
                let alight_stop = net.stop(alight);
                let egress = if req.destination_stop == Some(alight) {
                    None
                } else {
                    let from = Place { edge: alight_stop.edge, pos: alight_stop.access_pos(), stop: None };
                    match self.foot_leg(net, tick_secs, req, from, Self::target(req)) {
                        Some(leg) => Some(leg),
                        None => continue,
                    }
                };

                for (li, bi, ai) in schedule.direct_connections(board, alight) {
                    let line = schedule.line(li);
                    if !Self::line_allowed(req, line.class) {
                        continue;
                    }
                    let Some((k, board_tick)) = schedule.next_departure(li, bi, at_stop) else { continue };
                    let alight_tick = line.departures[k] + schedule.timing(li).arrivals[ai];
                    let egress_ticks = egress.as_ref().map_or(0, |l| l.ticks);
                    let egress_secs = egress.as_ref().map_or(0.0, |l| l.walk_secs);
                    let total_ticks = alight_tick.saturating_since(req.depart) + egress_ticks;
                    let cost = (total_ticks * u64::from(tick_secs)) as f64
                        + (req.walk_factor - 1.0) * (access.walk_secs + egress_secs);
                    if best.as_ref().is_some_and(|b| b.cost <= cost) {
                        continue;
                    }

                    let ride = DrivingStage::new(alight_stop.edge, Some(alight), alight_stop.access_pos(), [line.name.clone()])
                        .with_intended(line.trip_id(k), board_tick);
                    let mut stages = vec![access.stage.clone(), ride.into()];
                    if let Some(leg) = &egress {
                        stages.push(leg.stage.clone());
                    }
                    best = Some(Candidate {
                        label: "public",
                        cost,
                        resolution: Resolution { stages, vehicles: Vec::new() },
                    });
                }
            }
        }
        best
    }

    fn plan_car(&self, net: &Network, tick_secs: u32, req: &TripRequest) -> Option<Candidate> {
        let speed = self.config.car_speed;
        let path = self.edge_router.route(net, req.origin, req.destination, ModeSet::CAR, speed).ok()?;
        let name = format!("{}_car", req.agent_name);
        let vehicle_type = req
            .vehicle_types
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_car_type.clone());
        let class = vehicle_type.parse().unwrap_or(VehicleClass::Passenger);
        let length = path.trimmed_length(net, req.depart_pos, req.arrival_pos);
        let ticks = ticks_for_secs(length / speed, tick_secs).max(1);

        let ride = DrivingStage::new(req.destination, req.destination_stop, req.arrival_pos, [name.clone()]);
        let vehicle = PrivateVehicle {
            name,
            vehicle_type,
            class,
            route: path.edges,
            depart_pos: req.depart_pos,
            arrival_pos: req.arrival_pos,
            speed,
            depart: req.depart,
        };
        Some(Candidate {
            label: "car",
            cost: ((ticks + 1) * u64::from(tick_secs)) as f64,
            resolution: Resolution { stages: vec![ride.into()], vehicles: vec![vehicle] },
        })
    }
}

impl<E: EdgeRouter> IntermodalRouter for ScheduleRouter<E> {
    fn resolve(
        &self,
        network: &Network,
        schedule: &TransitSchedule,
        tick_duration_secs: u32,
        request: &TripRequest,
    ) -> Result<Resolution, UnroutableTrip> {
        let modes = if request.modes.is_empty() { ModeSet::WALK } else { request.modes };

        let mut candidates = Vec::new();
        if modes.contains(ModeSet::WALK) {
            candidates.extend(self.plan_walk(network, tick_duration_secs, request));
        }
        if modes.contains(ModeSet::PUBLIC) {
            candidates.extend(self.plan_public(network, schedule, tick_duration_secs, request));
        }
        if modes.contains(ModeSet::CAR) && request.kind == TransportableKind::Person {
            candidates.extend(self.plan_car(network, tick_duration_secs, request));
        }

        let mut best: Option<Candidate> = None;
        for c in candidates {
            if best.as_ref().is_none_or(|b| c.cost < b.cost) {
                best = Some(c);
            }
        }

        match best {
            Some(c) => {
                let lines: BTreeSet<&str> = c
                    .resolution
                    .stages
                    .iter()
                    .filter_map(Stage::as_driving)
                    .flat_map(|d| d.lines().iter().map(String::as_str))
                    .collect();
                debug!(
                    agent = %request.agent_name,
                    plan = c.label,
                    cost_secs = c.cost,
                    lines = ?lines,
                    "resolved trip"
                );
                Ok(c.resolution)
            }
            None => Err(UnroutableTrip {
                agent: request.agent_name.clone(),
                from:  network.edge(request.origin).name.clone(),
                to:    network.edge(request.destination).name.clone(),
                modes,
            }),
        }
    }
}
