//! Vehicles that carry transportables.
//!
//! Vehicles here are kinematic: each tick [`Fleet::step`] recomputes where
//! every vehicle is from its timetable (transit) or from the tick its owner
//! boarded (private).  There is no car following; that belongs to a traffic
//! model, not to the itinerary engine.
//!
//! A vehicle is *halted* when it stands still at a place where people may
//! board or alight: a transit vehicle dwelling at a stop, a parked private
//! vehicle waiting for its owner, or any vehicle at the end of its route.

use tp_core::time::secs_for_ticks;
use tp_core::{AgentId, EdgeId, Position, StopId, Tick, VehicleClass, VehicleId};
use tp_network::{Network, TransitSchedule};
use tp_stage::geometry::{edge_angle, edge_position};
use tp_stage::{PrivateVehicle, TransportVehicle, VehicleLookup};

/// Where a halted vehicle stands.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Halt {
    Stop(StopId),
    /// Parked or at the route end, not at a stopping place.
    Edge(EdgeId),
}

#[derive(Clone, Debug)]
enum Motion {
    /// Trip `trip` of schedule line `line`, departed at `depart`.
    Transit { line: usize, depart: Tick },
    /// Parked until `started`, then constant speed to `total` metres.
    Private { total: f64, cruise: f64, started: Option<Tick> },
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id:         VehicleId,
    pub name:       String,
    pub line:       String,
    pub class:      VehicleClass,
    pub capacity:   usize,
    /// Boarded agents, in boarding order.
    pub passengers: Vec<AgentId>,
    motion:         Motion,
    route:          Vec<EdgeId>,
    /// Route distance at which each route edge starts.
    route_offsets:  Vec<f64>,
    /// Route distance of the departure point.
    start_pos:      f64,
    /// Served stops with their route distance.
    stops:          Vec<(StopId, f64)>,
    // Kinematic snapshot, refreshed by `step`.
    odometer:       f64,
    route_index:    usize,
    edge_pos:       f64,
    position:       Position,
    angle:          f64,
    speed:          f64,
    halted:         Option<Halt>,
    finished:       bool,
}

impl Vehicle {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id:        VehicleId,
        name:      String,
        line:      String,
        class:     VehicleClass,
        capacity:  usize,
        motion:    Motion,
        route:     Vec<EdgeId>,
        start_pos: f64,
        stops:     Vec<(StopId, f64)>,
        network:   &Network,
    ) -> Self {
        let mut route_offsets = Vec::with_capacity(route.len());
        let mut acc = 0.0;
        for &e in &route {
            route_offsets.push(acc);
            acc += network.edge(e).length;
        }
        let mut v = Self {
            id,
            name,
            line,
            class,
            capacity,
            passengers: Vec::new(),
            motion,
            route,
            route_offsets,
            start_pos,
            stops,
            odometer: 0.0,
            route_index: 0,
            edge_pos: 0.0,
            position: Position::default(),
            angle: 0.0,
            speed: 0.0,
            halted: None,
            finished: false,
        };
        v.locate(network);
        v
    }

    pub fn halted(&self) -> Option<Halt> {
        self.halted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_private(&self) -> bool {
        matches!(self.motion, Motion::Private { .. })
    }

    pub fn has_room(&self) -> bool {
        self.passengers.len() < self.capacity
    }

    /// Let a parked private vehicle drive off.  No effect on transit
    /// vehicles or on a private vehicle that already started.
    pub fn start(&mut self, now: Tick) {
        if let Motion::Private { started, .. } = &mut self.motion {
            if started.is_none() {
                *started = Some(now);
            }
        }
    }

    /// Refresh the kinematic snapshot for `now`.
    pub fn step(&mut self, now: Tick, network: &Network, schedule: &TransitSchedule, tick_duration_secs: u32) {
        match self.motion {
            Motion::Transit { line, depart } => {
                let timing = schedule.timing(line);
                let elapsed = now.saturating_since(depart);
                self.odometer = timing.odometer_at(elapsed, tick_duration_secs);
                self.finished = elapsed >= timing.end_offset;
                self.halted = match timing.halted_at(elapsed) {
                    Some(i) => Some(Halt::Stop(schedule.line(line).stops[i])),
                    None if self.finished => self.route.last().map(|&e| Halt::Edge(e)),
                    None => None,
                };
                self.speed = if self.halted.is_some() { 0.0 } else { schedule.line(line).speed };
            }
            Motion::Private { total, cruise, started } => match started {
                None => {
                    self.odometer = 0.0;
                    self.speed = 0.0;
                    self.halted = self.route.first().map(|&e| Halt::Edge(e));
                }
                Some(start) => {
                    let secs = secs_for_ticks(now.saturating_since(start), tick_duration_secs);
                    self.odometer = (secs * cruise).min(total);
                    self.finished = self.odometer >= total;
                    if self.finished {
                        self.speed = 0.0;
                        self.halted = self.route.last().map(|&e| Halt::Edge(e));
                    } else {
                        self.speed = cruise;
                        self.halted = None;
                    }
                }
            },
        }
        self.locate(network);
    }

    fn locate(&mut self, network: &Network) {
        if self.route.is_empty() {
            return;
        }
        let along = self.start_pos + self.odometer;
        let idx = self.route_offsets.iter().rposition(|&o| o <= along).unwrap_or(0);
        let edge = self.route[idx];
        let at = (along - self.route_offsets[idx]).min(network.edge(edge).length);
        self.route_index = idx;
        self.edge_pos = at;
        self.position = edge_position(network, edge, at, 0.0);
        self.angle = edge_angle(network, edge, at);
    }

    fn route_pos(&self) -> f64 {
        self.start_pos + self.odometer
    }
}

impl TransportVehicle for Vehicle {
    fn id(&self) -> VehicleId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> &str {
        &self.line
    }

    fn vehicle_class(&self) -> VehicleClass {
        self.class
    }

    fn odometer(&self) -> f64 {
        self.odometer
    }

    fn position(&self) -> Position {
        self.position
    }

    fn angle(&self) -> f64 {
        self.angle
    }

    fn edge(&self) -> EdgeId {
        self.route.get(self.route_index).copied().unwrap_or(EdgeId::INVALID)
    }

    fn edge_pos(&self) -> f64 {
        self.edge_pos
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn stops_at(&self, stop: StopId) -> bool {
        let here = self.route_pos();
        self.stops.iter().any(|&(s, d)| s == stop && d >= here)
    }

    fn stops_at_edge(&self, edge: EdgeId) -> bool {
        self.route.get(self.route_index..).is_some_and(|rest| rest.contains(&edge))
    }
}

// ── Fleet ─────────────────────────────────────────────────────────────────────

/// All vehicles currently in the network, ordered by `VehicleId`.
#[derive(Clone, Debug, Default)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
    next_id:  u32,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert trip `trip` of schedule line `line`, departing at `depart`.
    pub fn insert_transit(
        &mut self,
        network:  &Network,
        schedule: &TransitSchedule,
        line:     usize,
        trip:     usize,
        depart:   Tick,
    ) -> VehicleId {
        let id = self.next_id();
        let spec = schedule.line(line);
        let timing = schedule.timing(line);
        let stops = spec.stops.iter().copied().zip(timing.distances.iter().copied()).collect();
        self.vehicles.push(Vehicle::new(
            id,
            spec.trip_id(trip),
            spec.name.clone(),
            spec.class,
            spec.capacity,
            Motion::Transit { line, depart },
            spec.route.clone(),
            0.0,
            stops,
            network,
        ));
        id
    }

    /// Insert a private vehicle, parked at its departure point.
    pub fn insert_private(&mut self, network: &Network, vehicle: &PrivateVehicle) -> VehicleId {
        let id = self.next_id();
        let route_len: f64 = vehicle.route.iter().map(|&e| network.edge(e).length).sum();
        let last_len = vehicle.route.last().map_or(0.0, |&e| network.edge(e).length);
        let total = (route_len - vehicle.depart_pos - (last_len - vehicle.arrival_pos)).max(0.0);
        self.vehicles.push(Vehicle::new(
            id,
            vehicle.name.clone(),
            vehicle.name.clone(),
            vehicle.class,
            1,
            Motion::Private { total, cruise: vehicle.speed, started: None },
            vehicle.route.clone(),
            vehicle.depart_pos,
            Vec::new(),
            network,
        ));
        id
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles
            .binary_search_by_key(&id, |v| v.id)
            .ok()
            .map(|i| &self.vehicles[i])
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        match self.vehicles.binary_search_by_key(&id, |v| v.id) {
            Ok(i) => Some(&mut self.vehicles[i]),
            Err(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn step(&mut self, now: Tick, network: &Network, schedule: &TransitSchedule, tick_duration_secs: u32) {
        for v in &mut self.vehicles {
            v.step(now, network, schedule, tick_duration_secs);
        }
    }

    /// Remove and return every vehicle that reached its route end with no
    /// passengers left.
    pub fn remove_finished(&mut self) -> Vec<Vehicle> {
        let (done, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.vehicles)
            .into_iter()
            .partition(|v| v.finished && v.passengers.is_empty());
        self.vehicles = keep;
        done
    }
}

impl VehicleLookup for Fleet {
    fn vehicle(&self, id: VehicleId) -> Option<&dyn TransportVehicle> {
        self.get(id).map(|v| v as &dyn TransportVehicle)
    }
}
