//! Scheduled transit lines.
//!
//! A line runs identical trips along a fixed edge route, departing the first
//! edge at each tick in `departures`.  Vehicles move at the line's constant
//! speed and halt `dwell_ticks` at every stop, so the whole timetable follows
//! from the geometry: [`LineTiming`] precomputes, per stop, the odometer
//! reading and the arrival offset in ticks after a trip's departure.
//!
//! Trip `k` of line `"17"` is identified as `"17.k"`.  That id is what a ride
//! reports as its intended vehicle.

use tp_core::time::ticks_for_secs;
use tp_core::{EdgeId, StopId, Tick, VehicleClass};

use crate::network::Network;
use crate::{NetworkError, NetworkResult};

// ── TransitLine ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitLine {
    /// Line identifier, matched against a ride's candidate lines.
    pub name:        String,
    pub class:       VehicleClass,
    /// Served stops in route order.
    pub stops:       Vec<StopId>,
    pub route:       Vec<EdgeId>,
    /// Cruising speed in m/s.
    pub speed:       f64,
    pub departures:  Vec<Tick>,
    pub dwell_ticks: u64,
    pub capacity:    usize,
}

impl TransitLine {
    /// The id of the `k`-th trip of this line.
    pub fn trip_id(&self, k: usize) -> String {
        format!("{}.{}", self.name, k)
    }

    /// Position of `stop` in this line's stop list.
    pub fn stop_index(&self, stop: StopId) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }
}

// ── LineTiming ────────────────────────────────────────────────────────────────

/// Odometer and timetable offsets of one line, derived from the network.
#[derive(Clone, Debug, PartialEq)]
pub struct LineTiming {
    /// Distance from the start of the route to each stop's access point.
    pub distances:    Vec<f64>,
    /// Ticks after departure at which the vehicle halts at each stop.
    pub arrivals:     Vec<u64>,
    /// Total route length in metres.
    pub route_length: f64,
    /// Ticks after departure at which the vehicle reaches the route end.
    pub end_offset:   u64,
    pub dwell_ticks:  u64,
    speed:            f64,
}

impl LineTiming {
    pub fn compute(network: &Network, line: &TransitLine, tick_duration_secs: u32) -> NetworkResult<Self> {
        if line.speed <= 0.0 {
            return Err(NetworkError::InvalidLineSpeed(line.name.clone()));
        }

        // Cumulative length before each route edge.
        let mut before = Vec::with_capacity(line.route.len());
        let mut route_length = 0.0;
        for &e in &line.route {
            before.push(route_length);
            route_length += network.edge(e).length;
        }

        let mut distances = Vec::with_capacity(line.stops.len());
        let mut cursor = 0usize;
        for &stop_id in &line.stops {
            let stop = network.stop(stop_id);
            let not_on_route = || NetworkError::StopNotOnRoute { line: line.name.clone(), stop: stop_id };
            let idx = line.route[cursor..]
                .iter()
                .position(|&e| e == stop.edge)
                .map(|i| i + cursor)
                .ok_or_else(not_on_route)?;
            let d = before[idx] + stop.access_pos();
            if distances.last().is_some_and(|&prev| d < prev) {
                return Err(not_on_route());
            }
            distances.push(d);
            cursor = idx;
        }

        let mut arrivals = Vec::with_capacity(distances.len());
        let mut clock = 0u64;
        let mut odometer = 0.0;
        for &d in &distances {
            clock += ticks_for_secs((d - odometer) / line.speed, tick_duration_secs);
            arrivals.push(clock);
            clock += line.dwell_ticks;
            odometer = d;
        }
        let end_offset = clock + ticks_for_secs((route_length - odometer) / line.speed, tick_duration_secs);

        Ok(Self {
            distances,
            arrivals,
            route_length,
            end_offset,
            dwell_ticks: line.dwell_ticks,
            speed: line.speed,
        })
    }

    /// The stop index the vehicle is halted at `elapsed` ticks after
    /// departure, if any.
    pub fn halted_at(&self, elapsed: u64) -> Option<usize> {
        self.arrivals
            .iter()
            .position(|&a| elapsed >= a && elapsed <= a + self.dwell_ticks)
    }

    /// Odometer reading `elapsed` ticks after departure.
    ///
    /// Piecewise linear: constant while halted, linear between stops, capped
    /// at the route length.
    pub fn odometer_at(&self, elapsed: u64, tick_duration_secs: u32) -> f64 {
        let mut leg_start_tick = 0u64;
        let mut leg_start_dist = 0.0;
        for (i, &arrival) in self.arrivals.iter().enumerate() {
            if elapsed < arrival {
                return self.interpolate(leg_start_tick, leg_start_dist, elapsed, self.distances[i], tick_duration_secs);
            }
            if elapsed <= arrival + self.dwell_ticks {
                return self.distances[i];
            }
            leg_start_tick = arrival + self.dwell_ticks;
            leg_start_dist = self.distances[i];
        }
        self.interpolate(leg_start_tick, leg_start_dist, elapsed, self.route_length, tick_duration_secs)
    }

    fn interpolate(&self, start_tick: u64, start_dist: f64, now: u64, cap: f64, tick_duration_secs: u32) -> f64 {
        let secs = (now - start_tick) as f64 * tick_duration_secs as f64;
        (start_dist + secs * self.speed).min(cap)
    }
}

// ── TransitSchedule ───────────────────────────────────────────────────────────

/// All transit lines with their precomputed timings.
#[derive(Clone, Debug, Default)]
pub struct TransitSchedule {
    lines:   Vec<TransitLine>,
    timings: Vec<LineTiming>,
}

impl TransitSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `line` against the network and add it.  Returns its index.
    pub fn add_line(&mut self, network: &Network, tick_duration_secs: u32, line: TransitLine) -> NetworkResult<usize> {
        let timing = LineTiming::compute(network, &line, tick_duration_secs)?;
        self.lines.push(line);
        self.timings.push(timing);
        Ok(self.lines.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline]
    pub fn line(&self, idx: usize) -> &TransitLine {
        &self.lines[idx]
    }

    #[inline]
    pub fn timing(&self, idx: usize) -> &LineTiming {
        &self.timings[idx]
    }

    pub fn line_by_name(&self, name: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransitLine, &LineTiming)> {
        self.lines.iter().zip(self.timings.iter())
    }

    /// Every `(line, board index, alight index)` that carries a passenger
    /// from `board` to `alight` without changing vehicles.
    pub fn direct_connections(&self, board: StopId, alight: StopId) -> Vec<(usize, usize, usize)> {
        let mut found = Vec::new();
        for (li, line) in self.lines.iter().enumerate() {
            let Some(bi) = line.stop_index(board) else { continue };
            if let Some(ai) = line.stops[bi + 1..].iter().position(|&s| s == alight) {
                found.push((li, bi, bi + 1 + ai));
            }
        }
        found
    }

    /// The first trip of `line` that halts at stop index `stop_idx` no
    /// earlier than `earliest`.  Returns the trip number and halt tick.
    pub fn next_departure(&self, line: usize, stop_idx: usize, earliest: Tick) -> Option<(usize, Tick)> {
        let offset = self.timings[line].arrivals[stop_idx];
        self.lines[line]
            .departures
            .iter()
            .enumerate()
            .map(|(k, &dep)| (k, dep + offset))
            .filter(|&(_, at)| at >= earliest)
            .min_by_key(|&(k, at)| (at, k))
    }
}
