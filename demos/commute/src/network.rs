//! Synthetic corridor with an inbound and an outbound bus line.
//!
//! ```text
//!   westside ──west── market ──center── docks ──east── harbour
//!        west_stop@400    center_stop@400    east_stop@400
//! ```
//!
//! Every road is 800 m, two-way, open to all modes.  Line `B1` runs
//! eastbound, `B1r` westbound, both every five minutes.

use anyhow::Result;

use tp_core::{EdgeId, ModeSet, Position, StopId, Tick, VehicleClass};
use tp_network::{Network, NetworkBuilder, TransitLine, TransitSchedule};

const ROAD_LEN:   f64 = 800.0;
const ROAD_SPEED: f64 = 13.89;
const HEADWAY:    u64 = 300;

pub struct Corridor {
    pub network:    Network,
    pub schedule:   TransitSchedule,
    /// Eastbound edges, west to east.
    pub east:       [EdgeId; 3],
    /// Westbound edges, east to west.
    pub west:       [EdgeId; 3],
    pub east_stops: [StopId; 3],
    pub west_stops: [StopId; 3],
}

pub fn build_corridor(tick_duration_secs: u32, service_ticks: u64) -> Result<Corridor> {
    let mut b = NetworkBuilder::new();
    let nodes: Vec<_> = (0..4)
        .map(|i| b.add_node(Position::new(i as f64 * ROAD_LEN, 0.0)))
        .collect();

    let mut east = [EdgeId::INVALID; 3];
    let mut west = [EdgeId::INVALID; 3];
    for (i, name) in ["west", "center", "east"].into_iter().enumerate() {
        let (fwd, back) = b.add_road(name, nodes[i], nodes[i + 1], 1, ROAD_SPEED, ModeSet::ALL);
        east[i] = fwd;
        west[2 - i] = back;
    }

    let east_stops = [
        b.add_stop("west_stop", east[0], 380.0, 420.0),
        b.add_stop("center_stop", east[1], 380.0, 420.0),
        b.add_stop("east_stop", east[2], 380.0, 420.0),
    ];
    let west_stops = [
        b.add_stop("east_stop_r", west[0], 380.0, 420.0),
        b.add_stop("center_stop_r", west[1], 380.0, 420.0),
        b.add_stop("west_stop_r", west[2], 380.0, 420.0),
    ];
    let network = b.build();

    let departures: Vec<Tick> = (0..service_ticks).step_by(HEADWAY as usize).map(Tick).collect();
    let mut schedule = TransitSchedule::new();
    for (name, route, stops) in [("B1", east, east_stops), ("B1r", west, west_stops)] {
        schedule.add_line(&network, tick_duration_secs, TransitLine {
            name:        name.to_owned(),
            class:       VehicleClass::Bus,
            stops:       stops.to_vec(),
            route:       route.to_vec(),
            speed:       11.0,
            departures:  departures.clone(),
            dwell_ticks: 20,
            capacity:    3,
        })?;
    }

    Ok(Corridor { network, schedule, east, west, east_stops, west_stops })
}
