//! Position and heading helpers shared by all stages.
//!
//! Offsets along a lane or edge are nominal metres; they are scaled to the
//! lane's geometric length before interpolating.  Transportables that stand
//! still (waiting, or waiting for a ride) are placed [`ROADSIDE_OFFSET`]
//! beside the outer lane rather than in a travel lane, facing the road.

use std::f64::consts::FRAC_PI_2;

use tp_core::{EdgeId, Position, StopId};
use tp_network::{Lane, Network};

/// Lateral distance in metres between a standing transportable and the
/// centre of the outer lane.
pub const ROADSIDE_OFFSET: f64 = 3.0;

/// Point at nominal offset `at` along `lane`, moved `lateral` metres to the
/// right.
pub fn lane_position(lane: &Lane, at: f64, lateral: f64) -> Position {
    lane.shape.position_at_offset(lane.geometry_offset(at), lateral)
}

/// Point at offset `at` along `edge`, measured on its outer lane.
pub fn edge_position(network: &Network, edge: EdgeId, at: f64, lateral: f64) -> Position {
    match network.outer_lane(edge) {
        Some(lane) => lane_position(lane, at, lateral),
        None => network.edge(edge).shape.position_at_offset(at, lateral),
    }
}

/// Heading of `edge` at offset `at`.
pub fn edge_angle(network: &Network, edge: EdgeId, at: f64) -> f64 {
    match network.outer_lane(edge) {
        Some(lane) => lane.shape.rotation_at_offset(lane.geometry_offset(at)),
        None => network.edge(edge).shape.rotation_at_offset(at),
    }
}

/// The roadside lateral offset, mirrored on left-hand networks.
#[inline]
pub fn roadside_offset(network: &Network) -> f64 {
    if network.lefthand { -ROADSIDE_OFFSET } else { ROADSIDE_OFFSET }
}

/// Where a transportable stands at offset `at` beside `edge`.
pub fn roadside_position(network: &Network, edge: EdgeId, at: f64) -> Position {
    edge_position(network, edge, at, roadside_offset(network))
}

/// The heading of a transportable standing beside `edge`: a quarter turn
/// from the road's direction, towards the road.
pub fn roadside_angle(network: &Network, edge: EdgeId, at: f64) -> f64 {
    let quarter = if network.lefthand { -FRAC_PI_2 } else { FRAC_PI_2 };
    edge_angle(network, edge, at) + quarter
}

/// Where a transportable waits at `stop`: beside the stop's lane at its
/// access point.
pub fn stop_wait_position(network: &Network, stop: StopId) -> Position {
    let place = network.stop(stop);
    lane_position(network.lane(place.lane), place.access_pos(), roadside_offset(network))
}
