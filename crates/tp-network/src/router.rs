//! Edge-level routing trait and default Dijkstra implementation.
//!
//! # Pluggability
//!
//! The intermodal router in `tp-stage` asks for road paths through the
//! [`EdgeRouter`] trait, so applications can swap in A*, contraction
//! hierarchies, or congestion-aware costs without touching the stage layer.
//!
//! # Cost units
//!
//! Costs are travel times in **milliseconds** (u64) internally, computed
//! from each edge's length and `min(max_speed, speed_limit)`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tp_core::{EdgeId, ModeSet};

use crate::network::Network;
use crate::{NetworkError, NetworkResult};

// ── EdgePath ──────────────────────────────────────────────────────────────────

/// An ordered, connected list of edges from the origin edge to the
/// destination edge (both included).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePath {
    pub edges: Vec<EdgeId>,
    /// Sum of the full lengths of all edges in metres.
    pub length: f64,
    /// Travel time in seconds at the requested speed.
    pub travel_secs: f64,
}

impl EdgePath {
    /// Distance actually covered when entering the path at `depart_pos` on
    /// the first edge and leaving at `arrival_pos` on the last.
    pub fn trimmed_length(&self, network: &Network, depart_pos: f64, arrival_pos: f64) -> f64 {
        match self.edges.as_slice() {
            [] => 0.0,
            [only] => (arrival_pos - depart_pos).abs().min(network.edge(*only).length),
            [first, .., _] => {
                let head = network.edge(*first).length;
                (self.length - depart_pos.clamp(0.0, head))
                    - (network.edge(self.last_edge()).length - arrival_pos).max(0.0)
            }
        }
    }

    #[inline]
    pub fn last_edge(&self) -> EdgeId {
        self.edges.last().copied().unwrap_or_default()
    }
}

// ── EdgeRouter trait ──────────────────────────────────────────────────────────

/// Pluggable single-mode road routing.
///
/// Implementations must be `Send + Sync` so one router can be shared by
/// every agent's resolution step.
pub trait EdgeRouter: Send + Sync {
    /// Compute a path from `from` to `to` over edges that permit `mode`.
    ///
    /// `from == to` yields the single-edge path `[from]`.
    fn route(
        &self,
        network: &Network,
        from: EdgeId,
        to: EdgeId,
        mode: ModeSet,
        max_speed: f64,
    ) -> NetworkResult<EdgePath>;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Edge-based Dijkstra over the CSR graph.
///
/// Nodes of the search are edges, so permissions are checked per edge and
/// the origin/destination edges are part of the result.
pub struct DijkstraRouter;

impl EdgeRouter for DijkstraRouter {
    fn route(
        &self,
        network: &Network,
        from: EdgeId,
        to: EdgeId,
        mode: ModeSet,
        max_speed: f64,
    ) -> NetworkResult<EdgePath> {
        dijkstra(network, from, to, mode, max_speed)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

#[inline]
fn edge_cost_ms(network: &Network, edge: EdgeId, max_speed: f64) -> u64 {
    let e = network.edge(edge);
    let speed = max_speed.min(e.speed_limit).max(0.1);
    (e.length / speed * 1000.0).round() as u64
}

fn dijkstra(
    network: &Network,
    from: EdgeId,
    to: EdgeId,
    mode: ModeSet,
    max_speed: f64,
) -> NetworkResult<EdgePath> {
    let no_route = || NetworkError::NoRoute { from, to, modes: mode };
    if !network.edge(from).allowed.intersects(mode) || !network.edge(to).allowed.intersects(mode) {
        return Err(no_route());
    }

    let n = network.edge_count();
    // dist[e] = best known cost (ms) to reach the end of edge e.
    let mut dist      = vec![u64::MAX; n];
    let mut prev_edge = vec![EdgeId::INVALID; n];

    let start_cost = edge_cost_ms(network, from, max_speed);
    dist[from.index()] = start_cost;

    // Min-heap; the EdgeId secondary key makes tie-breaking deterministic.
    let mut heap: BinaryHeap<Reverse<(u64, EdgeId)>> = BinaryHeap::new();
    heap.push(Reverse((start_cost, from)));

    while let Some(Reverse((cost, edge))) = heap.pop() {
        if edge == to {
            return Ok(reconstruct(network, &prev_edge, to, cost));
        }
        if cost > dist[edge.index()] {
            continue;
        }
        for next in network.successors(edge) {
            if !network.edge(next).allowed.intersects(mode) {
                continue;
            }
            let new_cost = cost.saturating_add(edge_cost_ms(network, next, max_speed));
            if new_cost < dist[next.index()] {
                dist[next.index()] = new_cost;
                prev_edge[next.index()] = edge;
                heap.push(Reverse((new_cost, next)));
            }
        }
    }

    Err(no_route())
}

fn reconstruct(network: &Network, prev_edge: &[EdgeId], to: EdgeId, total_ms: u64) -> EdgePath {
    let mut edges = vec![to];
    let mut cur = to;
    while prev_edge[cur.index()] != EdgeId::INVALID {
        cur = prev_edge[cur.index()];
        edges.push(cur);
    }
    edges.reverse();
    let length = edges.iter().map(|&e| network.edge(e).length).sum();
    EdgePath {
        edges,
        length,
        travel_secs: total_ms as f64 / 1000.0,
    }
}
