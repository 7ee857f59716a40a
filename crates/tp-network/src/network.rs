//! Edge/lane network representation and builder.
//!
//! # Data layout
//!
//! Edges, lanes, and stopping places live in flat `Vec`s indexed by their
//! typed ids.  Outgoing adjacency uses **Compressed Sparse Row (CSR)** format:
//! the edges leaving `NodeId n` are
//!
//! ```text
//! out_edges[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! Edge ids keep insertion order (so callers can hold on to the ids the
//! builder returned); only the CSR index array is sorted by source node.
//!
//! # Lanes
//!
//! Lane 0 is the outermost lane on the driving side (the rightmost lane on
//! right-hand networks).  Lane shapes are the edge's centre line shifted
//! towards the driving side, so the two directions of a road never overlap.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) over stopping-place access points answers "which
//! stops are within walking distance of here" for the intermodal router.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use tp_core::{EdgeId, LaneId, ModeSet, NodeId, Position, StopId};

use crate::Shape;

/// Default lane width in metres.
pub const DEFAULT_LANE_WIDTH: f64 = 3.2;

// ── R-tree stop entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct StopEntry {
    point: [f64; 2],
    id: StopId,
}

impl RTreeObject for StopEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── Edge / Lane / StoppingPlace ───────────────────────────────────────────────

/// A directed network edge.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id:          EdgeId,
    /// External name, unique within the network.
    pub name:        String,
    pub from:        NodeId,
    pub to:          NodeId,
    /// Lanes from the driving-side outermost (index 0) inwards.
    pub lanes:       Vec<LaneId>,
    /// Centre-line geometry.
    pub shape:       Shape,
    /// Nominal length in metres.  May differ from the shape's geometric
    /// length; lane offsets are always given in nominal metres.
    pub length:      f64,
    pub speed_limit: f64,
    /// Union of the lanes' permissions.
    pub allowed:     ModeSet,
}

/// A lane of an edge.
#[derive(Clone, Debug)]
pub struct Lane {
    pub id:      LaneId,
    pub edge:    EdgeId,
    pub index:   u8,
    pub shape:   Shape,
    pub length:  f64,
    pub width:   f64,
    pub allowed: ModeSet,
}

impl Lane {
    /// Scale a nominal offset along this lane onto its geometry.
    #[inline]
    pub fn geometry_offset(&self, pos: f64) -> f64 {
        if self.length <= 0.0 {
            return 0.0;
        }
        pos * self.shape.length() / self.length
    }
}

/// A stop (bus stop, container stop, …) occupying `[begin_pos, end_pos]`
/// on one lane.
#[derive(Clone, Debug)]
pub struct StoppingPlace {
    pub id:        StopId,
    pub name:      String,
    pub lane:      LaneId,
    pub edge:      EdgeId,
    pub begin_pos: f64,
    pub end_pos:   f64,
}

impl StoppingPlace {
    /// Where vehicles halt and transportables wait: the middle of the stop.
    #[inline]
    pub fn access_pos(&self) -> f64 {
        (self.begin_pos + self.end_pos) / 2.0
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

/// Directed edge/lane graph plus stops and a stop spatial index.
///
/// All data fields are `pub` for direct indexed access.  Do not construct
/// directly; use [`NetworkBuilder`].
pub struct Network {
    /// Position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<Position>,

    /// CSR row pointer into `out_edges`.  Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    /// Edge ids sorted by source node.
    pub out_edges: Vec<EdgeId>,

    pub edges: Vec<Edge>,
    pub lanes: Vec<Lane>,
    pub stops: Vec<StoppingPlace>,

    /// `true` when vehicles drive on the left.
    pub lefthand: bool,

    edge_names: FxHashMap<String, EdgeId>,
    stop_names: FxHashMap<String, StopId>,
    stop_idx:   RTree<StopEntry>,
}

impl Network {
    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    #[inline]
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id.index()]
    }

    #[inline]
    pub fn stop(&self, id: StopId) -> &StoppingPlace {
        &self.stops[id.index()]
    }

    /// The driving-side outermost lane of `edge`, where roadside positions
    /// are anchored.  `None` only for an edge built without lanes.
    pub fn outer_lane(&self, edge: EdgeId) -> Option<&Lane> {
        self.edge(edge).lanes.first().map(|&l| self.lane(l))
    }

    pub fn edge_by_name(&self, name: &str) -> Option<EdgeId> {
        self.edge_names.get(name).copied()
    }

    pub fn stop_by_name(&self, name: &str) -> Option<StopId> {
        self.stop_names.get(name).copied()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Edges leaving `node`.  A contiguous slice scan; no allocation.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        self.out_edges[start..end].iter().copied()
    }

    /// Edges that continue from the end of `edge`.
    #[inline]
    pub fn successors(&self, edge: EdgeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_edges(self.edge(edge).to)
    }

    // ── Stops ─────────────────────────────────────────────────────────────

    /// Position of a stop's access point on its lane.
    pub fn stop_position(&self, id: StopId) -> Position {
        let stop = self.stop(id);
        let lane = self.lane(stop.lane);
        lane.shape.position_at_offset(lane.geometry_offset(stop.access_pos()), 0.0)
    }

    /// Stops on `edge`, in ascending position order.
    pub fn stops_on_edge(&self, edge: EdgeId) -> Vec<StopId> {
        let mut found: Vec<&StoppingPlace> = self.stops.iter().filter(|s| s.edge == edge).collect();
        found.sort_by(|a, b| a.begin_pos.total_cmp(&b.begin_pos));
        found.into_iter().map(|s| s.id).collect()
    }

    /// Stops whose access point lies within `radius` metres of `pos`, nearest
    /// first (ties broken by `StopId`).
    pub fn stops_near(&self, pos: Position, radius: f64) -> Vec<StopId> {
        let mut found: Vec<(f64, StopId)> = self
            .stop_idx
            .locate_within_distance([pos.x, pos.y], radius * radius)
            .map(|e| (e.distance_2(&[pos.x, pos.y]), e.id))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id)| id).collect()
    }
}

// ── NetworkBuilder ────────────────────────────────────────────────────────────

/// Construct a [`Network`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use tp_core::{ModeSet, Position};
/// use tp_network::NetworkBuilder;
///
/// let mut b = NetworkBuilder::new();
/// let a = b.add_node(Position::new(0.0, 0.0));
/// let c = b.add_node(Position::new(500.0, 0.0));
/// let (fwd, back) = b.add_road("main", a, c, 1, 13.9, ModeSet::ALL);
/// let stop = b.add_stop("main_stop", fwd, 200.0, 220.0);
/// let net = b.build();
/// assert_eq!(net.edge_count(), 2);
/// assert_eq!(net.edge_by_name("-main"), Some(back));
/// assert_eq!(net.stop(stop).edge, fwd);
/// ```
pub struct NetworkBuilder {
    nodes:    Vec<Position>,
    edges:    Vec<Edge>,
    lanes:    Vec<Lane>,
    stops:    Vec<StoppingPlace>,
    lefthand: bool,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            nodes:    Vec::new(),
            edges:    Vec::new(),
            lanes:    Vec::new(),
            stops:    Vec::new(),
            lefthand: false,
        }
    }

    /// Drive on the left.  Must be set before edges are added, since lane
    /// geometry depends on it.
    pub fn lefthand(mut self, lefthand: bool) -> Self {
        self.lefthand = lefthand;
        self
    }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a straight **directed** edge between two nodes.
    pub fn add_edge(
        &mut self,
        name: &str,
        from: NodeId,
        to: NodeId,
        lanes: u8,
        speed_limit: f64,
        allowed: ModeSet,
    ) -> EdgeId {
        self.add_edge_via(name, from, to, &[], lanes, speed_limit, allowed)
    }

    /// Add a directed edge whose centre line passes through `via` between
    /// the two node positions.  Every lane gets the same permissions.
    #[allow(clippy::too_many_arguments)]
    pub fn add_edge_via(
        &mut self,
        name: &str,
        from: NodeId,
        to: NodeId,
        via: &[Position],
        lanes: u8,
        speed_limit: f64,
        allowed: ModeSet,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        let mut points = Vec::with_capacity(via.len() + 2);
        points.push(self.nodes[from.index()]);
        points.extend_from_slice(via);
        points.push(self.nodes[to.index()]);
        let shape = Shape::new(points);
        let length = shape.length();

        let side = if self.lefthand { -1.0 } else { 1.0 };
        let lane_count = lanes.max(1);
        let mut lane_ids = Vec::with_capacity(lane_count as usize);
        for index in 0..lane_count {
            let lane_id = LaneId(self.lanes.len() as u32);
            let shift = side * DEFAULT_LANE_WIDTH * ((lane_count - index) as f64 - 0.5);
            self.lanes.push(Lane {
                id:      lane_id,
                edge:    id,
                index,
                shape:   shape.shifted(shift),
                length,
                width:   DEFAULT_LANE_WIDTH,
                allowed,
            });
            lane_ids.push(lane_id);
        }

        self.edges.push(Edge {
            id,
            name:        name.to_owned(),
            from,
            to,
            lanes:       lane_ids,
            shape,
            length,
            speed_limit,
            allowed,
        });
        id
    }

    /// Convenience: add both directions of a road.  The reverse edge is named
    /// `-{name}`.
    pub fn add_road(
        &mut self,
        name: &str,
        a: NodeId,
        b: NodeId,
        lanes: u8,
        speed_limit: f64,
        allowed: ModeSet,
    ) -> (EdgeId, EdgeId) {
        let fwd  = self.add_edge(name, a, b, lanes, speed_limit, allowed);
        let back = self.add_edge(&format!("-{name}"), b, a, lanes, speed_limit, allowed);
        (fwd, back)
    }

    /// Add a stopping place on the outer lane of `edge`.
    pub fn add_stop(&mut self, name: &str, edge: EdgeId, begin_pos: f64, end_pos: f64) -> StopId {
        let id = StopId(self.stops.len() as u32);
        let e = &self.edges[edge.index()];
        let lane = e.lanes.first().copied().unwrap_or_default();
        self.stops.push(StoppingPlace {
            id,
            name: name.to_owned(),
            lane,
            edge,
            begin_pos: begin_pos.clamp(0.0, e.length),
            end_pos: end_pos.clamp(0.0, e.length),
        });
        id
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Consume the builder and produce a [`Network`].
    ///
    /// Time complexity: O(E log E) for the CSR sort + O(S log S) for the
    /// stop R-tree bulk load.
    pub fn build(self) -> Network {
        let node_count = self.nodes.len();

        let mut out_edges: Vec<EdgeId> = self.edges.iter().map(|e| e.id).collect();
        out_edges.sort_by_key(|&e| (self.edges[e.index()].from, e));

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &self.edges {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, self.edges.len());

        let edge_names = self.edges.iter().map(|e| (e.name.clone(), e.id)).collect();
        let stop_names = self.stops.iter().map(|s| (s.name.clone(), s.id)).collect();

        let mut net = Network {
            node_pos: self.nodes,
            node_out_start,
            out_edges,
            edges: self.edges,
            lanes: self.lanes,
            stops: self.stops,
            lefthand: self.lefthand,
            edge_names,
            stop_names,
            stop_idx: RTree::new(),
        };

        // Bulk-load needs the finished lane table to place access points.
        let entries: Vec<StopEntry> = (0..net.stops.len())
            .map(|i| {
                let id = StopId(i as u32);
                let p = net.stop_position(id);
                StopEntry { point: [p.x, p.y], id }
            })
            .collect();
        net.stop_idx = RTree::bulk_load(entries);
        net
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
