//! `tp-core`: foundational types for the transportable itinerary engine.
//!
//! This crate is a dependency of every other `tp-*` crate.  It intentionally
//! has no `tp-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `NodeId`, `EdgeId`, `LaneId`, `StopId`, `VehicleId` |
//! | [`geo`]         | planar `Position`, distances, headings                     |
//! | [`time`]        | `Tick`, `SimClock`, `SimConfig`                            |
//! | [`rng`]         | `AgentRng` (per-agent)                                     |
//! | [`modes`]       | `ModeSet` bitmask, `VehicleClass`, `TransportableKind`     |
//! | [`error`]       | `TpError`, `TpResult`                                      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |
//!           | Required by the `tp-sim` settings loader.                  |

pub mod error;
pub mod geo;
pub mod ids;
pub mod modes;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{TpError, TpResult};
pub use geo::Position;
pub use ids::{AgentId, EdgeId, LaneId, NodeId, StopId, VehicleId};
pub use modes::{ModeSet, TransportableKind, VehicleClass};
pub use rng::AgentRng;
pub use time::{SimClock, SimConfig, Tick};
