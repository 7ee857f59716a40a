//! `tp-stage`, the itinerary engine: stages and how they move a person or
//! container through the network.
//!
//! An itinerary is an ordered list of [`Stage`]s of which only the current
//! one is active.  Each stage is a small state machine driven by simulation
//! time: [`Stage::proceed`] activates it and reports how it will complete
//! (a [`Transition`]), and [`Stage::set_arrived`] closes it.  A
//! [`TripStage`] never completes on its own; it resolves through an
//! [`IntermodalRouter`] into concrete stages spliced in after it.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                       |
//! |---------------|----------------------------------------------------------------|
//! | [`stage`]     | `Stage` enum (dispatch), `StageCore`, `StageType`, `Transition`, `StageContext`, `AgentRef`, `Traveller` |
//! | [`waiting`]   | `WaitingStage`: elapse a duration or wait until a tick        |
//! | [`trip`]      | `TripStage`, `DepartPos`: unresolved request, resolved lazily |
//! | [`driving`]   | `DrivingStage`, `RideState`: wait for and ride a vehicle      |
//! | [`moving`]    | `MovingStage`: walking / tranship along an edge route         |
//! | [`access`]    | `AccessStage`: straight-line move between road and stop       |
//! | [`geometry`]  | roadside offsets, lane/edge position and angle helpers         |
//! | [`vehicle`]   | `TransportVehicle`, `VehicleLookup`: what stages ask vehicles |
//! | [`router`]    | `IntermodalRouter`, `TripRequest`, `Resolution`, `ScheduleRouter` |
//! | [`itinerary`] | `Itinerary`: index-based stage sequence with splice-in-place  |
//! | [`output`]    | `TripInfoRecord`, `RouteRecord`, `ReportSink`, `RecordBuffer`  |
//! | [`error`]     | `StageError`, `StageResult<T>`, `UnroutableTrip`               |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `RouterConfig` and `StageType`. |

pub mod access;
pub mod driving;
pub mod error;
pub mod geometry;
pub mod itinerary;
pub mod moving;
pub mod output;
pub mod router;
pub mod stage;
pub mod trip;
pub mod vehicle;
pub mod waiting;

#[cfg(test)]
mod tests;

pub use access::AccessStage;
pub use driving::{DrivingStage, RideState, ANY_LINE};
pub use error::{StageError, StageResult, UnroutableTrip};
pub use itinerary::{Activation, Advance, Itinerary};
pub use moving::{MovingStage, DEFAULT_WALK_SPEED};
pub use output::{RecordBuffer, ReportSink, RouteRecord, TripInfoRecord};
pub use router::{IntermodalRouter, PrivateVehicle, Resolution, RouterConfig, ScheduleRouter, TripRequest};
pub use stage::{AgentRef, Stage, StageContext, StageCore, StageType, Transition, Traveller};
pub use trip::{DepartPos, TripStage};
pub use vehicle::{NoVehicles, TransportVehicle, VehicleLookup};
pub use waiting::WaitingStage;
