//! `tp-network`: the network model the stage layer reads from.
//!
//! Everything here is read-only once built: stages hold `EdgeId`/`StopId`
//! handles and look geometry up on demand, never owning network data.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`shape`]   | `Shape` polyline with offset/rotation interpolation         |
//! | [`network`] | `Network` (edges, lanes, CSR adjacency, stop R-tree), `NetworkBuilder` |
//! | [`router`]  | `EdgeRouter` trait, `EdgePath`, `DijkstraRouter`            |
//! | [`transit`] | `TransitLine`, `LineTiming`, `TransitSchedule`              |
//! | [`error`]   | `NetworkError`, `NetworkResult<T>`                          |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public value types.     |

pub mod error;
pub mod network;
pub mod router;
pub mod shape;
pub mod transit;


pub use error::{NetworkError, NetworkResult};
pub use network::{Edge, Lane, Network, NetworkBuilder, StoppingPlace};
pub use router::{DijkstraRouter, EdgePath, EdgeRouter};
pub use shape::Shape;
pub use transit::{LineTiming, TransitLine, TransitSchedule};
