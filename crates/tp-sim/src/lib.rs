//! `tp-sim`: tick loop driver for transportable itineraries.
//!
//! The stage layer knows how a single itinerary moves on; this crate owns
//! everything around it: the population, the vehicles, who waits where, and
//! when each agent is due next.
//!
//! # Tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① Start      first tick only: activate every itinerary.
//!   ② Spawn      insert transit trips departing this tick.
//!   ③ Move       step all vehicles.
//!   ④ Exchange   per halted vehicle (ascending VehicleId): alight riders
//!                whose ride ends here, board waiting agents (ascending
//!                AgentId) up to capacity.
//!   ⑤ Retire     finished vehicles drop stranded riders and leave.
//!   ⑥ Wake       advance agents whose timed stage is due.
//! ```
//!
//! # Crate layout
//!
//! | Module         | Contents                                                 |
//! |----------------|----------------------------------------------------------|
//! | [`sim`]        | `Sim`: state and tick loop                              |
//! | [`builder`]    | `SimBuilder`: validation and wiring                     |
//! | [`population`] | `Population`, `Transportable`, `AgentRngs`               |
//! | [`fleet`]      | `Fleet`, `Vehicle`, `Halt`: kinematic transit and private vehicles |
//! | [`wake_queue`] | `WakeQueue`: sparse per-tick activation queue           |
//! | [`observer`]   | `SimObserver`, `NoopObserver`                            |
//! | [`config`]     | `Settings`: JSON run settings                           |
//! | [`logging`]    | `init_std_out_logging`                                   |
//! | [`error`]      | `SimError`, `SimResult<T>`                               |

pub mod builder;
pub mod config;
pub mod error;
pub mod fleet;
pub mod logging;
pub mod observer;
pub mod population;
pub mod sim;
pub mod wake_queue;


pub use builder::SimBuilder;
pub use config::Settings;
pub use error::{SimError, SimResult};
pub use fleet::{Fleet, Halt, Vehicle};
pub use logging::init_std_out_logging;
pub use observer::{NoopObserver, SimObserver};
pub use population::{AgentRngs, Population, Transportable};
pub use sim::Sim;
pub use wake_queue::WakeQueue;
