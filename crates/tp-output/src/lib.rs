//! `tp-output`: report writers for simulated itineraries.
//!
//! | Backend | Files created                                        |
//! |---------|------------------------------------------------------|
//! | CSV     | `tripinfo.csv`, `routes.csv`, `tick_summaries.csv`   |
//!
//! Writers implement [`OutputWriter`] and are driven by
//! [`StageOutputObserver`], which implements `tp_sim::SimObserver`.  Each
//! transportable is reported once, when its itinerary ends.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tp_output::{CsvWriter, StageOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = StageOutputObserver::new(writer, &settings.sim, settings.route_lengths);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::StageOutputObserver;
pub use row::TickSummaryRow;
pub use writer::OutputWriter;
